use rayon::prelude::*;

use super::{DiskCleanup, Progress};
use crate::cleaner::Outcome;
use crate::command::CommandRunner;
use crate::events::EngineEvent;
use crate::report::{CleanupResult, Pass, Report};
use crate::target::{CleanupCategory, CleanupTarget};
use crate::utils::format_size;

/// Targets above this size are listed individually in the scan summary.
const SIGNIFICANT_BYTES: u64 = 1024 * 1024;

impl DiskCleanup {
    /// Estimate reclaimable space for every registered target.
    ///
    /// Read-only. Every result is replaced by a fresh one before the pass, so
    /// two scans over an unchanged system produce identical results.
    pub fn scan(&mut self) -> Report {
        tracing::info!("starting disk space scan of {} targets", self.registry.len());
        self.log("Starting disk space scan...");
        self.progress(0);

        let progress = Progress::new(self.sink.as_ref(), self.registry.len());
        let runner = self.runner.as_ref();
        let targets: Vec<&CleanupTarget> = self.registry.targets().collect();

        let results: Vec<CleanupResult> = if self.parallel_scan {
            targets
                .par_iter()
                .map(|target| scan_target(target, runner, &progress))
                .collect()
        } else {
            targets
                .iter()
                .map(|target| scan_target(target, runner, &progress))
                .collect()
        };
        self.results = results;

        self.emit_summary();
        self.progress(100);

        let report = Report::new(Pass::Scan, &self.registry, &self.results);
        tracing::info!("disk space scan completed: {} reclaimable", report.totals.space_found_formatted);
        self.sink.emit(EngineEvent::ScanComplete(report.clone()));
        report
    }

    fn emit_summary(&self) {
        let total: u64 = self.results.iter().map(|r| r.space_found).sum();
        if total == 0 {
            self.log("\nNo unnecessary files found to clean up.");
            return;
        }

        self.log("\n—— Scan Complete ——");
        self.log(format!("Total space that can be freed: {}", format_size(total)));

        for category in CleanupCategory::ALL {
            let members: Vec<&CleanupResult> = self
                .registry
                .ids_in(category)
                .into_iter()
                .filter_map(|id| self.result(id))
                .collect();
            let space: u64 = members.iter().map(|r| r.space_found).sum();
            if space == 0 {
                continue;
            }
            self.log(format!("\n{}: {}", category.label(), format_size(space)));
            for result in members.iter().filter(|r| r.space_found > SIGNIFICANT_BYTES) {
                self.log(format!(
                    "  • {}: {}",
                    result.target_name,
                    result.space_found_formatted()
                ));
            }
        }
    }
}

/// Scan one target into a fresh result. A failure leaves a zeroed result
/// carrying only the error.
fn scan_target(
    target: &CleanupTarget,
    runner: &dyn CommandRunner,
    progress: &Progress<'_>,
) -> CleanupResult {
    progress.log(format!("Scanning {}...", target.name()));

    let mut result = CleanupResult::for_target(target);
    let error = match target.cleaner().scan(target, runner) {
        Ok(Outcome::Done(tally)) => {
            result.scanned = true;
            result.items_found = tally.items;
            result.space_found = tally.bytes;
            None
        }
        Ok(Outcome::Skipped) => None,
        Err(e) => {
            let message = format!("Error scanning {}: {}", target.name(), e);
            tracing::error!("{}", message);
            result.error = Some(e.to_string());
            Some(message)
        }
    };

    progress.step(error);
    result
}
