use super::{DiskCleanup, Progress};
use crate::cleaner::Outcome;
use crate::events::EngineEvent;
use crate::report::{Pass, Report};
use crate::utils::format_size;

impl DiskCleanup {
    /// Replace the cleanup selection. Duplicate ids are dropped, first occurrence wins.
    ///
    /// The selection stays in effect for later [`cleanup`](Self::cleanup)
    /// calls until replaced or cleared.
    pub fn set_selection<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.clear();
        for id in ids {
            let id = id.into();
            if !self.selection.contains(&id) {
                self.selection.push(id);
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Clean the selected targets, in selection order.
    ///
    /// Only the cleanup half of each selected result is reset; what the last
    /// scan found is kept. With an empty selection nothing runs and no
    /// completion event is sent.
    pub fn cleanup(&mut self) -> Report {
        if self.selection.is_empty() {
            self.log("No cleanup targets selected.");
            return Report::new(Pass::Cleanup, &self.registry, &self.results);
        }

        tracing::info!("starting cleanup of {} targets", self.selection.len());
        self.log("\n—— Starting Cleanup ——");
        self.progress(0);

        for id in &self.selection {
            if let Some(i) = self.registry.position(id) {
                self.results[i].reset_cleanup();
            }
        }

        let progress = Progress::new(self.sink.as_ref(), self.selection.len());
        let mut total_freed = 0u64;

        for id in &self.selection {
            let (Some(i), Some(target)) = (self.registry.position(id), self.registry.get(id)) else {
                tracing::warn!("unknown target id: {}", id);
                progress.step(None);
                continue;
            };

            progress.log(format!("Cleaning {}...", target.name()));
            let result = &mut self.results[i];
            let error = match target.cleaner().clean(target, self.runner.as_ref()) {
                Ok(Outcome::Done(tally)) => {
                    result.cleaned = true;
                    result.items_removed = tally.items;
                    result.space_freed = tally.bytes;
                    if tally.bytes > 0 {
                        total_freed += tally.bytes;
                        progress.log(format!("  Freed {}", result.space_freed_formatted()));
                    }
                    None
                }
                Ok(Outcome::Skipped) => None,
                Err(e) => {
                    let message = format!("Error cleaning {}: {}", target.name(), e);
                    tracing::error!("{}", message);
                    result.error = Some(e.to_string());
                    Some(message)
                }
            };
            progress.step(error);
        }

        self.log("\n—— Cleanup Complete ——");
        if total_freed > 0 {
            self.log(format!("Total space freed: {}", format_size(total_freed)));
        } else {
            self.log("No space was freed during cleanup.");
        }
        self.progress(100);

        let report = Report::new(Pass::Cleanup, &self.registry, &self.results);
        tracing::info!("cleanup completed, freed {}", format_size(total_freed));
        self.sink.emit(EngineEvent::CleanupComplete(report.clone()));
        report
    }
}
