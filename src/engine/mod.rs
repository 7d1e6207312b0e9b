//! The scan and cleanup passes over one registry.

mod reclaim;
mod scan;

use std::sync::{Arc, Mutex};

use crate::command::CommandRunner;
use crate::events::{EngineEvent, EventSink};
use crate::registry::TargetRegistry;
use crate::report::{CleanupResult, TargetView};
use crate::target::CleanupCategory;

pub struct DiskCleanup {
    registry: TargetRegistry,
    runner: Arc<dyn CommandRunner>,
    sink: Arc<dyn EventSink>,
    /// Indexed like the registry.
    results: Vec<CleanupResult>,
    selection: Vec<String>,
    parallel_scan: bool,
}

impl DiskCleanup {
    pub fn new(
        registry: TargetRegistry,
        runner: Arc<dyn CommandRunner>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let results = registry.targets().map(CleanupResult::for_target).collect();
        Self {
            registry,
            runner,
            sink,
            results,
            selection: Vec::new(),
            parallel_scan: false,
        }
    }

    /// Scan targets concurrently. Result order and failure isolation are unchanged.
    pub fn with_parallel_scan(mut self, parallel: bool) -> Self {
        self.parallel_scan = parallel;
        self
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Latest result per target, in registry order.
    pub fn results(&self) -> &[CleanupResult] {
        &self.results
    }

    pub fn result(&self, id: &str) -> Option<&CleanupResult> {
        self.registry.position(id).map(|i| &self.results[i])
    }

    /// Target metadata merged with the latest results, grouped by category.
    /// Categories without targets are left out.
    pub fn cleanup_targets(&self) -> Vec<(CleanupCategory, Vec<TargetView>)> {
        CleanupCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let views: Vec<TargetView> = self
                    .registry
                    .ids_in(category)
                    .into_iter()
                    .filter_map(|id| {
                        let target = self.registry.get(id)?;
                        let result = self.result(id)?;
                        Some(TargetView::new(target, result))
                    })
                    .collect();
                (!views.is_empty()).then_some((category, views))
            })
            .collect()
    }

    fn log(&self, line: impl Into<String>) {
        self.sink.emit(EngineEvent::Log(line.into()));
    }

    fn progress(&self, percent: u8) {
        self.sink.emit(EngineEvent::Progress(percent));
    }
}

/// Per-pass progress bookkeeping.
///
/// Target steps cover 0..=90; the final 10 is reserved for the summary. The
/// counter and emission share one lock so progress never goes backwards when
/// targets finish out of order.
struct Progress<'a> {
    sink: &'a dyn EventSink,
    total: usize,
    done: Mutex<usize>,
}

impl<'a> Progress<'a> {
    fn new(sink: &'a dyn EventSink, total: usize) -> Self {
        Self {
            sink,
            total,
            done: Mutex::new(0),
        }
    }

    fn log(&self, line: String) {
        let _guard = self.done.lock().unwrap_or_else(|e| e.into_inner());
        self.sink.emit(EngineEvent::Log(line));
    }

    /// Mark one target finished, reporting `error` first if there was one.
    fn step(&self, error: Option<String>) {
        let mut done = self.done.lock().unwrap_or_else(|e| e.into_inner());
        *done += 1;
        if let Some(message) = error {
            self.sink.emit(EngineEvent::Error(message));
        }
        self.sink
            .emit(EngineEvent::Progress(step_percent(*done, self.total)));
    }
}

fn step_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    (done.min(total) * 90 / total) as u8
}
