use std::sync::mpsc;

use crate::report::Report;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Percentage in 0..=100, non-decreasing within a pass.
    Progress(u8),
    /// Human-readable status line.
    Log(String),
    Error(String),
    ScanComplete(Report),
    CleanupComplete(Report),
}

/// Receives engine events. Emission order is preserved per pass.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

impl EventSink for mpsc::Sender<EngineEvent> {
    fn emit(&self, event: EngineEvent) {
        // The receiving side may be gone; that is not the engine's problem.
        let _ = self.send(event);
    }
}

impl EventSink for mpsc::SyncSender<EngineEvent> {
    fn emit(&self, event: EngineEvent) {
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(EngineEvent) + Send + Sync,
{
    fn emit(&self, event: EngineEvent) {
        (self.0)(event)
    }
}
