use std::fmt;
use std::ops::AddAssign;

use crate::command::CommandRunner;
use crate::error::Result;
use crate::target::CleanupTarget;

/// Items and bytes counted by a scan or removed by a cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub items: u64,
    pub bytes: u64,
}

impl Tally {
    pub fn new(items: u64, bytes: u64) -> Self {
        Self { items, bytes }
    }

    pub fn add_file(&mut self, bytes: u64) {
        self.items += 1;
        self.bytes += bytes;
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        self.items += rhs.items;
        self.bytes += rhs.bytes;
    }
}

/// What a strategy did with one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing there to look at (missing path, nothing to purge). The result
    /// stays unmarked.
    Skipped,
    Done(Tally),
}

/// The trait every cleanup strategy implements.
///
/// The default path walk is one implementation; old kernels and the systemd
/// journal are the others. Each registered target carries its strategy.
pub trait Cleaner: fmt::Debug + Send + Sync {
    /// Machine-readable strategy name (e.g. "path-walk").
    fn name(&self) -> &'static str;

    /// Estimate what could be reclaimed. Never modifies anything.
    fn scan(&self, target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome>;

    /// Remove the target's data and report what was freed.
    fn clean(&self, target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome>;
}
