//! Scan/cleanup strategies a target can carry.

pub mod filter;
pub mod journal;
pub mod kernels;
pub mod path;

pub use journal::JournalCleaner;
pub use kernels::KernelCleaner;
pub use path::PathCleaner;
