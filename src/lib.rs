//! Disk-space reclamation for Linux workstations.

pub mod cleaner;
pub mod cli;
pub mod command;
pub mod config;
pub mod disk_info;
pub mod engine;
pub mod error;
pub mod events;
pub mod output;
pub mod registry;
pub mod report;
pub mod strategies;
pub mod target;
pub mod user;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use engine::DiskCleanup;
pub use error::{CleanupError, Result};
pub use events::{EngineEvent, EventSink};
pub use registry::TargetRegistry;
pub use report::{CleanupResult, Report, TargetView};
pub use target::{CleanupCategory, CleanupTarget};
pub use user::UserContext;
