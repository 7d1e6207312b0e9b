//! systemd journal, measured and vacuumed through `journalctl`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::cleaner::{Cleaner, Outcome, Tally};
use crate::command::{CommandRunner, Invocation};
use crate::error::{CleanupError, Result};
use crate::target::CleanupTarget;

/// Retention passed to `--vacuum-time` unless configured otherwise.
pub const DEFAULT_RETENTION: &str = "7d";

static TAKE_UP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"take up (\d+(?:\.\d+)?)\s?([KMGT]?)B?\b").expect("Invalid journal usage regex")
});

static ANY_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s?([KMGT])B?\b").expect("Invalid journal size regex")
});

#[derive(Debug, Clone)]
pub struct JournalCleaner {
    retention: String,
}

impl Default for JournalCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl JournalCleaner {
    pub fn new(retention: impl Into<String>) -> Self {
        Self {
            retention: retention.into(),
        }
    }

    fn disk_usage(&self, target: &CleanupTarget, runner: &dyn CommandRunner, context: &str) -> Result<String> {
        let output = runner.run(
            &Invocation::new("journalctl")
                .arg("--disk-usage")
                .elevated(target.is_elevated()),
            context,
        )?;
        tracing::debug!("journal usage output: {}", output.stdout.trim());
        Ok(output.stdout)
    }
}

impl Cleaner for JournalCleaner {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn scan(&self, target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome> {
        let usage = self.disk_usage(target, runner, "Failed to get journal disk usage")?;
        let bytes = parse_journal_size(&usage)?;
        Ok(Outcome::Done(Tally::new(1, bytes)))
    }

    fn clean(&self, target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome> {
        let before = self.disk_usage(target, runner, "Failed to get journal disk usage")?;
        let before = lenient_size(&before);

        runner.run(
            &Invocation::new("journalctl")
                .arg(format!("--vacuum-time={}", self.retention))
                .elevated(target.is_elevated()),
            "Failed to clean journal logs",
        )?;

        let after = self.disk_usage(
            target,
            runner,
            "Failed to get journal disk usage after cleanup",
        )?;
        let after = lenient_size(&after);

        Ok(Outcome::Done(Tally::new(1, before.saturating_sub(after))))
    }
}

/// Cleanup keeps going on unparsable usage text and counts it as zero.
fn lenient_size(text: &str) -> u64 {
    parse_journal_size(text).unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        0
    })
}

/// Parse `journalctl --disk-usage` text into bytes.
///
/// Looks for the size right after "take up" first, then for any
/// `<number><K|M|G|T>[B]` in the text.
pub fn parse_journal_size(text: &str) -> Result<u64> {
    if let Some(caps) = TAKE_UP.captures(text) {
        return Ok(to_bytes(&caps));
    }
    tracing::warn!("could not parse journal disk usage, trying fallback: {}", text.trim());
    if let Some(caps) = ANY_SIZE.captures(text) {
        return Ok(to_bytes(&caps));
    }
    Err(CleanupError::Detection(format!(
        "Could not determine journal disk usage from {:?}",
        text.trim()
    )))
}

fn to_bytes(caps: &Captures<'_>) -> u64 {
    let value: f64 = caps[1].parse().unwrap_or(0.0);
    let multiplier: u64 = match &caps[2] {
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        _ => 1,
    };
    (value * multiplier as f64) as u64
}
