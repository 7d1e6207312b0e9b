use std::ffi::OsStr;
use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use globset::{Glob, GlobMatcher};

use crate::error::{CleanupError, Result};
use crate::target::CleanupTarget;

const SECS_PER_DAY: u64 = 86_400;

/// Decides whether a regular file belongs to a target.
#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: Option<GlobMatcher>,
    age_days: Option<u32>,
    now: SystemTime,
}

impl FileFilter {
    pub fn new(pattern: Option<&str>, age_days: Option<u32>) -> Result<Self> {
        let pattern = pattern.map(compile_pattern).transpose()?;
        Ok(Self {
            pattern,
            age_days,
            now: SystemTime::now(),
        })
    }

    pub fn for_target(target: &CleanupTarget) -> Result<Self> {
        Self::new(target.file_pattern(), target.min_age_days())
    }

    /// Evaluate ages against a fixed clock.
    pub fn at(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    pub fn matches_name(&self, name: &OsStr) -> bool {
        match &self.pattern {
            Some(matcher) => matcher.is_match(Path::new(name)),
            None => true,
        }
    }

    /// True when `modified` lies at least `age_days` whole days in the past.
    pub fn old_enough(&self, modified: SystemTime) -> bool {
        let Some(days) = self.age_days else {
            return true;
        };
        match self.now.duration_since(modified) {
            Ok(age) => age.as_secs() / SECS_PER_DAY >= u64::from(days),
            // Modified in the future: never old.
            Err(_) => days == 0,
        }
    }

    /// Apply both predicates to a file. Unreadable mtimes never qualify.
    pub fn accepts(&self, name: &OsStr, meta: &Metadata) -> bool {
        if !self.matches_name(name) {
            return false;
        }
        if self.age_days.is_none() {
            return true;
        }
        meta.modified().map(|m| self.old_enough(m)).unwrap_or(false)
    }
}

/// Compile a glob, mapping failures to [`CleanupError::Pattern`].
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|source| CleanupError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}
