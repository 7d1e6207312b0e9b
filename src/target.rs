use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cleaner::Cleaner;
use crate::strategies::PathCleaner;
use crate::user::UserContext;

/// Display and aggregation grouping for targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupCategory {
    Temporary,
    PackageCache,
    Logs,
    ApplicationCache,
    Trash,
    OldKernels,
    Custom,
}

impl CleanupCategory {
    pub const ALL: [CleanupCategory; 7] = [
        CleanupCategory::Temporary,
        CleanupCategory::PackageCache,
        CleanupCategory::Logs,
        CleanupCategory::ApplicationCache,
        CleanupCategory::Trash,
        CleanupCategory::OldKernels,
        CleanupCategory::Custom,
    ];

    /// Machine-readable key used in reports and on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            CleanupCategory::Temporary => "temporary",
            CleanupCategory::PackageCache => "package_cache",
            CleanupCategory::Logs => "logs",
            CleanupCategory::ApplicationCache => "application_cache",
            CleanupCategory::Trash => "trash",
            CleanupCategory::OldKernels => "old_kernels",
            CleanupCategory::Custom => "custom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CleanupCategory::Temporary => "Temporary",
            CleanupCategory::PackageCache => "Package Cache",
            CleanupCategory::Logs => "Logs",
            CleanupCategory::ApplicationCache => "Application Cache",
            CleanupCategory::Trash => "Trash",
            CleanupCategory::OldKernels => "Old Kernels",
            CleanupCategory::Custom => "Custom",
        }
    }

    /// Parse a key, accepting dashes in place of underscores.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for CleanupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One reclaimable location or package-management operation.
///
/// Immutable once registered. Targets built with [`CleanupTarget::new`] use
/// the default path-walk strategy; [`CleanupTarget::with_cleaner`] swaps in
/// a specialized one and clears `can_scan`/`can_remove`.
#[derive(Debug, Clone)]
pub struct CleanupTarget {
    id: String,
    name: String,
    description: String,
    path: String,
    requires_elevation: bool,
    can_scan: bool,
    can_remove: bool,
    dangerous: bool,
    recursive: bool,
    pattern: Option<String>,
    age_days: Option<u32>,
    path_resolved: bool,
    cleaner: Arc<dyn Cleaner>,
}

impl CleanupTarget {
    /// Create a path-based target.
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty. An empty id is a catalog bug, not a runtime
    /// condition.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let id = id.into();
        assert!(!id.trim().is_empty(), "cleanup target must have a valid id");
        Self {
            id,
            name: name.into(),
            description: description.into(),
            path: path.into().trim().to_string(),
            requires_elevation: false,
            can_scan: true,
            can_remove: true,
            dangerous: false,
            recursive: true,
            pattern: None,
            age_days: None,
            path_resolved: false,
            cleaner: Arc::new(PathCleaner),
        }
    }

    pub fn requires_elevation(mut self, value: bool) -> Self {
        self.requires_elevation = value;
        self
    }

    pub fn dangerous(mut self, value: bool) -> Self {
        self.dangerous = value;
        self
    }

    pub fn recursive(mut self, value: bool) -> Self {
        self.recursive = value;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn age_days(mut self, days: u32) -> Self {
        self.age_days = Some(days);
        self
    }

    /// Route scan and cleanup through a specialized strategy.
    pub fn with_cleaner(mut self, cleaner: Arc<dyn Cleaner>) -> Self {
        self.cleaner = cleaner;
        self.can_scan = false;
        self.can_remove = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_elevated(&self) -> bool {
        self.requires_elevation
    }

    pub fn can_scan(&self) -> bool {
        self.can_scan
    }

    pub fn can_remove(&self) -> bool {
        self.can_remove
    }

    pub fn is_dangerous(&self) -> bool {
        self.dangerous
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn file_pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn min_age_days(&self) -> Option<u32> {
        self.age_days
    }

    pub fn is_path_resolved(&self) -> bool {
        self.path_resolved
    }

    pub fn cleaner(&self) -> &dyn Cleaner {
        self.cleaner.as_ref()
    }

    /// Substitute a leading `~` with the user's home, at most once per target.
    pub(crate) fn resolve_home(&mut self, user: &UserContext) {
        if self.path_resolved {
            return;
        }
        if let Some(expanded) = user.expand(&self.path) {
            tracing::debug!("expanded path: {} -> {}", self.path, expanded);
            self.path = expanded;
            self.path_resolved = true;
        }
    }
}
