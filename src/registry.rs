use std::collections::HashMap;
use std::sync::Arc;

use crate::strategies::{JournalCleaner, KernelCleaner};
use crate::target::{CleanupCategory, CleanupTarget};
use crate::user::UserContext;

#[derive(Debug, Clone)]
struct Entry {
    target: CleanupTarget,
    category: CleanupCategory,
}

/// Registered targets in registration order, with their categories.
///
/// Every `~` path is resolved against the injected [`UserContext`] when the
/// target is registered, so the process's own (possibly root) home never leaks in.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    user: UserContext,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl TargetRegistry {
    /// An empty registry.
    pub fn new(user: UserContext) -> Self {
        Self {
            user,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// A registry holding the built-in catalog.
    pub fn with_builtin(user: UserContext, journal_retention: &str) -> Self {
        let mut registry = Self::new(user);
        for (target, category) in builtin_targets(journal_retention) {
            registry.register(target, category);
        }
        registry
    }

    /// Add a target, resolving `~` in its path.
    ///
    /// # Panics
    ///
    /// Panics if a target with the same id is already registered.
    pub fn register(&mut self, mut target: CleanupTarget, category: CleanupCategory) {
        assert!(
            !self.index.contains_key(target.id()),
            "duplicate cleanup target id '{}'",
            target.id()
        );
        target.resolve_home(&self.user);
        tracing::debug!("added target '{}' with path: {}", target.name(), target.path());

        self.index.insert(target.id().to_string(), self.entries.len());
        self.entries.push(Entry { target, category });
    }

    /// Drop a target. Returns whether it was registered.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.index.remove(id) else {
            return false;
        };
        self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        true
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CleanupTarget> {
        self.index.get(id).map(|&i| &self.entries[i].target)
    }

    pub fn category_of(&self, id: &str) -> Option<CleanupCategory> {
        self.index.get(id).map(|&i| self.entries[i].category)
    }

    /// Position of a target in registration order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Targets in registration order.
    pub fn targets(&self) -> impl Iterator<Item = &CleanupTarget> {
        self.entries.iter().map(|e| &e.target)
    }

    /// Ids of the targets in `category`, in registration order.
    pub fn ids_in(&self, category: CleanupCategory) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.target.id())
            .collect()
    }
}

/// The default catalog: temp dirs, package caches, browser caches, logs,
/// trash, plus the journal and old kernels through their own strategies.
pub fn builtin_targets(journal_retention: &str) -> Vec<(CleanupTarget, CleanupCategory)> {
    vec![
        (
            CleanupTarget::new(
                "temp_files",
                "Temporary Files",
                "System temporary files in /tmp directory",
                "/tmp",
            )
            .requires_elevation(true)
            .pattern("*")
            .age_days(7),
            CleanupCategory::Temporary,
        ),
        (
            CleanupTarget::new(
                "user_temp_files",
                "User Temporary Files",
                "User temporary files in ~/tmp",
                "~/tmp",
            )
            .pattern("*")
            .age_days(7),
            CleanupCategory::Temporary,
        ),
        (
            CleanupTarget::new(
                "apt_cache",
                "APT Cache",
                "Cached package files from APT",
                "/var/cache/apt/archives",
            )
            .requires_elevation(true)
            .pattern("*.deb"),
            CleanupCategory::PackageCache,
        ),
        (
            CleanupTarget::new(
                "flatpak_cache",
                "Flatpak Cache",
                "Cached Flatpak application data",
                "~/.cache/flatpak",
            ),
            CleanupCategory::PackageCache,
        ),
        (
            CleanupTarget::new(
                "snap_cache",
                "Snap Cache",
                "Cached Snap package data",
                "/var/lib/snapd/cache",
            )
            .requires_elevation(true),
            CleanupCategory::PackageCache,
        ),
        (
            CleanupTarget::new(
                "browser_cache",
                "Browser Cache",
                "Browser cached data (Firefox)",
                "~/.cache/mozilla",
            ),
            CleanupCategory::ApplicationCache,
        ),
        (
            CleanupTarget::new(
                "chrome_cache",
                "Chrome Cache",
                "Google Chrome cached data",
                "~/.cache/google-chrome",
            ),
            CleanupCategory::ApplicationCache,
        ),
        (
            CleanupTarget::new(
                "system_logs",
                "System Logs",
                "Rotated system log files older than 30 days",
                "/var/log",
            )
            .requires_elevation(true)
            .pattern("*.log.*")
            .age_days(30),
            CleanupCategory::Logs,
        ),
        (
            CleanupTarget::new(
                "journal_logs",
                "Journal Logs",
                "Systemd journal logs",
                "/var/log/journal",
            )
            .requires_elevation(true)
            .with_cleaner(Arc::new(JournalCleaner::new(journal_retention))),
            CleanupCategory::Logs,
        ),
        (
            CleanupTarget::new(
                "user_trash",
                "User Trash",
                "Items in the user's trash",
                "~/.local/share/Trash",
            ),
            CleanupCategory::Trash,
        ),
        (
            CleanupTarget::new("old_kernels", "Old Kernels", "Old kernel packages", "")
                .requires_elevation(true)
                .dangerous(true)
                .with_cleaner(Arc::new(KernelCleaner)),
            CleanupCategory::OldKernels,
        ),
    ]
}
