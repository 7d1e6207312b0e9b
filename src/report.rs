//! Per-target results and the aggregated reports handed to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::TargetRegistry;
use crate::target::{CleanupCategory, CleanupTarget};
use crate::utils::format_size;

/// Outcome of the latest scan and cleanup of one target.
///
/// An `error` does not clear the other fields; partial results are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub target_id: String,
    pub target_name: String,
    pub scanned: bool,
    pub cleaned: bool,
    pub items_found: u64,
    pub items_removed: u64,
    pub space_found: u64,
    pub space_freed: u64,
    pub error: Option<String>,
}

impl CleanupResult {
    /// A fresh zero-value result for `target`.
    pub fn for_target(target: &CleanupTarget) -> Self {
        Self {
            target_id: target.id().to_string(),
            target_name: target.name().to_string(),
            scanned: false,
            cleaned: false,
            items_found: 0,
            items_removed: 0,
            space_found: 0,
            space_freed: 0,
            error: None,
        }
    }

    /// Clear the cleanup half, keeping what the last scan found.
    pub fn reset_cleanup(&mut self) {
        self.cleaned = false;
        self.items_removed = 0;
        self.space_freed = 0;
        self.error = None;
    }

    pub fn space_found_formatted(&self) -> String {
        format_size(self.space_found)
    }

    pub fn space_freed_formatted(&self) -> String {
        format_size(self.space_freed)
    }
}

/// Which pass produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Scan,
    Cleanup,
}

/// Item and byte counts over a group of results.
///
/// Cleaned counts only include results with `cleaned = true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub items_found: u64,
    pub space_found: u64,
    pub items_cleaned: u64,
    pub space_freed: u64,
    pub space_found_formatted: String,
    pub space_freed_formatted: String,
}

impl Totals {
    pub fn over<'a>(results: impl IntoIterator<Item = &'a CleanupResult>) -> Self {
        let mut totals = Totals::default();
        for r in results {
            totals.items_found += r.items_found;
            totals.space_found += r.space_found;
            if r.cleaned {
                totals.items_cleaned += r.items_removed;
                totals.space_freed += r.space_freed;
            }
        }
        totals.space_found_formatted = format_size(totals.space_found);
        totals.space_freed_formatted = format_size(totals.space_freed);
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: CleanupCategory,
    pub label: &'static str,
    pub target_ids: Vec<String>,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Immutable snapshot returned by a scan or cleanup pass.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub pass: Pass,
    pub generated_at: DateTime<Utc>,
    /// One entry per registered target, in registry order.
    pub targets: Vec<CleanupResult>,
    /// One entry per category, in declaration order.
    pub categories: Vec<CategorySummary>,
    pub totals: Totals,
}

impl Report {
    pub fn new(pass: Pass, registry: &TargetRegistry, results: &[CleanupResult]) -> Self {
        let categories = CleanupCategory::ALL
            .into_iter()
            .map(|category| {
                let members: Vec<&CleanupResult> = results
                    .iter()
                    .filter(|r| registry.category_of(&r.target_id) == Some(category))
                    .collect();
                CategorySummary {
                    category,
                    label: category.label(),
                    target_ids: members.iter().map(|r| r.target_id.clone()).collect(),
                    totals: Totals::over(members.iter().copied()),
                }
            })
            .collect();

        Self {
            pass,
            generated_at: Utc::now(),
            targets: results.to_vec(),
            categories,
            totals: Totals::over(results),
        }
    }

    pub fn target(&self, id: &str) -> Option<&CleanupResult> {
        self.targets.iter().find(|r| r.target_id == id)
    }

    pub fn category(&self, category: CleanupCategory) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.targets
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| (r.target_name.as_str(), e)))
    }
}

/// Static target metadata merged with its latest result, for rendering and
/// building a cleanup selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub path: String,
    pub requires_elevation: bool,
    pub dangerous: bool,
    pub can_scan: bool,
    pub can_remove: bool,
    pub strategy: &'static str,
    pub space_found_formatted: String,
    pub space_freed_formatted: String,
    #[serde(flatten)]
    pub result: CleanupResult,
}

impl TargetView {
    pub fn new(target: &CleanupTarget, result: &CleanupResult) -> Self {
        Self {
            id: target.id().to_string(),
            name: target.name().to_string(),
            description: target.description().to_string(),
            path: target.path().to_string(),
            requires_elevation: target.is_elevated(),
            dangerous: target.is_dangerous(),
            can_scan: target.can_scan(),
            can_remove: target.can_remove(),
            strategy: target.cleaner().name(),
            space_found_formatted: result.space_found_formatted(),
            space_freed_formatted: result.space_freed_formatted(),
            result: result.clone(),
        }
    }
}
