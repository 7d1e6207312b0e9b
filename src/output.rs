use std::path::Path;

use colored::Colorize;

use crate::disk_info::DiskUsage;
use crate::events::EngineEvent;
use crate::report::{Report, TargetView};
use crate::target::CleanupCategory;
use crate::utils::{display_path, format_size};

pub fn print_banner() {
    println!(
        "{}",
        concat!("tidylinux - Linux Disk Cleanup v", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!();
}

/// Render one engine event as it arrives.
pub fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::Log(line) => print_log_line(line),
        EngineEvent::Error(message) => println!("{} {}", "Error:".red().bold(), message.red()),
        EngineEvent::Progress(percent) => tracing::debug!("progress {}%", percent),
        EngineEvent::ScanComplete(_) | EngineEvent::CleanupComplete(_) => {}
    }
}

fn print_log_line(line: &str) {
    // Section breaks arrive as a leading newline.
    let (gap, text) = match line.strip_prefix('\n') {
        Some(rest) => ("\n", rest),
        None => ("", line),
    };
    if text.starts_with("——") {
        println!("{gap}{}", text.bold().white());
    } else if text.starts_with("  ") {
        println!("{gap}{}", text.dimmed());
    } else if gap.is_empty() {
        println!("{text}");
    } else {
        println!("{gap}{}", text.bold());
    }
}

pub fn print_category_header(label: &str) {
    println!("{}", format!("=== {label} ===").bold().white());
}

pub fn print_target_entry(view: &TargetView, home: &Path) {
    let mut flags = Vec::new();
    if view.requires_elevation {
        flags.push("root");
    }
    if view.dangerous {
        flags.push("dangerous");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!("[{}]", flags.join(", "))
    };
    println!(
        "  {:<18} {:<24} {}  {}",
        view.id.cyan(),
        view.name,
        display_path(Path::new(&view.path), home).dimmed(),
        flags.yellow()
    );
}

/// `targets` listing.
pub fn print_targets(groups: &[(CleanupCategory, Vec<TargetView>)], home: &Path) {
    for (category, views) in groups {
        print_category_header(category.label());
        for view in views {
            print_target_entry(view, home);
        }
        println!();
    }
}

/// Per-target table of a scan report, optionally limited to one category.
pub fn print_scan_report(report: &Report, only: Option<CleanupCategory>) {
    println!();
    for summary in &report.categories {
        if only.is_some_and(|c| c != summary.category) || summary.target_ids.is_empty() {
            continue;
        }
        print_category_header(summary.label);
        for id in &summary.target_ids {
            let Some(result) = report.target(id) else {
                continue;
            };
            if let Some(error) = &result.error {
                println!("  {:<30} {}", result.target_name, error.red());
            } else if result.scanned {
                println!(
                    "  {:<30} {:>10}  {}",
                    result.target_name,
                    result.space_found_formatted().yellow(),
                    format!("{} items", result.items_found).dimmed()
                );
            } else {
                println!("  {:<30} {}", result.target_name, "not present".dimmed());
            }
        }
        print_category_total(summary.label, &summary.totals.space_found_formatted);
    }

    let total = match only.and_then(|c| report.category(c)) {
        Some(summary) => &summary.totals.space_found_formatted,
        None => &report.totals.space_found_formatted,
    };
    print_separator();
    print_grand_total(total);
}

pub fn print_category_total(label: &str, total: &str) {
    println!(
        "  {} {}",
        format!("{label} total:").bold(),
        total.green()
    );
    println!();
}

pub fn print_separator() {
    println!("  {}", "─".repeat(45).dimmed());
}

pub fn print_grand_total(total: &str) {
    println!(
        "  {:<30} {}",
        "Total reclaimable:".bold(),
        total.green().bold()
    );
    println!();
}

/// Targets a clean would touch, with the space found for each.
pub fn print_selection(views: &[&TargetView]) {
    println!("{}", "Selected for cleanup:".bold());
    for view in views {
        let note = if view.dangerous { "  [dangerous]" } else { "" };
        println!(
            "  {:<30} {}{}",
            view.name,
            view.space_found_formatted.yellow(),
            note.red()
        );
    }
    println!();
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "Warning:".red().bold(), msg.red());
}

pub fn print_info(msg: &str) {
    println!("{} {}", "Info:".cyan().bold(), msg);
}

pub fn print_no_confirm_warning() {
    println!(
        "{}",
        "No --confirm flag provided. Nothing will be deleted."
            .yellow()
            .bold()
    );
    println!();
}

pub fn print_dry_run_footer() {
    println!(
        "{}",
        "This was a dry run. Run `tidylinux clean --confirm` to delete."
            .yellow()
            .bold()
    );
}

pub fn print_clean_complete(freed: &str) {
    println!(
        "{} {}",
        "Cleaned!".green().bold(),
        format!("{freed} freed.").green()
    );
}

pub fn print_disk_usage(mount: &str, usage: &DiskUsage) {
    println!(
        "{} {} free of {} ({:.1}% used)",
        format!("{mount}:").bold(),
        format_size(usage.available).green(),
        format_size(usage.total),
        usage.usage_percent()
    );
}
