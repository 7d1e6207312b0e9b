use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tidylinux::cli::{Cli, Command};
use tidylinux::command::{running_as_root, SystemRunner};
use tidylinux::disk_info::filesystem_usage;
use tidylinux::events::{EngineEvent, EventSink, NullSink};
use tidylinux::output;
use tidylinux::{CleanupCategory, Config, DiskCleanup, Report, TargetView};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_default().context("failed to load default config")?,
    };

    let user = config.resolve_user();
    tracing::info!("cleaning on behalf of user '{}'", user.username());
    let home = user.home().to_path_buf();
    let registry = config.build_registry(user);
    let runner = Arc::new(SystemRunner::new(config.command_timeout()));

    let json = match &cli.command {
        Command::Targets { json } | Command::Scan { json, .. } | Command::Clean { json, .. } => *json,
    };
    let (tx, rx) = mpsc::channel();
    let sink: Arc<dyn EventSink> = if json { Arc::new(NullSink) } else { Arc::new(tx) };
    let mut engine =
        DiskCleanup::new(registry, runner, sink).with_parallel_scan(config.parallel_scan);

    match cli.command {
        Command::Targets { json } => {
            let groups = engine.cleanup_targets();
            if json {
                print_json(&groups)?;
            } else {
                output::print_banner();
                output::print_targets(&groups, &home);
            }
        }

        Command::Scan { category, json } => {
            let only = parse_category(category.as_deref())?;
            if !json {
                output::print_banner();
            }
            let report = run_pass(&mut engine, &rx, DiskCleanup::scan)?;
            if json {
                print_json(&report)?;
            } else {
                output::print_scan_report(&report, only);
            }
        }

        Command::Clean {
            targets,
            category,
            include_dangerous,
            confirm,
            json,
        } => {
            let only = parse_category(category.as_deref())?;
            if !json {
                output::print_banner();
            }
            run_pass(&mut engine, &rx, DiskCleanup::scan)?;

            let groups = engine.cleanup_targets();
            let views: Vec<&TargetView> = groups
                .iter()
                .filter(|(c, _)| only.map_or(true, |o| o == *c))
                .flat_map(|(_, views)| views.iter())
                .collect();
            let selected = select(&views, &targets, include_dangerous)?;

            if selected.is_empty() {
                if json {
                    print_json(&engine.results())?;
                } else {
                    output::print_info("Nothing to clean.");
                }
                return Ok(());
            }

            if !confirm {
                if json {
                    print_json(&selected)?;
                } else {
                    println!();
                    output::print_no_confirm_warning();
                    output::print_selection(&selected);
                    output::print_dry_run_footer();
                }
                return Ok(());
            }

            let dangerous: Vec<&str> = selected
                .iter()
                .filter(|v| v.dangerous)
                .map(|v| v.name.as_str())
                .collect();
            if !json && !dangerous.is_empty() {
                output::print_warning(&format!(
                    "cleaning targets flagged dangerous: {}",
                    dangerous.join(", ")
                ));
            }

            if !json && !running_as_root() && selected.iter().any(|v| v.requires_elevation) {
                output::print_info("Some targets need root; you may be asked for your sudo password.");
            }

            engine.set_selection(selected.iter().map(|v| v.id.clone()));
            let report = run_pass(&mut engine, &rx, DiskCleanup::cleanup)?;

            if json {
                print_json(&report)?;
            } else {
                println!();
                output::print_clean_complete(&report.totals.space_freed_formatted);
                if let Some(usage) = filesystem_usage(Path::new("/")) {
                    output::print_disk_usage("/", &usage);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_category(key: Option<&str>) -> Result<Option<CleanupCategory>> {
    key.map(|k| {
        CleanupCategory::from_key(k).ok_or_else(|| {
            let known: Vec<&str> = CleanupCategory::ALL.iter().map(|c| c.key()).collect();
            anyhow!("unknown category '{}' (expected one of: {})", k, known.join(", "))
        })
    })
    .transpose()
}

/// Explicit ids, or every safe target the scan found space in.
fn select<'a>(
    views: &[&'a TargetView],
    ids: &[String],
    include_dangerous: bool,
) -> Result<Vec<&'a TargetView>> {
    if ids.is_empty() {
        return Ok(views
            .iter()
            .copied()
            .filter(|v| v.result.space_found > 0 && (include_dangerous || !v.dangerous))
            .collect());
    }

    let mut selected = Vec::with_capacity(ids.len());
    for id in ids {
        let view = views
            .iter()
            .copied()
            .find(|v| &v.id == id)
            .ok_or_else(|| anyhow!("unknown target '{}' (see `tidylinux targets`)", id))?;
        if view.dangerous && !include_dangerous {
            bail!(
                "target '{}' is flagged dangerous; pass --include-dangerous to clean it",
                id
            );
        }
        selected.push(view);
    }
    Ok(selected)
}

/// Run one engine pass on a worker thread, printing its events as they arrive.
fn run_pass<F>(engine: &mut DiskCleanup, events: &Receiver<EngineEvent>, pass: F) -> Result<Report>
where
    F: FnOnce(&mut DiskCleanup) -> Report + Send,
{
    thread::scope(|scope| {
        let worker = scope.spawn(move || pass(engine));
        loop {
            match events.recv_timeout(Duration::from_millis(50)) {
                Ok(event) => output::print_event(&event),
                Err(RecvTimeoutError::Timeout) if worker.is_finished() => break,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for event in events.try_iter() {
            output::print_event(&event);
        }
        worker
            .join()
            .map_err(|_| anyhow!("cleanup worker panicked"))
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
