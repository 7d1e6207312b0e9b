//! Old kernel packages (Debian/Ubuntu).

use std::sync::LazyLock;

use regex::Regex;

use crate::cleaner::{Cleaner, Outcome, Tally};
use crate::command::{CommandRunner, Invocation};
use crate::error::{CleanupError, Result};
use crate::target::CleanupTarget;

static BASE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(?:\.\d+)?(?:-\d+)?").expect("Invalid kernel version regex"));

static VERSIONED_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("Invalid package version regex"));

/// An installed kernel package that is not the running kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OldKernel {
    pub package: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KernelCleaner;

impl Cleaner for KernelCleaner {
    fn name(&self) -> &'static str {
        "old-kernels"
    }

    fn scan(&self, _target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome> {
        let kernels = detect_old_kernels(runner)?;
        let tally = total(&kernels);
        tracing::debug!("found {} old kernel packages, {} bytes", tally.items, tally.bytes);
        Ok(Outcome::Done(tally))
    }

    fn clean(&self, target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome> {
        let kernels = detect_old_kernels(runner)?;
        if kernels.is_empty() {
            tracing::info!("no old kernels found to remove");
            return Ok(Outcome::Skipped);
        }

        let purge = Invocation::new("apt-get")
            .args(["remove", "--purge", "-y"])
            .args(kernels.iter().map(|k| k.package.clone()))
            .elevated(target.is_elevated());
        runner.run(&purge, "Failed to remove old kernels")?;

        let autoremove = Invocation::new("apt-get")
            .args(["autoremove", "-y"])
            .elevated(target.is_elevated());
        runner.run(&autoremove, "Failed to clean up kernel dependencies")?;

        Ok(Outcome::Done(total(&kernels)))
    }
}

fn total(kernels: &[OldKernel]) -> Tally {
    kernels
        .iter()
        .fold(Tally::default(), |mut t, k| {
            t.add_file(k.bytes);
            t
        })
}

/// Version string of the running kernel (`uname -r`).
pub fn running_kernel(runner: &dyn CommandRunner) -> Result<String> {
    let output = runner.run(
        &Invocation::new("uname").arg("-r"),
        "Failed to determine current kernel version",
    )?;
    let version = output.stdout.trim();
    if version.is_empty() {
        return Err(CleanupError::Detection(
            "Could not determine current kernel version".to_string(),
        ));
    }
    Ok(version.to_string())
}

/// Installed kernel image/header packages that do not belong to `running`.
///
/// `listing` is `dpkg --list` output; only installed (`ii`) rows count.
/// Meta packages without a version in their name are never selected.
pub fn select_old_kernels(running: &str, listing: &str) -> Vec<String> {
    let running = running.trim();
    let base = BASE_VERSION
        .find(running)
        .map(|m| m.as_str())
        .unwrap_or(running);

    listing
        .lines()
        .filter(|line| line.starts_with("ii"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|name| name.contains("linux-image") || name.contains("linux-headers"))
        .filter(|name| VERSIONED_PACKAGE.is_match(name))
        .filter(|name| !name.contains(running) && !name.contains(base))
        .map(str::to_string)
        .collect()
}

/// Run the full detection: running version, package listing, installed sizes.
pub fn detect_old_kernels(runner: &dyn CommandRunner) -> Result<Vec<OldKernel>> {
    let running = running_kernel(runner)?;
    tracing::debug!("current kernel: {}", running);

    let listing = runner.run(
        &Invocation::new("dpkg").args(["--list", "linux-image-*", "linux-headers-*"]),
        "Failed to list kernel packages",
    )?;
    if listing.stdout.trim().is_empty() {
        return Err(CleanupError::Detection(
            "Could not list installed kernel packages".to_string(),
        ));
    }

    let mut kernels = Vec::new();
    for package in select_old_kernels(&running, &listing.stdout) {
        let size = runner.run(
            &Invocation::new("dpkg-query").args(["-W", "-f=${Installed-Size}", package.as_str()]),
            &format!("Failed to get size of {}", package),
        )?;
        // dpkg reports KiB.
        match size.stdout.trim().parse::<u64>() {
            Ok(kib) => kernels.push(OldKernel {
                package,
                bytes: kib * 1024,
            }),
            Err(_) => tracing::warn!(
                "unparsable installed size for {}: {:?}",
                package,
                size.stdout.trim()
            ),
        }
    }
    Ok(kernels)
}
