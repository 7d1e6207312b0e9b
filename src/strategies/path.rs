//! Default path-walk strategy.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::filter::FileFilter;
use crate::cleaner::{Cleaner, Outcome, Tally};
use crate::command::{CommandRunner, Invocation};
use crate::error::{CleanupError, Result};
use crate::target::CleanupTarget;

#[derive(Debug, Clone, Copy, Default)]
pub struct PathCleaner;

impl Cleaner for PathCleaner {
    fn name(&self) -> &'static str {
        "path-walk"
    }

    fn scan(&self, target: &CleanupTarget, _runner: &dyn CommandRunner) -> Result<Outcome> {
        let Some(root) = existing_root(target) else {
            return Ok(Outcome::Skipped);
        };
        let filter = FileFilter::for_target(target)?;

        let mut tally = Tally::default();
        if root.is_dir() {
            for entry in walk(&root, target.is_recursive()) {
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                if filter.accepts(entry.file_name(), &meta) {
                    tally.add_file(meta.len());
                }
            }
        } else {
            let meta = fs::metadata(&root)
                .map_err(|e| CleanupError::io(format!("Cannot read {}", root.display()), &root, e))?;
            if accepts_single(&filter, &root, &meta) {
                tally.add_file(meta.len());
            }
        }

        tracing::debug!(
            "scanned {}: {} items, {} bytes",
            target.id(),
            tally.items,
            tally.bytes
        );
        Ok(Outcome::Done(tally))
    }

    fn clean(&self, target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Outcome> {
        let Some(root) = existing_root(target) else {
            return Ok(Outcome::Skipped);
        };
        let filter = FileFilter::for_target(target)?;

        let tally = if root.is_dir() {
            if target.is_elevated() {
                clean_elevated(target, runner)?
            } else {
                clean_walk(target, &root, &filter, runner)
            }
        } else {
            clean_single_file(target, &root, &filter, runner)?
        };

        tracing::debug!(
            "cleaned {}: {} items, {} bytes",
            target.id(),
            tally.items,
            tally.bytes
        );
        Ok(Outcome::Done(tally))
    }
}

/// The target's path, if it is set and present on disk.
fn existing_root(target: &CleanupTarget) -> Option<PathBuf> {
    if target.path().is_empty() {
        return None;
    }
    let root = PathBuf::from(target.path());
    // Follows symlinks: a dangling link counts as missing.
    if fs::metadata(&root).is_err() {
        tracing::debug!("path does not exist, skipping: {}", root.display());
        return None;
    }
    Some(root)
}

/// Regular files under `root`; one level only when not recursive.
fn walk(root: &Path, recursive: bool) -> impl Iterator<Item = DirEntry> {
    let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }
    walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
}

fn accepts_single(filter: &FileFilter, path: &Path, meta: &fs::Metadata) -> bool {
    meta.is_file() && path.file_name().is_some_and(|name| filter.accepts(name, meta))
}

fn clean_walk(
    target: &CleanupTarget,
    root: &Path,
    filter: &FileFilter,
    runner: &dyn CommandRunner,
) -> Tally {
    // Collect first so deletion never races the directory iterator.
    let matches: Vec<(PathBuf, u64)> = walk(root, target.is_recursive())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            filter
                .accepts(entry.file_name(), &meta)
                .then(|| (entry.into_path(), meta.len()))
        })
        .collect();

    let mut tally = Tally::default();
    for (path, size) in matches {
        match remove_file(target, &path, size, runner) {
            Ok(freed) => tally.add_file(freed),
            Err(e) => tracing::warn!("cannot remove {}: {}", path.display(), e),
        }
    }
    tally
}

fn clean_single_file(
    target: &CleanupTarget,
    path: &Path,
    filter: &FileFilter,
    runner: &dyn CommandRunner,
) -> Result<Tally> {
    let meta = fs::metadata(path)
        .map_err(|e| CleanupError::io(format!("Cannot read {}", path.display()), path, e))?;
    if !accepts_single(filter, path, &meta) {
        return Ok(Tally::default());
    }
    let freed = remove_file(target, path, meta.len(), runner)?;
    Ok(Tally::new(1, freed))
}

/// Remove one file, retrying through the runner as root when the target allows it.
fn remove_file(
    target: &CleanupTarget,
    path: &Path,
    size: u64,
    runner: &dyn CommandRunner,
) -> Result<u64> {
    match fs::remove_file(path) {
        Ok(()) => Ok(size),
        Err(e) => {
            let err = CleanupError::io(format!("Cannot remove {}", path.display()), path, e);
            if err.is_permission_denied() && target.is_elevated() {
                tracing::info!("retrying removal of {} with elevation", path.display());
                remove_file_elevated(path, runner)
            } else {
                Err(err)
            }
        }
    }
}

fn remove_file_elevated(path: &Path, runner: &dyn CommandRunner) -> Result<u64> {
    let display = path.display().to_string();
    let sizes = runner.run(
        &Invocation::new("du").args(["-b", display.as_str()]).elevated(true),
        &format!("Failed to get size of {}", display),
    )?;
    let size = parse_du_output(&sizes.stdout).bytes;

    runner.run(
        &Invocation::new("rm").args(["-f", display.as_str()]).elevated(true),
        &format!("Failed to remove {}", display),
    )?;
    Ok(size)
}

/// Measure with `find ... -exec du -b`, then delete with `find ... -delete`.
fn clean_elevated(target: &CleanupTarget, runner: &dyn CommandRunner) -> Result<Tally> {
    let selection = find_selection(target);

    let measure = Invocation::new("find")
        .args(selection.iter().cloned())
        .args(["-exec", "du", "-b", "{}", "+"])
        .elevated(true);
    let sizes = runner.run(&measure, &format!("Failed to get sizes for {}", target.name()))?;
    let tally = parse_du_output(&sizes.stdout);

    let delete = Invocation::new("find")
        .args(selection)
        .arg("-delete")
        .elevated(true);
    runner.run(&delete, &format!("Failed to clean {}", target.name()))?;

    Ok(tally)
}

/// `find` arguments selecting the target's regular files.
///
/// `-mtime +n` means "more than n whole days", so `n = age - 1` keeps the
/// boundary inclusive like the walk path.
pub fn find_selection(target: &CleanupTarget) -> Vec<String> {
    let mut args = vec![target.path().to_string()];
    if !target.is_recursive() {
        args.extend(["-maxdepth".to_string(), "1".to_string()]);
    }
    if let Some(days) = target.min_age_days().filter(|d| *d > 0) {
        args.extend(["-mtime".to_string(), format!("+{}", days - 1)]);
    }
    if let Some(pattern) = target.file_pattern() {
        args.extend(["-name".to_string(), pattern.to_string()]);
    }
    args.extend(["-type".to_string(), "f".to_string()]);
    args
}

/// Sum `du -b` output: one `<bytes>\t<path>` line per file.
pub fn parse_du_output(output: &str) -> Tally {
    let mut tally = Tally::default();
    for line in output.lines() {
        if let Some(bytes) = line
            .split_whitespace()
            .next()
            .and_then(|field| field.parse::<u64>().ok())
        {
            tally.add_file(bytes);
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{backdate, write_file, ScriptedRunner};
    use tempfile::TempDir;

    fn target(path: &Path) -> CleanupTarget {
        CleanupTarget::new("t", "Test", "", path.to_string_lossy())
    }

    #[test]
    fn scan_counts_matching_old_files() {
        let dir = TempDir::new().unwrap();
        let old = write_file(dir.path(), "old.tmp", 2048);
        backdate(&old, 10);
        write_file(dir.path(), "new.tmp", 1024);

        let t = target(dir.path()).age_days(7);
        let outcome = PathCleaner.scan(&t, &ScriptedRunner::new()).unwrap();
        assert_eq!(outcome, Outcome::Done(Tally::new(1, 2048)));
    }

    #[test]
    fn scan_excludes_non_matching_names_regardless_of_age() {
        let dir = TempDir::new().unwrap();
        let log = write_file(dir.path(), "syslog.log.1", 500);
        let other = write_file(dir.path(), "syslog", 700);
        backdate(&log, 40);
        backdate(&other, 40);

        let t = target(dir.path()).pattern("*.log.*").age_days(30);
        let outcome = PathCleaner.scan(&t, &ScriptedRunner::new()).unwrap();
        assert_eq!(outcome, Outcome::Done(Tally::new(1, 500)));
    }

    #[test]
    fn non_recursive_scan_stays_at_top_level() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "top.bin", 10);
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_file(&nested, "deep.bin", 20);

        let flat = target(dir.path()).recursive(false);
        assert_eq!(
            PathCleaner.scan(&flat, &ScriptedRunner::new()).unwrap(),
            Outcome::Done(Tally::new(1, 10))
        );
        let deep = target(dir.path());
        assert_eq!(
            PathCleaner.scan(&deep, &ScriptedRunner::new()).unwrap(),
            Outcome::Done(Tally::new(2, 30))
        );
    }

    #[test]
    fn missing_path_is_skipped() {
        let dir = TempDir::new().unwrap();
        let t = target(&dir.path().join("nope"));
        let runner = ScriptedRunner::new();
        assert_eq!(PathCleaner.scan(&t, &runner).unwrap(), Outcome::Skipped);
        assert_eq!(PathCleaner.clean(&t, &runner).unwrap(), Outcome::Skipped);
    }

    #[test]
    fn dangling_symlink_is_skipped() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("cache");
        std::os::unix::fs::symlink(dir.path().join("gone"), &link).unwrap();

        let t = target(&link);
        let runner = ScriptedRunner::new();
        assert_eq!(PathCleaner.scan(&t, &runner).unwrap(), Outcome::Skipped);
        assert_eq!(PathCleaner.clean(&t, &runner).unwrap(), Outcome::Skipped);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn elevated_removal_measures_then_removes() {
        let runner = ScriptedRunner::new()
            .respond("du -b", "4096\t/var/cache/app/blob\n")
            .respond("rm -f", "");

        let freed = remove_file_elevated(Path::new("/var/cache/app/blob"), &runner).unwrap();
        assert_eq!(freed, 4096);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.elevated));
        assert_eq!(
            runner.command_lines(),
            vec!["du -b /var/cache/app/blob", "rm -f /var/cache/app/blob"]
        );
    }

    #[test]
    fn elevated_removal_failure_carries_context() {
        let runner = ScriptedRunner::new()
            .respond("du -b", "10\t/srv/x\n")
            .fail("rm -f", "Operation not permitted");

        let err = remove_file_elevated(Path::new("/srv/x"), &runner).unwrap_err();
        assert_eq!(err.to_string(), "Failed to remove /srv/x: Operation not permitted");
    }

    #[test]
    fn permission_denied_retries_elevated_for_elevated_targets() {
        use std::os::unix::fs::PermissionsExt;

        // Root ignores directory permissions, so the retry never triggers there.
        if crate::command::running_as_root() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        let file = write_file(&locked, "blob", 300);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let runner = ScriptedRunner::new()
            .respond("du -b", "300\tblob\n")
            .respond("rm -f", "");
        let elevated = target(&file).requires_elevation(true);
        let outcome = PathCleaner.clean(&elevated, &runner);

        let plain = target(&file);
        let plain_err = PathCleaner.clean(&plain, &ScriptedRunner::new()).unwrap_err();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(outcome.unwrap(), Outcome::Done(Tally::new(1, 300)));
        assert!(runner.command_lines()[1].starts_with("rm -f "));
        assert!(plain_err.is_permission_denied());
    }

    #[test]
    fn single_file_target_is_evaluated_against_itself() {
        let dir = TempDir::new().unwrap();
        let file = write_file(dir.path(), "core.dump", 4096);

        let t = target(&file);
        let runner = ScriptedRunner::new();
        assert_eq!(
            PathCleaner.scan(&t, &runner).unwrap(),
            Outcome::Done(Tally::new(1, 4096))
        );
        assert_eq!(
            PathCleaner.clean(&t, &runner).unwrap(),
            Outcome::Done(Tally::new(1, 4096))
        );
        assert!(!file.exists());
    }

    #[test]
    fn single_file_not_old_enough_is_kept() {
        let dir = TempDir::new().unwrap();
        let file = write_file(dir.path(), "fresh.log", 64);

        let t = target(&file).age_days(3);
        let outcome = PathCleaner.clean(&t, &ScriptedRunner::new()).unwrap();
        assert_eq!(outcome, Outcome::Done(Tally::default()));
        assert!(file.exists());
    }

    #[test]
    fn walk_cleanup_removes_only_qualifying_files() {
        let dir = TempDir::new().unwrap();
        let old = write_file(dir.path(), "old.tmp", 2048);
        backdate(&old, 8);
        let fresh = write_file(dir.path(), "fresh.tmp", 1024);

        let t = target(dir.path()).age_days(7);
        let outcome = PathCleaner.clean(&t, &ScriptedRunner::new()).unwrap();
        assert_eq!(outcome, Outcome::Done(Tally::new(1, 2048)));
        assert!(!old.exists());
        assert!(fresh.exists());

        let again = PathCleaner.clean(&t, &ScriptedRunner::new()).unwrap();
        assert_eq!(again, Outcome::Done(Tally::default()));
    }

    #[test]
    fn elevated_cleanup_measures_then_deletes_with_find() {
        let dir = TempDir::new().unwrap();
        let t = target(dir.path())
            .requires_elevation(true)
            .pattern("*.deb")
            .age_days(7);

        let runner = ScriptedRunner::new()
            .respond("-exec du -b", "1000\t/a.deb\n2500\t/b.deb\n")
            .respond("-delete", "");

        let outcome = PathCleaner.clean(&t, &runner).unwrap();
        assert_eq!(outcome, Outcome::Done(Tally::new(2, 3500)));

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.elevated && c.program == "find"));
        assert_eq!(&calls[0].args[..7], find_selection(&t).as_slice());
        assert_eq!(calls[1].args.last().map(String::as_str), Some("-delete"));
    }

    #[test]
    fn elevated_cleanup_failure_carries_context() {
        let dir = TempDir::new().unwrap();
        let t = target(dir.path()).requires_elevation(true);
        let runner = ScriptedRunner::new();

        let err = PathCleaner.clean(&t, &runner).unwrap_err();
        assert!(err.to_string().starts_with("Failed to get sizes for Test"));
    }

    #[test]
    fn find_selection_respects_recursion_and_zero_age() {
        let t = CleanupTarget::new("t", "T", "", "/var/tmp")
            .recursive(false)
            .age_days(0);
        assert_eq!(
            find_selection(&t),
            vec!["/var/tmp", "-maxdepth", "1", "-type", "f"]
        );
    }

    #[test]
    fn du_output_ignores_garbage_lines() {
        let tally = parse_du_output("12\t/a\nnot-a-number /b\n\n30 /c\n");
        assert_eq!(tally, Tally::new(2, 42));
    }
}
