//! External command runner.

use crate::error::{CleanupError, Result};
use std::fs;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default time budget for a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

const TERM_GRACE: Duration = Duration::from_secs(2);

/// A program plus arguments, optionally run with elevated privileges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub elevated: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            elevated: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Mark the invocation as needing root.
    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Shell-quoted command line, without any `sudo` prefix.
    pub fn command_line(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns stdout lines, skipping blank ones.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().filter(|l| !l.trim().is_empty())
    }
}

/// Executes external processes on behalf of the cleanup strategies.
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion. `context` prefixes any error message.
    fn run(&self, invocation: &Invocation, context: &str) -> Result<CommandOutput>;
}

/// Runs real processes with a per-call timeout.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
    already_root: bool,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            already_root: running_as_root(),
        }
    }

    fn build(&self, invocation: &Invocation) -> Command {
        let mut command = if invocation.elevated && !self.already_root {
            let mut sudo = Command::new("sudo");
            sudo.arg(&invocation.program);
            sudo
        } else {
            Command::new(&invocation.program)
        };
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, context: &str) -> Result<CommandOutput> {
        tracing::debug!(
            elevated = invocation.elevated,
            "running command: {}",
            invocation.command_line()
        );

        let mut child = self.build(invocation).spawn().map_err(|e| CleanupError::Command {
            context: context.to_string(),
            message: format!("failed to execute {}: {}", invocation.program, e),
        })?;

        // Drain both pipes while waiting so a chatty child never blocks on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate_tree(&mut child);
                tracing::warn!(
                    "command timed out after {}s: {}",
                    self.timeout.as_secs(),
                    invocation.command_line()
                );
                return Err(CleanupError::Timeout {
                    context: context.to_string(),
                    program: invocation.program.clone(),
                    timeout: self.timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                return Err(CleanupError::Command {
                    context: context.to_string(),
                    message: format!("failed to wait for {}: {}", invocation.program, e),
                });
            }
        };

        let output = CommandOutput {
            stdout: stdout.map(join_drain).unwrap_or_default(),
            stderr: stderr.map(join_drain).unwrap_or_default(),
        };

        if status.success() {
            Ok(output)
        } else {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            tracing::error!("command failed ({}): {}", code, detail);
            Err(CleanupError::Command {
                context: context.to_string(),
                message: format!("{} exited with {}: {}", invocation.program, code, detail),
            })
        }
    }
}

/// SIGTERM the child and everything it spawned, then SIGKILL what is left.
/// sudo relays SIGTERM to its command; root-owned descendants we cannot signal
/// directly are reached only through that relay.
fn terminate_tree(child: &mut Child) {
    let root = child.id() as libc::pid_t;
    let tree = descendants(root);
    signal_all(&[root], libc::SIGTERM);
    signal_all(&tree, libc::SIGTERM);
    if !matches!(child.wait_timeout(TERM_GRACE), Ok(Some(_))) {
        let _ = child.kill();
        let _ = child.wait();
    }
    // Orphans that ignored SIGTERM.
    signal_all(&tree, libc::SIGKILL);
}

fn signal_all(pids: &[libc::pid_t], signal: libc::c_int) {
    for &pid in pids {
        unsafe {
            libc::kill(pid, signal);
        }
    }
}

/// All transitive children of `root`, read from `/proc/<pid>/stat`.
fn descendants(root: libc::pid_t) -> Vec<libc::pid_t> {
    let parents: Vec<(libc::pid_t, libc::pid_t)> = match fs::read_dir("/proc") {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str()?.parse::<libc::pid_t>().ok())
            .filter_map(|pid| Some((pid, parent_pid(pid)?)))
            .collect(),
        Err(_) => return Vec::new(),
    };

    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for &(pid, ppid) in &parents {
            if ppid == parent && !found.contains(&pid) {
                found.push(pid);
                frontier.push(pid);
            }
        }
    }
    found
}

fn parent_pid(pid: libc::pid_t) -> Option<libc::pid_t> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // comm may contain spaces and parens; fields resume after the last ')'.
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(1)?.parse().ok()
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_drain(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// True when the effective uid is root.
pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_arguments() {
        let inv = Invocation::new("find")
            .arg("/var/log")
            .args(["-name", "*.log.*"])
            .elevated(true);
        assert_eq!(inv.command_line(), "find /var/log -name '*.log.*'");
        assert!(inv.elevated);
    }

    #[test]
    fn output_lines_skip_blanks() {
        let out = CommandOutput::new("a\n\n  \nb\n");
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn system_runner_captures_stdout() {
        let runner = SystemRunner::new(Duration::from_secs(10));
        let out = runner
            .run(&Invocation::new("echo").arg("hello"), "echo failed")
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn system_runner_reports_non_zero_exit_with_context() {
        let runner = SystemRunner::new(Duration::from_secs(10));
        let err = runner
            .run(&Invocation::new("sh").args(["-c", "echo nope >&2; exit 3"]), "Failed to probe")
            .unwrap_err();
        match err {
            CleanupError::Command { context, message } => {
                assert_eq!(context, "Failed to probe");
                assert!(message.contains("exited with 3"));
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn system_runner_reports_missing_program() {
        let runner = SystemRunner::new(Duration::from_secs(10));
        let err = runner
            .run(&Invocation::new("definitely-not-a-real-program-xyz"), "Failed")
            .unwrap_err();
        assert!(matches!(err, CleanupError::Command { .. }));
    }

    #[test]
    fn system_runner_kills_on_timeout() {
        let runner = SystemRunner::new(Duration::from_millis(200));
        let err = runner
            .run(&Invocation::new("sleep").arg("5"), "Sleeping")
            .unwrap_err();
        assert!(matches!(err, CleanupError::Timeout { .. }));
    }

    #[test]
    fn timeout_also_stops_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pidfile.display());
        let runner = SystemRunner::new(Duration::from_millis(500));
        let err = runner
            .run(&Invocation::new("sh").arg("-c").arg(script), "Waiting")
            .unwrap_err();
        assert!(matches!(err, CleanupError::Timeout { .. }));

        let pid: i32 = fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
        let stat = format!("/proc/{}/stat", pid);
        let gone = (0..40).any(|_| {
            let alive = fs::read_to_string(&stat)
                .map(|s| !s.rsplit(')').next().unwrap_or("").trim_start().starts_with('Z'))
                .unwrap_or(false);
            if alive {
                thread::sleep(Duration::from_millis(50));
            }
            !alive
        });
        assert!(gone, "grandchild {} survived the timeout", pid);
    }
}
