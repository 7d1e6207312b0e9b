use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::command::{CommandOutput, CommandRunner, Invocation};
use crate::engine::DiskCleanup;
use crate::error::{CleanupError, Result};
use crate::events::EngineEvent;
use crate::registry::TargetRegistry;

struct Rule {
    needle: String,
    response: std::result::Result<String, String>,
    remaining: Option<usize>,
}

/// A `CommandRunner` that answers from a script instead of spawning processes.
///
/// Rules match when their needle occurs in the invocation's command line and
/// are tried in insertion order. Unmatched invocations fail.
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push(self, needle: &str, response: std::result::Result<String, String>, remaining: Option<usize>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            response,
            remaining,
        });
        self
    }

    pub(crate) fn respond(self, needle: &str, stdout: &str) -> Self {
        self.push(needle, Ok(stdout.to_string()), None)
    }

    /// Answer a single matching call, then fall through to later rules.
    pub(crate) fn respond_once(self, needle: &str, stdout: &str) -> Self {
        self.push(needle, Ok(stdout.to_string()), Some(1))
    }

    pub(crate) fn fail(self, needle: &str, message: &str) -> Self {
        self.push(needle, Err(message.to_string()), None)
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::command_line).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation, context: &str) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let line = invocation.command_line();

        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|r| r.remaining != Some(0) && line.contains(&r.needle));
        let Some(rule) = rule else {
            return Err(CleanupError::Command {
                context: context.to_string(),
                message: format!("no scripted response for `{}`", line),
            });
        };
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        match &rule.response {
            Ok(stdout) => Ok(CommandOutput::new(stdout.clone())),
            Err(message) => Err(CleanupError::Command {
                context: context.to_string(),
                message: message.clone(),
            }),
        }
    }
}

/// Write a file of `size` bytes and return its path.
pub(crate) fn write_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![b'x'; size]).unwrap();
    path
}

/// Push a file's mtime `days` days into the past (plus a minute of slack).
pub(crate) fn backdate(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * 86_400 + 60);
    let file = File::options().write(true).open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(when)).unwrap();
}

/// An engine whose events land in the returned channel.
pub(crate) fn recording_engine(
    registry: TargetRegistry,
    runner: Arc<dyn CommandRunner>,
) -> (DiskCleanup, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel();
    (DiskCleanup::new(registry, runner, Arc::new(tx)), rx)
}

pub(crate) fn log_lines(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn error_lines(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Error(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn progress_values(events: &[EngineEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}
