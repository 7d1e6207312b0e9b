#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, SystemTime};

use tidylinux::command::{CommandOutput, CommandRunner, Invocation};
use tidylinux::{CleanupError, DiskCleanup, EngineEvent, TargetRegistry};

/// Answers commands from a fixed table keyed by a substring of the command line.
pub struct FakeRunner {
    answers: Vec<(String, Result<String, String>)>,
    pub seen: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            answers: Vec::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, needle: &str, stdout: &str) -> Self {
        self.answers.push((needle.to_string(), Ok(stdout.to_string())));
        self
    }

    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.answers.push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation, context: &str) -> tidylinux::Result<CommandOutput> {
        let line = invocation.command_line();
        self.seen.lock().unwrap().push(line.clone());
        let answer = self
            .answers
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| Err(format!("unexpected command `{line}`")));
        answer.map(CommandOutput::new).map_err(|message| CleanupError::Command {
            context: context.to_string(),
            message,
        })
    }
}

pub fn engine_with(
    registry: TargetRegistry,
    runner: Arc<dyn CommandRunner>,
) -> (DiskCleanup, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel();
    (DiskCleanup::new(registry, runner, Arc::new(tx)), rx)
}

pub fn write_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; size]).unwrap();
    path
}

pub fn age_file(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * 86_400 + 60);
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(when).unwrap();
}
