use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use shellout::ShelloutError;
use shellout::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// Which run method an executor call went through.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Passthrough,
    Quiet,
}

/// Executor that records every spec it is asked to run.
///
/// When `fail_at` is set, the call with that zero-based index fails with a
/// non-zero exit carrying `"partial"` on stdout.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<(Mode, CommandSpec)>>,
    pub fail_at: Option<usize>,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn failing_at(index: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_at: Some(index),
        }
    }

    pub fn recorded(&self) -> Vec<(Mode, CommandSpec)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, mode: Mode, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        calls.push((mode, spec.clone()));
        if self.fail_at == Some(index) {
            return Err(ShelloutError::Execution {
                command: spec.command.clone(),
                status: "exit status: 1".to_string(),
                output: Some(Box::new(ExecutionResult {
                    status: None,
                    stdout: "partial".to_string(),
                    stderr: String::new(),
                })),
            });
        }
        Ok(ExecutionResult::default())
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError> {
        self.record(Mode::Run, spec)
    }

    fn run_passthrough(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError> {
        self.record(Mode::Passthrough, spec)
    }

    fn run_quiet(&self, spec: &CommandSpec) -> Result<(), ShelloutError> {
        self.record(Mode::Quiet, spec).map(|_| ())
    }
}

/// Writes `yaml` to `commands.yaml` inside `dir` and returns its path.
#[allow(dead_code)]
pub fn write_manifest(dir: &Utf8Path, yaml: &str) -> Utf8PathBuf {
    let path = dir.join("commands.yaml");
    std::fs::write(&path, yaml).expect("failed to write manifest");
    path
}

/// Returns a temporary directory and its UTF-8 path.
#[allow(dead_code)]
pub fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("tempdir is not UTF-8");
    (dir, path)
}
