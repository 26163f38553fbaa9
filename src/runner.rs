//! Test-suite execution
//!
//! Detects the project's test runner and executes the full suite (or a
//! name-filtered subset) as a child process, capturing output and exit
//! status. Orchestration above this module is strictly sequential: one
//! run finishes before the next starts, because comparable runs are the
//! whole point of measuring flakiness.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::util::capture_command;

/// Outcome of one suite invocation.
///
/// `exit_code` is `None` when the child never produced a status (spawn
/// failure, signal death). Retained only long enough to build a failure
/// set and, for the scanner, a per-run log.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// True when the run terminated normally with a zero exit code.
    pub fn clean_exit(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// Stdout and stderr as one blob, the form the classifier consumes.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// A synthetic failing result for runs that never started.
    pub fn spawn_failure(message: String) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: message,
            duration: Duration::ZERO,
            timed_out: false,
        }
    }
}

/// Detected project type; decides the default test runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Rust,
    Node,
    Python,
    Go,
    Unknown,
}

/// Detect the project type from marker files in `repo`.
pub fn detect_project_type(repo: &Path) -> ProjectType {
    if repo.join("Cargo.toml").exists() {
        ProjectType::Rust
    } else if repo.join("package.json").exists() {
        ProjectType::Node
    } else if repo.join("pyproject.toml").exists()
        || repo.join("setup.py").exists()
        || repo.join("requirements.txt").exists()
    {
        ProjectType::Python
    } else if repo.join("go.mod").exists() {
        ProjectType::Go
    } else {
        ProjectType::Unknown
    }
}

/// A concrete suite invocation: the base command plus the argument form
/// that narrows execution to tests matching a name.
#[derive(Debug, Clone)]
pub struct RunnerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Arguments inserted before the filter value itself, e.g.
    /// `["--", "--testNamePattern"]` for npm/jest or `["-k"]` for pytest.
    pub filter_args: Vec<String>,
}

impl RunnerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, filter_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            filter_args,
        }
    }

    /// The default runner for a detected project type.
    pub fn for_project(project_type: ProjectType) -> Option<Self> {
        let (program, args, filter_args): (&str, &[&str], &[&str]) = match project_type {
            ProjectType::Rust => ("cargo", &["test"], &[]),
            ProjectType::Node => ("npm", &["test"], &["--", "--testNamePattern"]),
            ProjectType::Python => ("pytest", &[], &["-k"]),
            ProjectType::Go => ("go", &["test", "./..."], &["-run"]),
            ProjectType::Unknown => return None,
        };
        Some(Self::new(
            program,
            args.iter().map(|s| s.to_string()).collect(),
            filter_args.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Detect the runner for `repo` from its marker files.
    pub fn detect(repo: &Path) -> Option<Self> {
        Self::for_project(detect_project_type(repo))
    }

    /// Full argument vector for one invocation, with the name filter (if
    /// any) appended after the filter arguments.
    pub fn invocation_args(&self, filter: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(name) = filter {
            args.extend(self.filter_args.iter().cloned());
            args.push(name.to_string());
        }
        args
    }
}

impl fmt::Display for RunnerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The seam between orchestration (scanner, rehabilitation engine) and
/// actual child processes. Tests substitute scripted implementations.
pub trait SuiteRunner {
    /// Execute the suite once, optionally narrowed to tests matching
    /// `filter`. Never fails: runs that could not start come back as
    /// failing results.
    fn run_suite(&mut self, filter: Option<&str>) -> ExecutionResult;
}

/// Runs the configured test command as a child process in the repository
/// directory.
pub struct ProcessRunner {
    command: RunnerCommand,
    workdir: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(command: RunnerCommand, workdir: PathBuf, timeout: Option<Duration>) -> Self {
        Self {
            command,
            workdir,
            timeout,
        }
    }

    pub fn command(&self) -> &RunnerCommand {
        &self.command
    }
}

impl SuiteRunner for ProcessRunner {
    fn run_suite(&mut self, filter: Option<&str>) -> ExecutionResult {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.invocation_args(filter))
            .current_dir(&self.workdir);

        match capture_command(&mut cmd, self.timeout) {
            Ok(run) => ExecutionResult {
                exit_code: run.status.and_then(|s| s.code()),
                stdout: run.stdout,
                stderr: run.stderr,
                duration: run.duration,
                timed_out: run.timed_out,
            },
            // A runner that never started counts as a failing run, not an
            // error: conservative for rehabilitation, visible in scan logs.
            Err(err) => ExecutionResult::spawn_failure(format!(
                "Failed to run {}: {}",
                self.command.program, err
            )),
        }
    }
}
