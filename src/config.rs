//! Tool configuration
//!
//! Optional repo-local `.flakeward.json`. Every field has a default so the
//! tools run unconfigured; a corrupt file degrades to defaults with a
//! warning. Run counts resolve CLI flag > environment (`RUNS`,
//! `REHAB_RUNS`) > config file > built-in default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coverage::{CoverageCommand, CoveragePaths};
use crate::runner::RunnerCommand;

pub const CONFIG_FILE: &str = ".flakeward.json";
pub const DEFAULT_SCAN_RUNS: usize = 3;
pub const DEFAULT_REHAB_RUNS: usize = 10;

pub const SCAN_RUNS_ENV: &str = "RUNS";
pub const REHAB_RUNS_ENV: &str = "REHAB_RUNS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quarantine store location, relative to the repository root.
    pub quarantine_file: PathBuf,
    /// Running flaky report, newest scan first.
    pub report_file: PathBuf,
    /// Directory for per-run output logs written during scans.
    pub run_log_dir: PathBuf,
    /// Scan run count (overridden by `RUNS` and `--runs`).
    pub runs: Option<usize>,
    /// Rehabilitation run count (overridden by `REHAB_RUNS` and `--runs`).
    pub rehab_runs: Option<usize>,
    /// Kill a single suite execution after this many seconds; unset means
    /// wait indefinitely.
    pub suite_timeout_secs: Option<u64>,
    /// Explicit test-runner override; when unset the runner is detected
    /// from the repository's marker files.
    pub runner: Option<RunnerOverride>,
    pub coverage: CoverageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerOverride {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub filter_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageSettings {
    /// Command that produces the coverage summary.
    pub command: Vec<String>,
    /// Config document carrying the `lines` gate.
    pub config_file: PathBuf,
    /// Report with the measured `total.lines.pct` field.
    pub summary_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quarantine_file: PathBuf::from("tests/flaky_quarantine.json"),
            report_file: PathBuf::from("docs/reports/flaky.md"),
            run_log_dir: PathBuf::from("reports/test-runs"),
            runs: None,
            rehab_runs: None,
            suite_timeout_secs: None,
            runner: None,
            coverage: CoverageSettings::default(),
        }
    }
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            command: vec!["npm".to_string(), "run".to_string(), "test:cov".to_string()],
            config_file: PathBuf::from(".nycrc.json"),
            summary_file: PathBuf::from("coverage/coverage-summary.json"),
        }
    }
}

impl Config {
    /// Load `.flakeward.json` from the repository root, or defaults.
    pub fn load(repo: &Path) -> Self {
        let path = repo.join(CONFIG_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                eprintln!(
                    "  Warning: config file '{}' is invalid ({}); using defaults",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Scan run count: CLI flag > `RUNS` > config > default 3.
    pub fn scan_runs(&self, cli: Option<usize>) -> usize {
        cli.or_else(|| env_runs(SCAN_RUNS_ENV))
            .or(self.runs)
            .unwrap_or(DEFAULT_SCAN_RUNS)
    }

    /// Rehabilitation run count: CLI flag > `REHAB_RUNS` > config > default 10.
    pub fn rehab_runs(&self, cli: Option<usize>) -> usize {
        cli.or_else(|| env_runs(REHAB_RUNS_ENV))
            .or(self.rehab_runs)
            .unwrap_or(DEFAULT_REHAB_RUNS)
    }

    /// The test-runner command: explicit override, else marker-file
    /// detection.
    pub fn runner_command(&self, repo: &Path) -> Option<RunnerCommand> {
        if let Some(runner) = &self.runner {
            return Some(RunnerCommand::new(
                runner.program.clone(),
                runner.args.clone(),
                runner.filter_args.clone(),
            ));
        }
        RunnerCommand::detect(repo)
    }

    pub fn suite_timeout(&self) -> Option<Duration> {
        self.suite_timeout_secs.map(Duration::from_secs)
    }

    /// Coverage paths resolved against the repository root.
    pub fn coverage_paths(&self, repo: &Path) -> CoveragePaths {
        CoveragePaths {
            config_file: repo.join(&self.coverage.config_file),
            summary_file: repo.join(&self.coverage.summary_file),
        }
    }

    pub fn coverage_command(&self) -> CoverageCommand {
        let mut parts = self.coverage.command.clone();
        if parts.is_empty() {
            parts = CoverageSettings::default().command;
        }
        let program = parts.remove(0);
        CoverageCommand {
            program,
            args: parts,
        }
    }
}

fn env_runs(var: &str) -> Option<usize> {
    let value = std::env::var(var).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!(
                "  Warning: ignoring unparsable {}={} (want a run count)",
                var, value
            );
            None
        }
    }
}
