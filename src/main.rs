//! flakeward - flaky test quarantine, scanning, and rehabilitation
//!
//! CI-side companion to the quarantine store: `scan` hunts for newly
//! unstable tests, `rehab` promotes recovered ones back to active status,
//! and `coverage` maintains the lines-coverage gate.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use flakeward::config::Config;
use flakeward::coverage;
use flakeward::rehab;
use flakeward::runner::ProcessRunner;
use flakeward::scan::{self, ScanOptions};

#[derive(Parser, Debug)]
#[command(
    name = "flakeward",
    about = "Flaky test quarantine, scanning, and rehabilitation for CI",
    version
)]
struct Args {
    /// Path to the repository (defaults to current directory)
    #[arg(short = 'C', long = "path", default_value = ".", global = true)]
    path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the suite several times and report intermittently failing tests
    Scan {
        /// Number of suite executions (overrides RUNS and config)
        #[arg(short, long)]
        runs: Option<usize>,
    },
    /// Probe quarantined tests and promote the ones that stabilized
    Rehab {
        /// Consecutive passing runs required (overrides REHAB_RUNS and config)
        #[arg(short, long)]
        runs: Option<usize>,
    },
    /// Maintain the lines-coverage gate from measured coverage
    #[command(subcommand)]
    Coverage(CoverageAction),
}

#[derive(Subcommand, Debug)]
enum CoverageAction {
    /// Seed the gate just below current measured coverage
    Seed,
    /// Raise the gate one step if coverage supports it
    Bump,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let repo = args
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve repository path '{}'", args.path.display()))?;
    let config = Config::load(&repo);

    match args.command {
        Command::Scan { runs } => {
            let mut runner = suite_runner(&config, &repo)?;
            let opts = ScanOptions {
                runs: config.scan_runs(runs),
                report_file: repo.join(&config.report_file),
                run_log_dir: repo.join(&config.run_log_dir),
            };
            scan::run_scan(&mut runner, &opts)?;
        }
        Command::Rehab { runs } => {
            let mut runner = suite_runner(&config, &repo)?;
            let store_path = repo.join(&config.quarantine_file);
            rehab::run_rehab(&mut runner, &store_path, config.rehab_runs(runs))?;
        }
        Command::Coverage(action) => {
            let paths = config.coverage_paths(&repo);
            let command = config.coverage_command();
            match action {
                CoverageAction::Seed => coverage::seed_baseline(&paths, &command, &repo)?,
                CoverageAction::Bump => coverage::bump_threshold(&paths, &command, &repo)?,
            }
        }
    }
    Ok(())
}

fn suite_runner(config: &Config, repo: &std::path::Path) -> Result<ProcessRunner> {
    let Some(command) = config.runner_command(repo) else {
        bail!(
            "No test runner detected in '{}'; set one in {}",
            repo.display(),
            flakeward::config::CONFIG_FILE
        );
    };
    println!("Using test runner: {}", command);
    Ok(ProcessRunner::new(
        command,
        repo.to_path_buf(),
        config.suite_timeout(),
    ))
}
