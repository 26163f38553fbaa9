//! Flaky test scanner
//!
//! Runs the full suite several times, extracts each run's failure set, and
//! splits the union into always-failing and flaky tests. Every scan
//! prepends a dated block to the running report - even a clean scan, since
//! the dated history is the point - and saves each run's raw output for
//! postmortems.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::{FailureSet, ResultClassifier};
use crate::runner::{ExecutionResult, SuiteRunner};

pub struct ScanOptions {
    pub runs: usize,
    pub report_file: PathBuf,
    pub run_log_dir: PathBuf,
}

/// The three-way split of the scan's failure union.
///
/// `always` holds tests failing in every run, `flaky` the rest of the
/// union; stable tests are implicit. Computed fresh each scan, persisted
/// only inside the rendered report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub union: FailureSet,
    pub always: FailureSet,
    pub flaky: FailureSet,
}

/// Diff per-run failure sets into always/flaky/union.
///
/// With a single run `always` equals `union`, so flaky is empty by
/// construction - accepted, not special-cased.
pub fn classify_runs(runs: &[FailureSet]) -> Classification {
    let mut union = FailureSet::new();
    for failed in runs {
        union.extend(failed.iter().cloned());
    }

    let always: FailureSet = union
        .iter()
        .filter(|test| runs.iter().all(|failed| failed.contains(*test)))
        .cloned()
        .collect();

    let flaky: FailureSet = union.difference(&always).cloned().collect();

    Classification {
        union,
        always,
        flaky,
    }
}

/// Render one dated report block, newest-first ready.
pub fn render_report_block(
    timestamp: DateTime<Utc>,
    runs: usize,
    classification: &Classification,
) -> String {
    let mut lines = vec![
        format!(
            "## Flaky Report – {}",
            timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        format!("- Runs: {}", runs),
        format!(
            "- Flaky: **{}** | Always failing: {}",
            classification.flaky.len(),
            classification.always.len()
        ),
        String::new(),
        "### Flaky tests".to_string(),
    ];

    if classification.flaky.is_empty() {
        lines.push("- (none)".to_string());
    } else {
        // BTreeSet iteration is already sorted
        for test in &classification.flaky {
            lines.push(format!("- {}", test));
        }
    }

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.join("\n")
}

/// Prepend `block` to the report at `path`, creating the file and its
/// directory if absent. Most recent scan first.
pub fn prepend_report(path: &Path, block: &str) -> Result<()> {
    let existing = fs::read_to_string(path).unwrap_or_default();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory '{}'", parent.display()))?;
    }
    fs::write(path, format!("{}{}", block, existing))
        .with_context(|| format!("Failed to write report '{}'", path.display()))
}

/// Save one run's full captured output for postmortem inspection,
/// regardless of pass/fail.
fn write_run_log(
    dir: &Path,
    stamp: &str,
    run_number: usize,
    result: &ExecutionResult,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create run-log directory '{}'", dir.display()))?;
    let path = dir.join(format!("{}_run{}.log", stamp, run_number));
    let exit_code = match result.exit_code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    };
    let content = format!(
        "Exit code: {}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
        exit_code, result.stdout, result.stderr
    );
    fs::write(&path, content)
        .with_context(|| format!("Failed to write run log '{}'", path.display()))?;
    Ok(path)
}

/// Execute the scan: `runs` sequential suite executions, classification,
/// report block prepended to the report file.
pub fn run_scan(runner: &mut dyn SuiteRunner, opts: &ScanOptions) -> Result<Classification> {
    println!(
        "Flaky Test Scanner - Running {} test iteration{}",
        opts.runs,
        if opts.runs == 1 { "" } else { "s" }
    );
    println!("{}", "=".repeat(55));

    let classifier = ResultClassifier::new();
    let started = Utc::now();
    let stamp = started.format("%Y%m%d-%H%M%S").to_string();

    let mut failure_sets: Vec<FailureSet> = Vec::with_capacity(opts.runs);
    for run_number in 1..=opts.runs {
        println!("Run {}: executing suite", run_number);
        let result = runner.run_suite(None);
        let failed = classifier.extract_failures(&result.combined_output());
        println!("Run {}: {} failed tests", run_number, failed.len());

        write_run_log(&opts.run_log_dir, &stamp, run_number, &result)?;
        failure_sets.push(failed);
    }

    let classification = classify_runs(&failure_sets);
    println!(
        "\nResults: {} flaky, {} always failing, {} total failed",
        classification.flaky.len(),
        classification.always.len(),
        classification.union.len()
    );

    let block = render_report_block(started, opts.runs, &classification);
    prepend_report(&opts.report_file, &block)?;
    println!("Report written to: {}", opts.report_file.display());

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn set(names: &[&str]) -> FailureSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Replays canned outputs, one per run, in order.
    struct ScriptedRunner {
        outputs: Vec<String>,
        calls: usize,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<String>) -> Self {
            Self { outputs, calls: 0 }
        }
    }

    impl SuiteRunner for ScriptedRunner {
        fn run_suite(&mut self, _filter: Option<&str>) -> ExecutionResult {
            let stdout = self.outputs[self.calls].clone();
            self.calls += 1;
            ExecutionResult {
                exit_code: Some(if stdout.is_empty() { 0 } else { 1 }),
                stdout,
                stderr: String::new(),
                duration: Duration::ZERO,
                timed_out: false,
            }
        }
    }

    #[test]
    fn classify_splits_always_and_flaky() {
        let runs = vec![set(&["X", "Y"]), set(&["X"]), set(&["X", "Y", "Z"])];
        let classification = classify_runs(&runs);
        assert_eq!(classification.always, set(&["X"]));
        assert_eq!(classification.flaky, set(&["Y", "Z"]));
        assert_eq!(classification.union, set(&["X", "Y", "Z"]));
    }

    #[test]
    fn always_is_subset_of_union_and_flaky_is_difference() {
        let runs = vec![set(&["A", "B"]), set(&["B", "C"])];
        let classification = classify_runs(&runs);
        assert!(classification.always.is_subset(&classification.union));
        let expected: BTreeSet<String> = classification
            .union
            .difference(&classification.always)
            .cloned()
            .collect();
        assert_eq!(classification.flaky, expected);
    }

    #[test]
    fn identical_failures_every_run_are_not_flaky() {
        let runs = vec![set(&["X"]), set(&["X"]), set(&["X"])];
        let classification = classify_runs(&runs);
        assert_eq!(classification.always, set(&["X"]));
        assert!(classification.flaky.is_empty());
    }

    #[test]
    fn single_run_cannot_be_flaky() {
        let classification = classify_runs(&[set(&["X", "Y"])]);
        assert!(classification.flaky.is_empty());
        assert_eq!(classification.always, set(&["X", "Y"]));
    }

    #[test]
    fn no_failures_yields_all_empty() {
        let classification = classify_runs(&[set(&[]), set(&[])]);
        assert!(classification.union.is_empty());
        assert!(classification.always.is_empty());
        assert!(classification.flaky.is_empty());
    }

    #[test]
    fn report_block_lists_sorted_flaky_tests() {
        let classification = Classification {
            union: set(&["X", "Y", "Z"]),
            always: set(&["X"]),
            flaky: set(&["Z", "Y"]),
        };
        let block = render_report_block(Utc::now(), 3, &classification);
        assert!(block.contains("- Runs: 3"));
        assert!(block.contains("- Flaky: **2** | Always failing: 1"));
        let y_pos = block.find("- Y").unwrap();
        let z_pos = block.find("- Z").unwrap();
        assert!(y_pos < z_pos);
        assert!(!block.contains("- X\n"));
    }

    #[test]
    fn report_block_marks_empty_scan() {
        let classification = classify_runs(&[set(&[])]);
        let block = render_report_block(Utc::now(), 1, &classification);
        assert!(block.contains("- (none)"));
    }

    #[test]
    fn prepend_puts_newest_block_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/reports/flaky.md");
        prepend_report(&path, "## second\n").unwrap();
        prepend_report(&path, "## first\n").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("## first\n"));
        assert!(content.contains("## second\n"));
    }

    #[test]
    fn scan_end_to_end_reports_flaky_tests() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScanOptions {
            runs: 3,
            report_file: dir.path().join("docs/reports/flaky.md"),
            run_log_dir: dir.path().join("reports/test-runs"),
        };
        // Failure sets {X, Y}, {X}, {X, Y, Z} via mocha-style lines.
        let mut runner = ScriptedRunner::new(vec![
            "  1) X\n  2) Y\n".to_string(),
            "  1) X\n".to_string(),
            "  1) X\n  2) Y\n  3) Z\n".to_string(),
        ]);

        let classification = run_scan(&mut runner, &opts).unwrap();
        assert_eq!(classification.always, set(&["X"]));
        assert_eq!(classification.flaky, set(&["Y", "Z"]));

        let report = fs::read_to_string(&opts.report_file).unwrap();
        let flaky_section = report.split("### Flaky tests").nth(1).unwrap();
        assert!(flaky_section.contains("- Y"));
        assert!(flaky_section.contains("- Z"));
        assert!(!flaky_section.contains("- X"));

        let logs: Vec<_> = fs::read_dir(&opts.run_log_dir).unwrap().collect();
        assert_eq!(logs.len(), 3);
    }

    #[test]
    fn empty_scan_still_writes_dated_history() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ScanOptions {
            runs: 2,
            report_file: dir.path().join("flaky.md"),
            run_log_dir: dir.path().join("logs"),
        };
        let mut runner = ScriptedRunner::new(vec![String::new(), String::new()]);
        let classification = run_scan(&mut runner, &opts).unwrap();
        assert!(classification.union.is_empty());
        let report = fs::read_to_string(&opts.report_file).unwrap();
        assert!(report.contains("## Flaky Report"));
        assert!(report.contains("- (none)"));
    }
}
