//! Rehabilitation engine
//!
//! Probes each quarantined test with consecutive name-filtered suite runs
//! and promotes the ones that stay green back to active status. The probe
//! is fail-fast (one failing run ends the candidacy) and the engine itself
//! never aborts mid-list: a candidate that cannot even spawn its runner is
//! simply recorded as still unstable.

use anyhow::Result;
use std::path::Path;

use crate::quarantine::QuarantineStore;
use crate::runner::{ExecutionResult, SuiteRunner};

/// Markers checked on top of the exit code. Some runners exit zero on
/// partial or soft failures, so a clean exit alone is not trusted: the
/// output must look like a pass (marker present) or at least not look
/// like a failure.
const PASS_MARKERS: [&str; 2] = ["PASS", "✓"];
const FAIL_MARKER: &str = "FAIL";

/// Per-candidate probe outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehabOutcome {
    pub name: String,
    pub reason: String,
    pub stable: bool,
    /// Runs actually executed; less than the requested count when the
    /// probe short-circuited on a failure.
    pub runs_executed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RehabSummary {
    pub outcomes: Vec<RehabOutcome>,
    pub rehabilitated: Vec<String>,
}

/// Whether one probe run counts as passing.
pub fn run_passed(result: &ExecutionResult) -> bool {
    if !result.clean_exit() {
        return false;
    }
    let output = result.combined_output();
    PASS_MARKERS.iter().any(|marker| output.contains(marker)) || !output.contains(FAIL_MARKER)
}

/// Run `runs` consecutive filtered executions for `name`, short-circuiting
/// on the first failure. Returns the verdict and how many runs executed.
pub fn probe_stability(runner: &mut dyn SuiteRunner, name: &str, runs: usize) -> (bool, usize) {
    println!("Testing \"{}\" for {} consecutive runs...", name, runs);

    for attempt in 1..=runs {
        let result = runner.run_suite(Some(name));
        if !run_passed(&result) {
            println!("  Run {}: FAILED", attempt);
            return (false, attempt);
        }
        println!("  Run {}: PASSED", attempt);
    }

    println!("  All {} runs PASSED - candidate for rehabilitation!", runs);
    (true, runs)
}

/// Probe every quarantined candidate and rewrite the store without the
/// stable ones. Metadata entries and still-unstable candidates are left
/// untouched; the store is saved once, whole-file.
pub fn run_rehab(
    runner: &mut dyn SuiteRunner,
    store_path: &Path,
    runs: usize,
) -> Result<RehabSummary> {
    println!(
        "Flaky Test Rehabilitation - Testing with {} consecutive runs",
        runs
    );
    println!("{}", "=".repeat(65));

    let mut store = QuarantineStore::load(store_path);
    let candidates: Vec<(String, String)> = store
        .candidates()
        .map(|(name, reason)| (name.to_string(), reason.to_string()))
        .collect();

    if candidates.is_empty() {
        println!("No tests in quarantine - nothing to rehabilitate");
        return Ok(RehabSummary::default());
    }

    println!("Found {} quarantined tests", candidates.len());

    let mut summary = RehabSummary::default();
    for (name, reason) in candidates {
        println!("\nTesting: {}", name);
        println!("Reason: {}", reason);

        let (stable, runs_executed) = probe_stability(runner, &name, runs);
        if !stable {
            println!("Still flaky - keeping in quarantine");
        }
        summary.outcomes.push(RehabOutcome {
            name: name.clone(),
            reason,
            stable,
            runs_executed,
        });
        if stable {
            summary.rehabilitated.push(name);
        }
    }

    if summary.rehabilitated.is_empty() {
        println!("\nNo tests passed {} consecutive runs", runs);
        println!("All quarantined tests remain unstable");
        return Ok(summary);
    }

    println!(
        "\nRehabilitating {} stable test{}:",
        summary.rehabilitated.len(),
        if summary.rehabilitated.len() == 1 {
            ""
        } else {
            "s"
        }
    );
    for name in &summary.rehabilitated {
        println!("  - {}", name);
        store.remove(name);
    }
    store.save(store_path)?;

    println!("\nUpdated quarantine file: {}", store_path.display());
    println!("These tests are now back in active testing!");
    Ok(summary)
}
