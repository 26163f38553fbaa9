//! Failure extraction from test-runner output
//!
//! One suite execution produces a single combined text blob; this module
//! boils it down to the set of failing test identifiers. Each known runner
//! dialect gets its own matcher and every matcher runs over the full input,
//! so adding support for a new runner is a table entry, not a rewrite.
//! Over-matching is preferred to under-matching: a spurious identifier is
//! noise in a report, a missed one hides a flaky test.

use regex::Regex;
use std::collections::BTreeSet;

/// The set of failing-test identifiers extracted from one run's output.
pub type FailureSet = BTreeSet<String>;

/// A single output-dialect matcher. Capture group 1 is the test identifier.
pub struct FailureDialect {
    pub name: &'static str,
    pattern: Regex,
}

impl FailureDialect {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
        }
    }

    /// Extract this dialect's matches from `output`, trimmed of surrounding
    /// whitespace.
    pub fn extract(&self, output: &str) -> FailureSet {
        self.pattern
            .captures_iter(output)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Applies the built-in dialect matchers and unions their results.
pub struct ResultClassifier {
    dialects: Vec<FailureDialect>,
}

impl Default for ResultClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultClassifier {
    pub fn new() -> Self {
        let dialects = vec![
            // Mocha-style numbered failure lines: "  1) does the thing"
            FailureDialect::new("mocha-numbered", r"(?m)^\s*\d+\)\s+(.+)$"),
            // Jest per-file banners: "FAIL src/foo.test.ts"
            FailureDialect::new("jest-fail-banner", r"FAIL\s+(.+\.test\.(?:js|ts))"),
            // Generic stack traces: "Error: <message> at ..."
            FailureDialect::new("generic-error-trace", r"Error:\s+(.+)\s+at"),
            // Summary counters: "failing <name>"
            FailureDialect::new("failing-summary", r"failing\s+(.+)"),
        ];
        Self { dialects }
    }

    /// Union of every dialect's matches over the same input. Rule order
    /// never changes the result set, only which dialect a match is
    /// attributed to when several fire on the same text.
    pub fn extract_failures(&self, output: &str) -> FailureSet {
        let mut failures = FailureSet::new();
        for dialect in &self.dialects {
            failures.extend(dialect.extract(output));
        }
        failures
    }

    pub fn dialects(&self) -> &[FailureDialect] {
        &self.dialects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(output: &str) -> FailureSet {
        ResultClassifier::new().extract_failures(output)
    }

    #[test]
    fn extracts_mocha_numbered_failures() {
        let output = "\n  passing stuff\n  1) login rejects bad password\n  2) cart totals\n";
        let failures = extract(output);
        assert!(failures.contains("login rejects bad password"));
        assert!(failures.contains("cart totals"));
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn extracts_jest_fail_banners() {
        let output = "PASS src/a.test.ts\nFAIL src/session.test.ts\nFAIL src/io.test.js\n";
        let failures = extract(output);
        assert!(failures.contains("src/session.test.ts"));
        assert!(failures.contains("src/io.test.js"));
    }

    #[test]
    fn extracts_generic_error_traces() {
        let output = "Error: socket hung up at TCPConnectWrap.afterConnect\n";
        assert!(extract(output).contains("socket hung up"));
    }

    #[test]
    fn extracts_failing_summaries() {
        let output = "  3 passing\n  failing retries the upload\n";
        assert!(extract(output).contains("retries the upload"));
    }

    #[test]
    fn matches_are_trimmed() {
        let output = "  1)    padded name   \n";
        let failures = extract(output);
        assert!(failures.contains("padded name"));
    }

    #[test]
    fn duplicate_matches_collapse() {
        // Same identifier surfaced by two dialects still yields one entry.
        let output = "  1) src/x.test.ts\nFAIL src/x.test.ts\n";
        let failures = extract(output);
        assert_eq!(failures.len(), 1);
        assert!(failures.contains("src/x.test.ts"));
    }

    #[test]
    fn clean_output_yields_empty_set() {
        assert!(extract("all 42 tests passed\n").is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let classifier = ResultClassifier::new();
        let output = "  1) a\nFAIL src/b.test.js\n";
        let first = classifier.extract_failures(output);
        let second = classifier.extract_failures(output);
        assert_eq!(first, second);
    }

    #[test]
    fn extraction_is_monotonic_under_appends() {
        let classifier = ResultClassifier::new();
        let base = "  1) a\n";
        let extended = format!("{}  2) b\nFAIL src/c.test.ts\n", base);
        let before = classifier.extract_failures(base);
        let after = classifier.extract_failures(&extended);
        assert!(before.is_subset(&after));
    }
}
