//! Runtime skip interceptor
//!
//! Decorates a test harness's registration interface so declarations whose
//! names match the quarantine store are registered as skipped, with the
//! stored reason stitched into the visible name. Installed by composition
//! at process start - `wrap_registrar(harness, store)` - instead of
//! patching the harness's globals.
//!
//! Explicitly focused or skipped declarations pass through untouched: a
//! developer override of focus/skip must never be silently reinterpreted.

use crate::quarantine::QuarantineStore;

/// How a declaration was made at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    /// A plain declaration, eligible for quarantine interception.
    Standard,
    /// Explicitly focused ("only") by the developer.
    Focused,
    /// Explicitly skipped, optionally with a reason.
    Skipped { reason: Option<String> },
}

/// One test declaration on its way to the harness. The payload carries
/// whatever the harness needs to run the test (body, timeout, fixtures)
/// and is forwarded untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDecl<P> {
    pub name: String,
    pub kind: DeclKind,
    pub payload: P,
}

impl<P> TestDecl<P> {
    pub fn new(name: impl Into<String>, payload: P) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Standard,
            payload,
        }
    }

    pub fn focused(name: impl Into<String>, payload: P) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Focused,
            payload,
        }
    }

    pub fn skipped(name: impl Into<String>, reason: Option<String>, payload: P) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Skipped { reason },
            payload,
        }
    }
}

/// The registration interface of the underlying harness: one entry point
/// for a single test, one for a named group of tests.
pub trait Registrar<P> {
    fn register_test(&mut self, decl: TestDecl<P>);
    fn register_group(&mut self, name: &str, decls: Vec<TestDecl<P>>);
}

/// A registrar that consults the quarantine store before forwarding each
/// declaration to the inner harness.
pub struct QuarantineRegistrar<R> {
    inner: R,
    quarantine: QuarantineStore,
}

/// Compose the interceptor over the harness's real registrar. Call once at
/// process startup, before any declarations run.
pub fn wrap_registrar<R>(inner: R, quarantine: QuarantineStore) -> QuarantineRegistrar<R> {
    QuarantineRegistrar { inner, quarantine }
}

impl<R> QuarantineRegistrar<R> {
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn apply<P>(&self, decl: TestDecl<P>) -> TestDecl<P> {
        if decl.kind != DeclKind::Standard {
            return decl;
        }
        match self.quarantine.match_reason(&decl.name) {
            Some(reason) => TestDecl {
                name: format!("{} [QUARANTINED: {}]", decl.name, reason),
                kind: DeclKind::Skipped {
                    reason: Some(reason.to_string()),
                },
                payload: decl.payload,
            },
            None => decl,
        }
    }
}

impl<P, R: Registrar<P>> Registrar<P> for QuarantineRegistrar<R> {
    fn register_test(&mut self, decl: TestDecl<P>) {
        let decl = self.apply(decl);
        self.inner.register_test(decl);
    }

    fn register_group(&mut self, name: &str, decls: Vec<TestDecl<P>>) {
        let decls = decls.into_iter().map(|decl| self.apply(decl)).collect();
        self.inner.register_group(name, decls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records everything the harness would have received.
    #[derive(Default)]
    struct RecordingHarness {
        tests: Vec<TestDecl<()>>,
        groups: Vec<(String, Vec<TestDecl<()>>)>,
    }

    impl Registrar<()> for RecordingHarness {
        fn register_test(&mut self, decl: TestDecl<()>) {
            self.tests.push(decl);
        }

        fn register_group(&mut self, name: &str, decls: Vec<TestDecl<()>>) {
            self.groups.push((name.to_string(), decls));
        }
    }

    fn store(pairs: &[(&str, &str)]) -> QuarantineStore {
        let mut store = QuarantineStore::new();
        for (key, reason) in pairs {
            store.insert(*key, *reason);
        }
        store
    }

    #[test]
    fn exact_match_registers_as_annotated_skip() {
        let mut registrar = wrap_registrar(RecordingHarness::default(), store(&[("testA", "flaky")]));
        registrar.register_test(TestDecl::new("testA", ()));

        let harness = registrar.into_inner();
        let decl = &harness.tests[0];
        assert_eq!(decl.name, "testA [QUARANTINED: flaky]");
        assert_eq!(
            decl.kind,
            DeclKind::Skipped {
                reason: Some("flaky".to_string())
            }
        );
    }

    #[test]
    fn substring_match_also_skips() {
        let mut registrar = wrap_registrar(RecordingHarness::default(), store(&[("testA", "flaky")]));
        registrar.register_test(TestDecl::new("testA-extended", ()));

        let harness = registrar.into_inner();
        assert_eq!(harness.tests[0].name, "testA-extended [QUARANTINED: flaky]");
    }

    #[test]
    fn metadata_key_does_not_shadow() {
        let mut registrar =
            wrap_registrar(RecordingHarness::default(), store(&[("_testA", "metadata")]));
        registrar.register_test(TestDecl::new("testA-extended", ()));

        let harness = registrar.into_inner();
        assert_eq!(harness.tests[0].name, "testA-extended");
        assert_eq!(harness.tests[0].kind, DeclKind::Standard);
    }

    #[test]
    fn empty_store_passes_declarations_through_unmodified() {
        let mut registrar = wrap_registrar(RecordingHarness::default(), QuarantineStore::new());
        registrar.register_test(TestDecl::new("anything goes", ()));

        let harness = registrar.into_inner();
        assert_eq!(harness.tests[0], TestDecl::new("anything goes", ()));
    }

    #[test]
    fn focused_declarations_are_never_intercepted() {
        let mut registrar = wrap_registrar(RecordingHarness::default(), store(&[("testA", "flaky")]));
        registrar.register_test(TestDecl::focused("testA", ()));

        let harness = registrar.into_inner();
        assert_eq!(harness.tests[0].name, "testA");
        assert_eq!(harness.tests[0].kind, DeclKind::Focused);
    }

    #[test]
    fn explicit_skips_keep_their_own_reason() {
        let mut registrar = wrap_registrar(RecordingHarness::default(), store(&[("testA", "flaky")]));
        registrar.register_test(TestDecl::skipped("testA", Some("wip".to_string()), ()));

        let harness = registrar.into_inner();
        assert_eq!(
            harness.tests[0].kind,
            DeclKind::Skipped {
                reason: Some("wip".to_string())
            }
        );
        assert_eq!(harness.tests[0].name, "testA");
    }

    #[test]
    fn group_members_are_checked_individually() {
        let mut registrar = wrap_registrar(
            RecordingHarness::default(),
            store(&[("flaky test", "see incident 42")]),
        );
        registrar.register_group(
            "checkout",
            vec![
                TestDecl::new("stable test", ()),
                TestDecl::new("flaky test", ()),
            ],
        );

        let harness = registrar.into_inner();
        let (name, decls) = &harness.groups[0];
        assert_eq!(name, "checkout");
        assert_eq!(decls[0].name, "stable test");
        assert_eq!(decls[1].name, "flaky test [QUARANTINED: see incident 42]");
    }

    #[test]
    fn first_insertion_order_key_wins_for_substrings() {
        let mut registrar = wrap_registrar(
            RecordingHarness::default(),
            store(&[("upload", "disk"), ("retry", "network")]),
        );
        registrar.register_test(TestDecl::new("upload retry storm", ()));

        let harness = registrar.into_inner();
        assert_eq!(harness.tests[0].name, "upload retry storm [QUARANTINED: disk]");
    }
}
