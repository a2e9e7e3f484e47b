// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The intelligent-test-runner skip decision engine.
//!
//! Given the skippable set fetched from the backend and the locally-discovered
//! unskippable suite markers, [`ItrEngine`] decides per suite or per test
//! whether execution can be skipped, and accumulates the aggregate tags
//! stamped on the session and module at run end.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use testvis_metadata::{ItrSummary, SkippableResponse, TestLevel};
use tracing::debug;

/// Identifier for an entry of the skippable set.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SkipKey {
    /// A whole suite is skippable.
    Suite(Utf8PathBuf),

    /// A single test within a suite is skippable.
    Test {
        /// The suite path.
        suite: Utf8PathBuf,
        /// The test name.
        name: String,
    },
}

/// The skippable set for one run: backend-selected suite or test identifiers
/// plus the correlation id tagging resulting events.
///
/// Read-only after construction; fetched exactly once before any suite
/// starts.
#[derive(Clone, Debug, Default)]
pub struct SkippableSet {
    entries: HashSet<SkipKey>,
    correlation_id: Option<String>,
}

impl SkippableSet {
    /// Builds the set from a backend response.
    pub fn from_response(response: SkippableResponse) -> Self {
        let correlation_id = response.correlation_id().map(str::to_owned);
        let entries = response
            .data
            .into_iter()
            .map(|item| match item.kind {
                TestLevel::Suite => SkipKey::Suite(item.attributes.suite),
                TestLevel::Test => SkipKey::Test {
                    suite: item.attributes.suite,
                    name: item.attributes.name.unwrap_or_default(),
                },
            })
            .collect();
        Self {
            entries,
            correlation_id,
        }
    }

    /// An empty set, used when the fetch failed or skipping is disabled.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the whole suite is skippable.
    pub fn contains_suite(&self, path: &Utf8Path) -> bool {
        self.entries
            .contains(&SkipKey::Suite(path.to_path_buf()))
    }

    /// Returns true if the individual test is skippable.
    pub fn contains_test(&self, suite: &Utf8Path, name: &str) -> bool {
        self.entries.contains(&SkipKey::Test {
            suite: suite.to_path_buf(),
            name: name.to_owned(),
        })
    }

    /// The number of skippable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The correlation id attached to the set, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

/// The outcome of a skip decision for one suite or test.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "decision")]
pub enum SkipDecision {
    /// Not in the skippable set, no override marker: run normally.
    Run,

    /// In the skippable set with no override: do not execute.
    Skip,

    /// In the skippable set but marked unskippable: execute, flagged
    /// `unskippable` and `forced_to_run`.
    ForcedRun,

    /// Marked unskippable but never a skip candidate: execute, flagged
    /// `unskippable` only.
    Unskippable,
}

impl SkipDecision {
    /// Returns true if the entity must not be executed.
    pub fn should_skip(self) -> bool {
        matches!(self, SkipDecision::Skip)
    }

    /// Returns true if the entity carries the unskippable flag.
    pub fn is_unskippable(self) -> bool {
        matches!(self, SkipDecision::ForcedRun | SkipDecision::Unskippable)
    }

    /// Returns true if the entity was going to be skipped but runs anyway.
    pub fn is_forced_run(self) -> bool {
        matches!(self, SkipDecision::ForcedRun)
    }
}

/// Accumulated skip activity for the run. OR-reductions and a count, so the
/// arrival order of decisions never changes the final aggregate.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct ItrState {
    skipped_count: usize,
    tests_skipped: bool,
    has_unskippable: bool,
    has_forced_to_run: bool,
}

/// The skip decision engine for one run.
#[derive(Clone, Debug)]
pub struct ItrEngine {
    level: TestLevel,
    skipping_enabled: bool,
    coverage_enabled: bool,
    skippable: SkippableSet,
    unskippable_suites: HashSet<Utf8PathBuf>,
    state: ItrState,
}

impl ItrEngine {
    /// An engine with skipping disabled: every decision is `Run` (modulo
    /// unskippable flags), and the summary reports skipping as unavailable.
    ///
    /// Used when the backend disabled skipping or the skippable-set fetch
    /// failed.
    pub fn disabled(level: TestLevel, coverage_enabled: bool) -> Self {
        Self {
            level,
            skipping_enabled: false,
            coverage_enabled,
            skippable: SkippableSet::empty(),
            unskippable_suites: HashSet::new(),
            state: ItrState::default(),
        }
    }

    /// An engine armed with a fetched skippable set and the local unskippable
    /// markers.
    pub fn new(
        level: TestLevel,
        coverage_enabled: bool,
        skippable: SkippableSet,
        unskippable_suites: impl IntoIterator<Item = Utf8PathBuf>,
    ) -> Self {
        Self {
            level,
            skipping_enabled: true,
            coverage_enabled,
            skippable,
            unskippable_suites: unskippable_suites.into_iter().collect(),
            state: ItrState::default(),
        }
    }

    /// The granularity this engine decides at.
    pub fn level(&self) -> TestLevel {
        self.level
    }

    /// Returns true if skipping is live for this run.
    pub fn skipping_enabled(&self) -> bool {
        self.skipping_enabled
    }

    /// The correlation id to stamp on skip-affected entities.
    pub fn correlation_id(&self) -> Option<&str> {
        self.skippable.correlation_id()
    }

    /// Decides whether a suite should be skipped. Call exactly once per
    /// suite, at creation time, when running at suite level.
    pub fn decide_suite(&mut self, path: &Utf8Path) -> SkipDecision {
        let in_set = self.level == TestLevel::Suite
            && self.skipping_enabled
            && self.skippable.contains_suite(path);
        let decision = self.decide(in_set, self.is_suite_unskippable(path));
        debug!(suite = %path, ?decision, "suite skip decision");
        decision
    }

    /// Decides whether a single test should be skipped. Call exactly once per
    /// test, at creation time, when running at test level.
    pub fn decide_test(&mut self, suite: &Utf8Path, name: &str) -> SkipDecision {
        let in_set = self.level == TestLevel::Test
            && self.skipping_enabled
            && self.skippable.contains_test(suite, name);
        let decision = self.decide(in_set, self.is_suite_unskippable(suite));
        debug!(suite = %suite, test = name, ?decision, "test skip decision");
        decision
    }

    /// Returns true if a test is in the skippable set, without recording a
    /// decision.
    ///
    /// Used for tests synthesized at suite end: they were skipped before the
    /// pipeline ever saw them start, and their skip was already counted when
    /// the decision was made.
    pub fn is_test_skippable(&self, suite: &Utf8Path, name: &str) -> bool {
        self.skipping_enabled
            && self.level == TestLevel::Test
            && self.skippable.contains_test(suite, name)
            && !self.is_suite_unskippable(suite)
    }

    /// Returns true if the suite carries an unskippable override marker.
    pub fn is_suite_unskippable(&self, path: &Utf8Path) -> bool {
        self.unskippable_suites.contains(path)
    }

    /// Returns true if a suite is in the skippable set, without recording a
    /// decision.
    ///
    /// Used to derive per-test flags inside a suite whose own decision was
    /// already counted.
    pub fn is_suite_skip_candidate(&self, path: &Utf8Path) -> bool {
        self.skipping_enabled
            && self.level == TestLevel::Suite
            && self.skippable.contains_suite(path)
    }

    fn decide(&mut self, in_set: bool, unskippable: bool) -> SkipDecision {
        let decision = match (in_set, unskippable) {
            (false, false) => SkipDecision::Run,
            (true, false) => SkipDecision::Skip,
            (true, true) => SkipDecision::ForcedRun,
            (false, true) => SkipDecision::Unskippable,
        };
        if decision.should_skip() {
            self.state.skipped_count += 1;
            self.state.tests_skipped = true;
        }
        if decision.is_unskippable() {
            self.state.has_unskippable = true;
        }
        if decision.is_forced_run() {
            self.state.has_forced_to_run = true;
        }
        decision
    }

    /// The aggregate ITR tags for the session and module records.
    pub fn summary(&self) -> ItrSummary {
        ItrSummary {
            tests_skipped: self.state.tests_skipped,
            itr_skipping_enabled: self.skipping_enabled,
            code_coverage_enabled: self.coverage_enabled,
            skipping_type: self.level,
            skipping_count: self.state.skipped_count,
            has_unskippable_suites: self.state.has_unskippable,
            has_forced_to_run_suites: self.state.has_forced_to_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use testvis_metadata::{SkippableAttributes, SkippableItem};

    fn suite_set(suites: &[&str]) -> SkippableSet {
        let response = SkippableResponse {
            data: suites
                .iter()
                .map(|suite| SkippableItem {
                    kind: TestLevel::Suite,
                    attributes: SkippableAttributes {
                        suite: (*suite).into(),
                        name: None,
                    },
                })
                .collect(),
            meta: None,
        };
        SkippableSet::from_response(response)
    }

    #[test]
    fn skippable_suite_is_skipped() {
        let mut engine = ItrEngine::new(
            TestLevel::Suite,
            false,
            suite_set(&["farewell.feature"]),
            [],
        );
        assert_eq!(
            engine.decide_suite("farewell.feature".into()),
            SkipDecision::Skip
        );
        assert_eq!(
            engine.decide_suite("greetings.feature".into()),
            SkipDecision::Run
        );

        let summary = engine.summary();
        assert!(summary.tests_skipped);
        assert!(summary.itr_skipping_enabled);
        assert_eq!(summary.skipping_count, 1);
        assert_eq!(summary.skipping_type, TestLevel::Suite);
    }

    #[test]
    fn unskippable_marker_forces_run() {
        let mut engine = ItrEngine::new(
            TestLevel::Suite,
            false,
            suite_set(&["farewell.feature"]),
            [Utf8PathBuf::from("farewell.feature")],
        );
        assert_eq!(
            engine.decide_suite("farewell.feature".into()),
            SkipDecision::ForcedRun
        );

        let summary = engine.summary();
        assert!(!summary.tests_skipped);
        assert_eq!(summary.skipping_count, 0);
        assert!(summary.has_unskippable_suites);
        assert!(summary.has_forced_to_run_suites);
    }

    #[test]
    fn unskippable_without_skip_candidate_flags_only() {
        let mut engine = ItrEngine::new(
            TestLevel::Suite,
            false,
            suite_set(&["farewell.feature"]),
            [Utf8PathBuf::from("greetings.feature")],
        );
        assert_eq!(
            engine.decide_suite("greetings.feature".into()),
            SkipDecision::Unskippable
        );

        let summary = engine.summary();
        assert!(summary.has_unskippable_suites);
        assert!(!summary.has_forced_to_run_suites);
    }

    #[test]
    fn disabled_engine_never_skips() {
        let mut engine = ItrEngine::disabled(TestLevel::Suite, false);
        assert_eq!(
            engine.decide_suite("farewell.feature".into()),
            SkipDecision::Run
        );

        let summary = engine.summary();
        assert!(!summary.tests_skipped);
        assert!(!summary.itr_skipping_enabled);
    }

    #[test]
    fn test_level_set_ignores_suite_queries() {
        let response = SkippableResponse {
            data: vec![SkippableItem {
                kind: TestLevel::Test,
                attributes: SkippableAttributes {
                    suite: "greetings.feature".into(),
                    name: Some("Say greetings".to_owned()),
                },
            }],
            meta: None,
        };
        let mut engine = ItrEngine::new(
            TestLevel::Test,
            false,
            SkippableSet::from_response(response),
            [],
        );
        // Suite-level decisions never fire in test-level mode.
        assert_eq!(
            engine.decide_suite("greetings.feature".into()),
            SkipDecision::Run
        );
        assert_eq!(
            engine.decide_test("greetings.feature".into(), "Say greetings"),
            SkipDecision::Skip
        );
        assert_eq!(
            engine.decide_test("greetings.feature".into(), "Say farewell"),
            SkipDecision::Run
        );
    }

    proptest! {
        // A skipped entity is never unskippable, and forced-to-run implies
        // both unskippable and membership in the skippable set.
        #[test]
        fn decision_invariants(
            skippable in prop::collection::hash_set("[a-z]{1,8}\\.feature", 0..8),
            unskippable in prop::collection::hash_set("[a-z]{1,8}\\.feature", 0..8),
            queries in prop::collection::vec("[a-z]{1,8}\\.feature", 1..16),
        ) {
            let set = suite_set(&skippable.iter().map(String::as_str).collect::<Vec<_>>());
            let mut engine = ItrEngine::new(
                TestLevel::Suite,
                false,
                set,
                unskippable.iter().map(Utf8PathBuf::from),
            );
            for query in &queries {
                let decision = engine.decide_suite(query.as_str().into());
                if decision.should_skip() {
                    prop_assert!(!decision.is_unskippable());
                    prop_assert!(skippable.contains(query));
                }
                if decision.is_forced_run() {
                    prop_assert!(decision.is_unskippable());
                    prop_assert!(skippable.contains(query));
                    prop_assert!(unskippable.contains(query));
                }
            }
        }

        // The aggregate count equals the number of Skip decisions handed out.
        #[test]
        fn skip_count_matches_decisions(
            skippable in prop::collection::hash_set("[a-z]{1,8}\\.feature", 0..8),
            queries in prop::collection::vec("[a-z]{1,8}\\.feature", 0..16),
        ) {
            let set = suite_set(&skippable.iter().map(String::as_str).collect::<Vec<_>>());
            let mut engine = ItrEngine::new(TestLevel::Suite, false, set, []);
            let mut expected = 0;
            for query in &queries {
                if engine.decide_suite(query.as_str().into()).should_skip() {
                    expected += 1;
                }
            }
            prop_assert_eq!(engine.summary().skipping_count, expected);
        }
    }
}
