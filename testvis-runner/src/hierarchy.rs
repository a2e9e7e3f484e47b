// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entity hierarchy for one test run.
//!
//! [`RunContext`] owns the session → module → suite → test tree and is the
//! only place entities are created, mutated and finalized. Entities are
//! created lazily as framework events arrive, finalized exactly once, and
//! handed out as immutable records from the finish methods. A record that has
//! been produced is never touched again.
//!
//! Suites for different files may start and finish in any interleaving; each
//! suite's mutable state hangs off its own entry in the suite map, and the
//! module/session aggregates are pure reductions over finalized suites, so
//! arrival order never changes the final result.

use crate::{
    errors::LifecycleViolation,
    helpers::plural,
    stopwatch::{StopwatchStart, stopwatch},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use std::collections::HashSet;
use testvis_metadata::{
    EnvironmentMetadata, ItrSummary, ModuleRecord, ModuleUuid, SessionRecord, SessionUuid,
    StatusCounts, SuiteRecord, SuiteUuid, TestRecord, TestStatus, TestUuid,
};
use tracing::warn;

/// ITR flags attached to a suite or test at creation time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ItrFlags {
    /// The entity was skipped by intelligent test skipping.
    pub skipped_by_itr: bool,

    /// The entity carries an unskippable override marker.
    pub unskippable: bool,

    /// The entity was in the skippable set but ran due to an override.
    pub forced_to_run: bool,

    /// Correlation id for backend bookkeeping.
    pub correlation_id: Option<String>,
}

/// Extra per-test attributes reported by the framework at test end.
#[derive(Clone, Debug, Default)]
pub struct TestExtras {
    /// Error message, for failed tests.
    pub error: Option<String>,

    /// True if real-user-monitoring was active during the test.
    pub is_rum_active: bool,

    /// First source line of the test body.
    pub source_line: Option<u32>,

    /// Framework-provided finish time overriding the pipeline's clock.
    pub finish_time: Option<DateTime<FixedOffset>>,
}

/// Session-level metadata captured at run start.
#[derive(Clone, Debug)]
pub struct SessionMeta {
    /// The command that launched the test run.
    pub command: String,

    /// Test framework name.
    pub framework: String,

    /// Test framework version.
    pub framework_version: String,

    /// Environment metadata for the session record.
    pub environment: EnvironmentMetadata,
}

#[derive(Debug)]
struct OpenTest {
    id: TestUuid,
    watch: StopwatchStart,
    flags: ItrFlags,
    is_new: Option<bool>,
}

#[derive(Debug)]
struct SuiteEntity {
    id: SuiteUuid,
    path: Utf8PathBuf,
    watch: StopwatchStart,
    flags: ItrFlags,
    open_tests: IndexMap<String, OpenTest>,
    finished_tests: Vec<TestRecord>,
}

impl SuiteEntity {
    fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for test in &self.finished_tests {
            counts.record(test.status);
        }
        counts
    }
}

/// Everything finalized by one suite finishing: the suite record and the test
/// records it contained.
#[derive(Clone, Debug)]
pub struct FinishedSuite {
    /// The finalized suite.
    pub suite: SuiteRecord,

    /// The finalized tests of the suite, in finish order.
    pub tests: Vec<TestRecord>,
}

/// The result of force-finishing a run: every entity that was still open,
/// finalized bottom-up.
#[derive(Clone, Debug)]
pub struct ForceFinished {
    /// Suites that were still open, with their tests.
    pub suites: Vec<FinishedSuite>,

    /// The module record, if the module was still open.
    pub module: Option<ModuleRecord>,

    /// The session record, if the session was still open.
    pub session: Option<SessionRecord>,
}

/// The hierarchy manager for one run.
///
/// Owned by the pipeline; never global. All methods take `&mut self`, so the
/// borrow checker enforces the single-mutator rule the design relies on.
#[derive(Debug)]
pub struct RunContext {
    meta: SessionMeta,
    session_id: SessionUuid,
    session_watch: StopwatchStart,
    module_id: ModuleUuid,
    module_watch: StopwatchStart,
    suites: IndexMap<Utf8PathBuf, SuiteEntity>,
    finished_suite_paths: HashSet<Utf8PathBuf>,
    // Pure-reduction inputs for the module/session status: one status per
    // finalized suite, plus the merged per-test counters.
    suite_status_counts: StatusCounts,
    merged_test_counts: StatusCounts,
    module_finished: bool,
    session_finished: bool,
    violations: Vec<LifecycleViolation>,
}

impl RunContext {
    /// Opens the session and module for a run.
    pub fn new(meta: SessionMeta) -> Self {
        Self {
            meta,
            session_id: SessionUuid::new_v4(),
            session_watch: stopwatch(),
            module_id: ModuleUuid::new_v4(),
            module_watch: stopwatch(),
            suites: IndexMap::new(),
            finished_suite_paths: HashSet::new(),
            suite_status_counts: StatusCounts::default(),
            merged_test_counts: StatusCounts::default(),
            module_finished: false,
            session_finished: false,
            violations: Vec::new(),
        }
    }

    /// The session id.
    pub fn session_id(&self) -> SessionUuid {
        self.session_id
    }

    /// The module id.
    pub fn module_id(&self) -> ModuleUuid {
        self.module_id
    }

    /// Lifecycle violations observed so far.
    pub fn violations(&self) -> &[LifecycleViolation] {
        &self.violations
    }

    /// The id of the open suite at `path`, if any.
    pub fn open_suite_id(&self, path: &Utf8Path) -> Option<SuiteUuid> {
        self.suites.get(path).map(|suite| suite.id)
    }

    /// The number of suites currently open.
    pub fn open_suite_count(&self) -> usize {
        self.suites.len()
    }

    /// The number of tests currently open across all suites.
    pub fn open_test_count(&self) -> usize {
        self.suites.values().map(|suite| suite.open_tests.len()).sum()
    }

    /// Returns true if a test with this name is currently open in the suite
    /// at `path`.
    pub fn has_open_test(&self, path: &Utf8Path, name: &str) -> bool {
        self.suites
            .get(path)
            .is_some_and(|suite| suite.open_tests.contains_key(name))
    }

    /// Starts (or returns the already-open) suite at `path`.
    ///
    /// Idempotent per path: the first call creates the suite, subsequent
    /// calls return the same id. Starting a suite after its module finished,
    /// or restarting a finished suite, is a lifecycle violation; a fallback
    /// entity is synthesized so the events that follow still have a home.
    pub fn start_suite(&mut self, path: &Utf8Path, flags: ItrFlags) -> SuiteUuid {
        if let Some(existing) = self.suites.get(path) {
            return existing.id;
        }
        if self.module_finished {
            self.record_violation(LifecycleViolation::SuiteAfterModuleFinished {
                path: path.to_path_buf(),
            });
        } else if self.finished_suite_paths.contains(path) {
            self.record_violation(LifecycleViolation::SuiteRestarted {
                path: path.to_path_buf(),
            });
        }
        let entity = SuiteEntity {
            id: SuiteUuid::new_v4(),
            path: path.to_path_buf(),
            watch: stopwatch(),
            flags,
            open_tests: IndexMap::new(),
            finished_tests: Vec::new(),
        };
        let id = entity.id;
        self.suites.insert(path.to_path_buf(), entity);
        id
    }

    /// Starts a test within the suite at `path`.
    ///
    /// The suite is created on demand; restarting a test name that is already
    /// open returns the existing id (first-writer-wins, matching
    /// `start_suite`).
    pub fn start_test(
        &mut self,
        path: &Utf8Path,
        name: &str,
        flags: ItrFlags,
        is_new: Option<bool>,
    ) -> TestUuid {
        if self.finished_suite_paths.contains(path) && !self.suites.contains_key(path) {
            self.record_violation(LifecycleViolation::TestAfterSuiteFinished {
                suite_path: path.to_path_buf(),
                name: name.to_owned(),
            });
        }
        if !self.suites.contains_key(path) {
            self.start_suite(path, ItrFlags::default());
        }
        let suite = self
            .suites
            .get_mut(path)
            .expect("suite was just created above");
        if let Some(open) = suite.open_tests.get(name) {
            return open.id;
        }
        let test = OpenTest {
            id: TestUuid::new_v4(),
            watch: stopwatch(),
            flags,
            is_new,
        };
        let id = test.id;
        suite.open_tests.insert(name.to_owned(), test);
        id
    }

    /// Finishes an open test.
    ///
    /// A finish without a matching start is a lifecycle violation; a record
    /// is synthesized with zero duration so the event is not lost.
    pub fn finish_test(
        &mut self,
        path: &Utf8Path,
        name: &str,
        status: TestStatus,
        extras: TestExtras,
    ) -> TestUuid {
        if !self
            .suites
            .get(path)
            .is_some_and(|suite| suite.open_tests.contains_key(name))
        {
            self.record_violation(LifecycleViolation::TestEndWithoutStart {
                suite_path: path.to_path_buf(),
                name: name.to_owned(),
            });
            let flags = ItrFlags::default();
            self.start_test(path, name, flags, None);
        }
        let session_id = self.session_id;
        let module_id = self.module_id;
        let suite = self
            .suites
            .get_mut(path)
            .expect("suite exists after start_test fallback");
        let (name, open) = suite
            .open_tests
            .swap_remove_entry(name)
            .expect("test was just opened above");
        let snapshot = open.watch.snapshot();
        let finished_at = extras.finish_time.unwrap_or_else(|| snapshot.end_time());
        let record = TestRecord {
            id: open.id,
            suite_id: suite.id,
            module_id,
            session_id,
            name,
            suite_path: suite.path.clone(),
            status,
            started_at: snapshot.start_time,
            finished_at,
            error: extras.error,
            skipped_by_itr: open.flags.skipped_by_itr,
            unskippable: open.flags.unskippable,
            forced_to_run: open.flags.forced_to_run,
            correlation_id: open.flags.correlation_id,
            is_new: open.is_new,
            is_rum_active: extras.is_rum_active,
            source_line: extras.source_line,
        };
        let id = record.id;
        suite.finished_tests.push(record);
        id
    }

    /// Creates and immediately finalizes a skipped test.
    ///
    /// Used for ITR-skipped tests and for framework-reported tests that never
    /// reached the pipeline.
    pub fn record_skipped_test(
        &mut self,
        path: &Utf8Path,
        name: &str,
        flags: ItrFlags,
        is_new: Option<bool>,
    ) -> TestUuid {
        self.start_test(path, name, flags, is_new);
        self.finish_test(path, name, TestStatus::Skip, TestExtras::default())
    }

    /// Rewrites the status (and error) of a test that already finished in the
    /// still-open suite at `path`.
    ///
    /// Supports late reconciliation against the framework's own report at
    /// suite end. Returns false if no such test exists.
    pub fn reconcile_test(
        &mut self,
        path: &Utf8Path,
        name: &str,
        status: TestStatus,
        error: Option<String>,
    ) -> bool {
        let Some(suite) = self.suites.get_mut(path) else {
            return false;
        };
        let Some(record) = suite
            .finished_tests
            .iter_mut()
            .find(|record| record.name == name)
        else {
            return false;
        };
        if record.status != status {
            record.status = status;
            if error.is_some() {
                record.error = error;
            }
        }
        true
    }

    /// Returns the names of tests that already finished in the open suite at
    /// `path`.
    pub fn finished_test_names(&self, path: &Utf8Path) -> Vec<String> {
        self.suites
            .get(path)
            .map(|suite| {
                suite
                    .finished_tests
                    .iter()
                    .map(|record| record.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Finishes the suite at `path`.
    ///
    /// Open tests are force-closed as `fail` first (with a warning); the
    /// suite status is the reduction over its tests, reconciled against the
    /// framework-reported status when one is given: the reported status wins,
    /// except that an observed `fail` is never downgraded.
    ///
    /// Returns `None` (and records a violation) if no suite is open at
    /// `path`.
    pub fn finish_suite(
        &mut self,
        path: &Utf8Path,
        reported_status: Option<TestStatus>,
    ) -> Option<FinishedSuite> {
        if !self.suites.contains_key(path) {
            self.record_violation(LifecycleViolation::SuiteEndWithoutStart {
                path: path.to_path_buf(),
            });
            return None;
        }
        self.force_close_open_tests(path);
        let session_id = self.session_id;
        let module_id = self.module_id;
        let suite = self
            .suites
            .swap_remove(path)
            .expect("checked for membership above");
        let counts = suite.counts();
        let computed = if suite.flags.skipped_by_itr && counts.total == 0 {
            TestStatus::Skip
        } else {
            counts.status()
        };
        let status = match reported_status {
            Some(reported) if !computed.is_fail() => reported,
            _ => computed,
        };
        let snapshot = suite.watch.snapshot();
        let record = SuiteRecord {
            id: suite.id,
            module_id,
            session_id,
            path: suite.path,
            status,
            started_at: snapshot.start_time,
            finished_at: snapshot.end_time(),
            skipped_by_itr: suite.flags.skipped_by_itr,
            unskippable: suite.flags.unskippable,
            forced_to_run: suite.flags.forced_to_run,
            correlation_id: suite.flags.correlation_id,
            counts,
        };
        self.finished_suite_paths.insert(record.path.clone());
        self.suite_status_counts.record(status);
        self.merged_test_counts.merge(counts);
        Some(FinishedSuite {
            suite: record,
            tests: suite.finished_tests,
        })
    }

    /// Finishes the module. Any still-open suites are force-closed first.
    ///
    /// Returns `None` (and records a violation) on a second finish.
    pub fn finish_module(
        &mut self,
        itr: ItrSummary,
        reported_status: Option<TestStatus>,
    ) -> Option<(ModuleRecord, Vec<FinishedSuite>)> {
        if self.module_finished {
            self.record_violation(LifecycleViolation::EventAfterSessionFinished {
                event: "module-end",
            });
            return None;
        }
        let stragglers = self.close_open_suites();
        self.module_finished = true;
        let status = self.aggregate_status(reported_status);
        let snapshot = self.module_watch.snapshot();
        let record = ModuleRecord {
            id: self.module_id,
            session_id: self.session_id,
            command: self.meta.command.clone(),
            framework: self.meta.framework.clone(),
            status,
            started_at: snapshot.start_time,
            finished_at: snapshot.end_time(),
            counts: self.merged_test_counts,
            itr,
        };
        Some((record, stragglers))
    }

    /// Finishes the session. The module must already be finished; if it is
    /// not, that is a violation and the session is finalized anyway.
    ///
    /// Returns `None` (and records a violation) on a second finish.
    pub fn finish_session(
        &mut self,
        itr: ItrSummary,
        reported_status: Option<TestStatus>,
    ) -> Option<SessionRecord> {
        if self.session_finished {
            self.record_violation(LifecycleViolation::EventAfterSessionFinished {
                event: "session-end",
            });
            return None;
        }
        self.session_finished = true;
        let status = self.aggregate_status(reported_status);
        let snapshot = self.session_watch.snapshot();
        Some(SessionRecord {
            id: self.session_id,
            command: self.meta.command.clone(),
            framework: self.meta.framework.clone(),
            framework_version: self.meta.framework_version.clone(),
            status,
            started_at: snapshot.start_time,
            finished_at: snapshot.end_time(),
            environment: self.meta.environment.clone(),
            counts: self.merged_test_counts,
            itr,
        })
    }

    /// Force-finishes everything still open, bottom-up: tests, then suites,
    /// then module, then session.
    ///
    /// Used on abnormal termination so no entity is ever left dangling. Open
    /// tests are assigned `fail`; containers reduce over their children, with
    /// `fail` for containers that had no children to reduce over.
    pub fn force_finish_all(&mut self, itr: ItrSummary) -> ForceFinished {
        let open_tests = self.open_test_count();
        let open_suites = self.open_suite_count();
        if open_tests > 0 || open_suites > 0 {
            warn!(
                "force-finishing {open_tests} open {}, {open_suites} open {}",
                plural::tests_str(open_tests),
                plural::suites_str(open_suites),
            );
        }
        let suites = self.close_open_suites();
        let aborted = suites.is_empty() && self.suite_status_counts.total == 0;
        let reported = aborted.then_some(TestStatus::Fail);
        let module = if self.module_finished {
            None
        } else {
            self.finish_module(itr.clone(), reported).map(|(record, _)| record)
        };
        let session = if self.session_finished {
            None
        } else {
            self.finish_session(itr, reported)
        };
        ForceFinished {
            suites,
            module,
            session,
        }
    }

    fn close_open_suites(&mut self) -> Vec<FinishedSuite> {
        let open_paths: Vec<Utf8PathBuf> = self.suites.keys().cloned().collect();
        open_paths
            .iter()
            .filter_map(|path| self.finish_suite(path, None))
            .collect()
    }

    fn force_close_open_tests(&mut self, path: &Utf8Path) {
        let Some(suite) = self.suites.get(path) else {
            return;
        };
        let open_names: Vec<String> = suite.open_tests.keys().cloned().collect();
        if open_names.is_empty() {
            return;
        }
        warn!(
            suite = %path,
            "force-closing {} open {} as failed",
            open_names.len(),
            plural::tests_str(open_names.len()),
        );
        for name in open_names {
            self.finish_test(path, &name, TestStatus::Fail, TestExtras::default());
        }
    }

    /// Module/session status: the reduction over finalized suite statuses,
    /// reconciled against a framework-reported status with
    /// fail-never-downgrades semantics.
    fn aggregate_status(&self, reported_status: Option<TestStatus>) -> TestStatus {
        let computed = self.suite_status_counts.status();
        match reported_status {
            Some(reported) if !computed.is_fail() => reported,
            _ => computed,
        }
    }

    fn record_violation(&mut self, violation: LifecycleViolation) {
        warn!(%violation, "lifecycle violation");
        self.violations.push(violation);
    }
}
