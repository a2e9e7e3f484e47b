// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event pipeline: lifecycle hooks in, finalized records out.
//!
//! [`EventPipeline`] wires the hierarchy manager, the skip decision engine,
//! the coverage aggregator and the known-tests classifier behind the six
//! lifecycle hooks the instrumentation layer calls. The pipeline is owned by
//! that layer and passed to every hook; there is no global run state, so
//! multiple pipelines can coexist in one process.
//!
//! Hook methods never fail. Recoverable problems degrade and are logged;
//! internal consistency failures are collected on
//! [`internal_errors`](EventPipeline::internal_errors) for diagnostics.

use crate::{
    client::{BackendClient, fetch_known_tests, fetch_skippable_set},
    config::CiConfig,
    coverage::CoverageAggregator,
    errors::{HierarchyError, LifecycleViolation},
    events::{
        EventSink, ExportEvent, RunStartDetails, RunSummary, StartDecision, SuiteEndDetails,
        TestEndDetails,
    },
    helpers::rel_path_from_root,
    hierarchy::{FinishedSuite, ItrFlags, RunContext, SessionMeta, TestExtras},
    itr::{ItrEngine, SkipDecision},
    known_tests::KnownTestsCatalog,
};
use camino::{Utf8Path, Utf8PathBuf};
use testvis_metadata::{SessionUuid, TestLevel, TestStatus};
use tracing::{debug, error, warn};

struct RunState {
    ctx: RunContext,
    itr: ItrEngine,
    coverage: CoverageAggregator,
    known_tests: KnownTestsCatalog,
    root: Utf8PathBuf,
    run_finished: bool,
}

/// The test-visibility pipeline for one run.
pub struct EventPipeline<C, S> {
    config: CiConfig,
    client: C,
    sink: S,
    state: Option<RunState>,
    internal_errors: Vec<HierarchyError>,
}

impl<C: BackendClient, S: EventSink> EventPipeline<C, S> {
    /// Creates a pipeline. Nothing is fetched until
    /// [`on_run_start`](Self::on_run_start).
    pub fn new(config: CiConfig, client: C, sink: S) -> Self {
        Self {
            config,
            client,
            sink,
            state: None,
            internal_errors: Vec::new(),
        }
    }

    /// Handles `run:start`: performs the once-per-run backend fetches and
    /// opens the session and module.
    ///
    /// This is the only suspension point in the pipeline. Both fetches run
    /// under the configured deadline and degrade on failure; the run is never
    /// blocked by the backend.
    pub async fn on_run_start(&mut self, details: RunStartDetails) {
        if self.state.is_some() {
            warn!("run already started; ignoring duplicate run:start");
            return;
        }

        let itr = match fetch_skippable_set(&self.client, &self.config).await {
            Some(skippable) => ItrEngine::new(
                self.config.test_level,
                self.config.code_coverage_enabled,
                skippable,
                details
                    .specs
                    .iter()
                    .filter(|spec| spec.unskippable)
                    .map(|spec| spec.relative.clone()),
            ),
            None => ItrEngine::disabled(
                self.config.test_level,
                self.config.code_coverage_enabled,
            ),
        };
        let known_tests = fetch_known_tests(&self.client, &self.config).await;

        let root = details
            .root_dir
            .unwrap_or_else(|| self.config.repository_root.clone());
        let ctx = RunContext::new(SessionMeta {
            command: details.command,
            framework: self.config.framework.clone(),
            framework_version: details.framework_version,
            environment: self.config.environment_metadata(),
        });
        let coverage = CoverageAggregator::new(root.clone(), ctx.session_id());
        debug!(
            session_id = %ctx.session_id(),
            skipping_enabled = itr.skipping_enabled(),
            known_tests_available = known_tests.is_available(),
            "test-visibility run started"
        );
        self.state = Some(RunState {
            ctx,
            itr,
            coverage,
            known_tests,
            root,
            run_finished: false,
        });
    }

    /// Handles `suite:start`. Returns the skip decision for the suite; when
    /// `should_skip` is true the framework must not enter the suite, and the
    /// suite has already been finalized as skipped.
    pub fn on_suite_start(&mut self, path: &Utf8Path) -> StartDecision {
        let Some(state) = &mut self.state else {
            warn!(suite = %path, "suite:start before run:start; running suite unobserved");
            return StartDecision::run();
        };
        let path = rel_path_from_root(&state.root, path);
        if state.ctx.open_suite_id(&path).is_some() {
            return StartDecision::run();
        }

        let decision = state.itr.decide_suite(&path);
        let flags = ItrFlags {
            skipped_by_itr: decision.should_skip(),
            unskippable: decision.is_unskippable(),
            forced_to_run: decision.is_forced_run(),
            correlation_id: state.itr.correlation_id().map(str::to_owned),
        };
        state.ctx.start_suite(&path, flags);

        if decision.should_skip() {
            // Suite-level skip: the framework never enters the suite, so the
            // entity finishes right here.
            if let Some(finished) = state.ctx.finish_suite(&path, Some(TestStatus::Skip)) {
                export_suite(
                    &mut self.sink,
                    &mut state.coverage,
                    &mut self.internal_errors,
                    finished,
                );
            }
            return StartDecision::skip();
        }
        StartDecision::run()
    }

    /// Handles `test:start`. Returns the skip decision for the test; when
    /// `should_skip` is true the framework must not execute it, and a skipped
    /// test record has already been created.
    pub fn on_test_start(&mut self, suite_path: &Utf8Path, name: &str) -> StartDecision {
        let Some(state) = &mut self.state else {
            warn!(
                suite = %suite_path,
                test = name,
                "test:start before run:start; running test unobserved"
            );
            return StartDecision::run();
        };
        let path = rel_path_from_root(&state.root, suite_path);
        if state.ctx.open_suite_id(&path).is_none() {
            // The framework skipped the suite:start callback (some runners
            // do). Open the suite without a fresh decision so aggregate
            // counters are not double-recorded.
            let flags = suite_flags_without_decision(&state.itr, &path);
            state.ctx.start_suite(&path, flags);
        }

        let is_new = state.known_tests.classify(&path, name);
        match state.itr.level() {
            TestLevel::Test => {
                let decision = state.itr.decide_test(&path, name);
                let flags = test_flags(&state.itr, decision);
                if decision.should_skip() {
                    state.ctx.record_skipped_test(&path, name, flags, is_new);
                    return StartDecision::skip();
                }
                let id = state.ctx.start_test(&path, name, flags, is_new);
                StartDecision::run_test(id)
            }
            TestLevel::Suite => {
                let flags = suite_flags_without_decision(&state.itr, &path);
                let id = state.ctx.start_test(&path, name, flags, is_new);
                StartDecision::run_test(id)
            }
        }
    }

    /// Handles `test:end`: finalizes the test and records its coverage.
    ///
    /// The test record is exported at suite end, after the framework's own
    /// per-suite report has had a chance to reconcile it.
    pub fn on_test_end(&mut self, suite_path: &Utf8Path, name: &str, details: TestEndDetails) {
        let Some(state) = &mut self.state else {
            warn!(suite = %suite_path, test = name, "test:end before run:start; dropped");
            return;
        };
        let path = rel_path_from_root(&state.root, suite_path);
        state.ctx.finish_test(
            &path,
            name,
            details.status,
            TestExtras {
                error: details.error,
                is_rum_active: details.is_rum_active,
                source_line: details.source_line,
                finish_time: details.finish_time,
            },
        );
        if self.config.code_coverage_enabled
            && let Some(files) = details.coverage
            && let Some(suite_id) = state.ctx.open_suite_id(&path)
        {
            state.coverage.record_test_coverage(&path, suite_id, &files);
        }
    }

    /// Handles `suite:end`: reconciles the framework's per-test report,
    /// synthesizes records for tests the pipeline never saw, finalizes the
    /// suite and exports it together with its tests and coverage payload.
    pub fn on_suite_end(&mut self, path: &Utf8Path, details: SuiteEndDetails) {
        let Some(state) = &mut self.state else {
            warn!(suite = %path, "suite:end before run:start; dropped");
            return;
        };
        let path = rel_path_from_root(&state.root, path);

        let finished_names = state.ctx.finished_test_names(&path);
        for outcome in &details.tests {
            if finished_names.contains(&outcome.name) {
                state
                    .ctx
                    .reconcile_test(&path, &outcome.name, outcome.status, outcome.error.clone());
            } else if state.ctx.has_open_test(&path, &outcome.name) {
                state.ctx.finish_test(
                    &path,
                    &outcome.name,
                    outcome.status,
                    TestExtras {
                        error: outcome.error.clone(),
                        ..TestExtras::default()
                    },
                );
            } else {
                // The framework reports a test the pipeline never saw start:
                // it was skipped before test:start fired. Record it as
                // skipped, attributing the skip to ITR when the skippable set
                // contains it.
                let skipped_by_itr = state.itr.is_test_skippable(&path, &outcome.name);
                let flags = ItrFlags {
                    skipped_by_itr,
                    unskippable: state.itr.is_suite_unskippable(&path),
                    forced_to_run: false,
                    correlation_id: state.itr.correlation_id().map(str::to_owned),
                };
                let is_new = state.known_tests.classify(&path, &outcome.name);
                state
                    .ctx
                    .record_skipped_test(&path, &outcome.name, flags, is_new);
            }
        }

        if let Some(finished) = state.ctx.finish_suite(&path, details.status) {
            export_suite(
                &mut self.sink,
                &mut state.coverage,
                &mut self.internal_errors,
                finished,
            );
        }
    }

    /// Handles `run:end`: finalizes the module and session, stamps the ITR
    /// summary tags, and exports both records.
    pub fn on_run_end(&mut self, summary: RunSummary) {
        let Some(state) = &mut self.state else {
            warn!("run:end before run:start; dropped");
            return;
        };
        if state.run_finished {
            warn!("run already finished; ignoring duplicate run:end");
            return;
        }
        state.run_finished = true;

        let itr = state.itr.summary();
        let reported = Some(summary.status());
        if let Some((module, stragglers)) = state.ctx.finish_module(itr.clone(), reported) {
            for finished in stragglers {
                export_suite(
                    &mut self.sink,
                    &mut state.coverage,
                    &mut self.internal_errors,
                    finished,
                );
            }
            self.sink.export(ExportEvent::ModuleFinished(module));
        }
        if let Some(session) = state.ctx.finish_session(itr, reported) {
            self.sink.export(ExportEvent::SessionFinished(session));
        }
    }

    /// Abnormal-termination path: force-finishes every open entity bottom-up
    /// and exports the results, so nothing dangles when the host process is
    /// torn down mid-run.
    pub fn abort(&mut self) {
        let Some(state) = &mut self.state else {
            return;
        };
        if state.run_finished {
            return;
        }
        state.run_finished = true;
        warn!("aborting test-visibility run; force-finishing open entities");

        let finished = state.ctx.force_finish_all(state.itr.summary());
        for suite in finished.suites {
            export_suite(
                &mut self.sink,
                &mut state.coverage,
                &mut self.internal_errors,
                suite,
            );
        }
        if let Some(module) = finished.module {
            self.sink.export(ExportEvent::ModuleFinished(module));
        }
        if let Some(session) = finished.session {
            self.sink.export(ExportEvent::SessionFinished(session));
        }
    }

    /// The session id, once the run has started.
    pub fn session_id(&self) -> Option<SessionUuid> {
        self.state.as_ref().map(|state| state.ctx.session_id())
    }

    /// Lifecycle violations absorbed so far.
    pub fn violations(&self) -> &[LifecycleViolation] {
        self.state
            .as_ref()
            .map(|state| state.ctx.violations())
            .unwrap_or_default()
    }

    /// Internal consistency failures observed so far. Non-empty means this
    /// pipeline has a bug; the affected payloads were dropped, the run was
    /// not disturbed.
    pub fn internal_errors(&self) -> &[HierarchyError] {
        &self.internal_errors
    }

    /// Consumes the pipeline and returns the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

fn suite_flags_without_decision(itr: &ItrEngine, path: &Utf8Path) -> ItrFlags {
    let unskippable = itr.is_suite_unskippable(path);
    ItrFlags {
        skipped_by_itr: false,
        unskippable,
        forced_to_run: unskippable && itr.is_suite_skip_candidate(path),
        correlation_id: itr.correlation_id().map(str::to_owned),
    }
}

fn test_flags(itr: &ItrEngine, decision: SkipDecision) -> ItrFlags {
    ItrFlags {
        skipped_by_itr: decision.should_skip(),
        unskippable: decision.is_unskippable(),
        forced_to_run: decision.is_forced_run(),
        correlation_id: itr.correlation_id().map(str::to_owned),
    }
}

fn export_suite<S: EventSink>(
    sink: &mut S,
    coverage: &mut CoverageAggregator,
    internal_errors: &mut Vec<HierarchyError>,
    finished: FinishedSuite,
) {
    let FinishedSuite { suite, tests } = finished;
    for test in tests {
        sink.export(ExportEvent::TestFinished(test));
    }
    match coverage.finish_suite(&suite) {
        Ok(Some(payload)) => {
            sink.export(ExportEvent::SuiteFinished(suite));
            sink.export(ExportEvent::SuiteCoverage(payload));
        }
        Ok(None) => {
            sink.export(ExportEvent::SuiteFinished(suite));
        }
        Err(err) => {
            error!(%err, "coverage payload inconsistent with finalized suite; dropped");
            internal_errors.push(err);
            sink.export(ExportEvent::SuiteFinished(suite));
        }
    }
}
