// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed payloads for the instrumentation hook surface, and the export seam.
//!
//! The framework instrumentation layer produces loosely-shaped data; these
//! types are the boundary where that data becomes fully validated. Internal
//! logic never sees partially-shaped payloads.

use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset};
use testvis_metadata::{
    ModuleRecord, SessionRecord, SuiteCoverage, SuiteRecord, TestRecord, TestStatus, TestUuid,
};

/// One spec file discovered at run start.
#[derive(Clone, Debug)]
pub struct SpecFile {
    /// Absolute path on disk.
    pub absolute: Utf8PathBuf,

    /// Repository-relative path; this is the suite identifier.
    pub relative: Utf8PathBuf,

    /// True if the file carries an unskippable override marker. Marker
    /// discovery is the instrumentation layer's job.
    pub unskippable: bool,
}

/// Details reported by the framework when the run starts.
#[derive(Clone, Debug)]
pub struct RunStartDetails {
    /// The command line that launched the run.
    pub command: String,

    /// The framework version in use.
    pub framework_version: String,

    /// Project root directory, when the framework reports one. Overrides the
    /// configured repository root for path normalization.
    pub root_dir: Option<Utf8PathBuf>,

    /// The spec files that will run.
    pub specs: Vec<SpecFile>,
}

/// Details reported by the framework when a test finishes.
#[derive(Clone, Debug)]
pub struct TestEndDetails {
    /// The test's final status.
    pub status: TestStatus,

    /// Error message, for failed tests.
    pub error: Option<String>,

    /// Covered file paths for the test, when coverage collection is on.
    /// Paths may be absolute.
    pub coverage: Option<Vec<Utf8PathBuf>>,

    /// True if real-user-monitoring was active during the test.
    pub is_rum_active: bool,

    /// First source line of the test body.
    pub source_line: Option<u32>,

    /// Framework-provided finish time. When absent the pipeline's own clock
    /// is used.
    pub finish_time: Option<DateTime<FixedOffset>>,
}

impl Default for TestEndDetails {
    fn default() -> Self {
        Self {
            status: TestStatus::Pass,
            error: None,
            coverage: None,
            is_rum_active: false,
            source_line: None,
            finish_time: None,
        }
    }
}

/// The framework's own view of one test, reported at suite end.
///
/// Used to reconcile statuses the pipeline recorded earlier (an `after` hook
/// failure can change a test's outcome after its end callback fired) and to
/// synthesize records for tests the pipeline never saw start.
#[derive(Clone, Debug)]
pub struct FrameworkTestOutcome {
    /// The test name.
    pub name: String,

    /// The framework-reported status.
    pub status: TestStatus,

    /// Error message attached by the framework.
    pub error: Option<String>,
}

/// Details reported by the framework when a suite finishes.
#[derive(Clone, Debug, Default)]
pub struct SuiteEndDetails {
    /// The framework-reported suite status, if the framework computes one.
    pub status: Option<TestStatus>,

    /// The framework's view of every test in the suite.
    pub tests: Vec<FrameworkTestOutcome>,
}

/// Totals reported by the framework when the run finishes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    /// Total number of tests the framework ran or skipped.
    pub total_tests: usize,

    /// Number of failed tests.
    pub total_failed: usize,

    /// Number of skipped tests.
    pub total_skipped: usize,
}

impl RunSummary {
    /// The session status these totals reduce to.
    pub fn status(&self) -> TestStatus {
        if self.total_failed > 0 {
            TestStatus::Fail
        } else if self.total_tests > 0 && self.total_skipped == self.total_tests {
            TestStatus::Skip
        } else {
            TestStatus::Pass
        }
    }
}

/// Decision returned from the suite-start and test-start hooks.
#[derive(Clone, Copy, Debug, Default)]
pub struct StartDecision {
    /// True if the caller must not execute the suite/test. The corresponding
    /// entity has already been finalized as skipped.
    pub should_skip: bool,

    /// The id of the started test, when a test entity was created. Lets the
    /// instrumentation layer correlate external evidence (e.g. RUM sessions)
    /// with the test.
    pub test_id: Option<TestUuid>,
}

impl StartDecision {
    pub(crate) fn skip() -> Self {
        Self {
            should_skip: true,
            test_id: None,
        }
    }

    pub(crate) fn run() -> Self {
        Self {
            should_skip: false,
            test_id: None,
        }
    }

    pub(crate) fn run_test(test_id: TestUuid) -> Self {
        Self {
            should_skip: false,
            test_id: Some(test_id),
        }
    }
}

/// A finalized record leaving the pipeline.
#[derive(Clone, Debug)]
pub enum ExportEvent {
    /// A test finished and was finalized.
    TestFinished(TestRecord),

    /// A suite finished and was finalized.
    SuiteFinished(SuiteRecord),

    /// The coverage payload for a finished suite.
    SuiteCoverage(SuiteCoverage),

    /// The module finished.
    ModuleFinished(ModuleRecord),

    /// The session finished. Always the last event of a run.
    SessionFinished(SessionRecord),
}

/// Consumer of finalized records: the wire-level exporter lives behind this
/// trait.
pub trait EventSink {
    /// Receives one finalized record. Must not block for long; the pipeline
    /// calls this from the framework's callback context.
    fn export(&mut self, event: ExportEvent);
}

impl EventSink for Vec<ExportEvent> {
    fn export(&mut self, event: ExportEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_summary_status_reduction() {
        let summary = RunSummary {
            total_tests: 3,
            total_failed: 1,
            total_skipped: 0,
        };
        assert_eq!(summary.status(), TestStatus::Fail);

        let summary = RunSummary {
            total_tests: 2,
            total_failed: 0,
            total_skipped: 2,
        };
        assert_eq!(summary.status(), TestStatus::Skip);

        assert_eq!(RunSummary::default().status(), TestStatus::Pass);
    }
}
