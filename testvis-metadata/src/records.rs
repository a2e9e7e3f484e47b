// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finalized entity records handed to the exporter.
//!
//! Records are produced exactly once per entity, when the entity is
//! finalized. They are plain data: all decisions (skip verdicts, status
//! aggregation, coverage attribution) have already been applied by the time a
//! record exists.

use crate::{
    ModuleUuid, SessionUuid, StatusCounts, SuiteUuid, TestLevel, TestStatus, TestUuid,
};
use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Environment metadata captured once per run and stamped on the session
/// record.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct EnvironmentMetadata {
    /// Operating system platform, e.g. `linux`.
    #[serde(rename = "os.platform")]
    pub os_platform: String,

    /// Operating system version.
    #[serde(rename = "os.version")]
    pub os_version: String,

    /// Machine architecture, e.g. `x86_64`.
    #[serde(rename = "os.architecture")]
    pub os_architecture: String,

    /// Runtime name, e.g. `rust`.
    #[serde(rename = "runtime.name")]
    pub runtime_name: String,

    /// Runtime version.
    #[serde(rename = "runtime.version")]
    pub runtime_version: String,

    /// Repository URL from git metadata.
    #[serde(rename = "git.repository_url")]
    pub repository_url: String,

    /// Commit SHA from git metadata.
    #[serde(rename = "git.commit.sha")]
    pub sha: String,

    /// Branch name from git metadata, if known.
    #[serde(rename = "git.branch", skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// CI provider name, if the run happens on a recognized provider.
    #[serde(rename = "ci.provider.name", skip_serializing_if = "Option::is_none")]
    pub ci_provider: Option<String>,
}

/// Intelligent-test-runner summary tags, attached to session and module
/// records.
///
/// Every boolean here is an OR-reduction over the suites contained in the
/// entity, and `skipping_count` is a sum; both are insensitive to the order
/// in which suites finished.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ItrSummary {
    /// True if any suite or test was skipped by intelligent test skipping.
    pub tests_skipped: bool,

    /// True if the backend enabled skipping for this run and the skippable
    /// set was fetched successfully.
    pub itr_skipping_enabled: bool,

    /// True if per-test code coverage collection was enabled.
    pub code_coverage_enabled: bool,

    /// The granularity skip decisions were made at.
    pub skipping_type: TestLevel,

    /// The number of suites or tests (depending on `skipping_type`) that were
    /// skipped.
    pub skipping_count: usize,

    /// True if any suite carried an unskippable override marker.
    pub has_unskippable_suites: bool,

    /// True if any suite was forced to run despite being skippable.
    pub has_forced_to_run_suites: bool,
}

/// A finalized test session: exactly one per process run.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SessionRecord {
    /// The session id.
    pub id: SessionUuid,

    /// The command that launched the test run.
    pub command: String,

    /// Test framework name.
    pub framework: String,

    /// Test framework version.
    pub framework_version: String,

    /// The final session status.
    pub status: TestStatus,

    /// When the session started.
    pub started_at: DateTime<FixedOffset>,

    /// When the session finished.
    pub finished_at: DateTime<FixedOffset>,

    /// Environment metadata for the run.
    pub environment: EnvironmentMetadata,

    /// Aggregated test counters across every suite in the session.
    pub counts: StatusCounts,

    /// Intelligent-test-runner summary tags.
    pub itr: ItrSummary,
}

/// A finalized test module: groups the suites of one framework invocation.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ModuleRecord {
    /// The module id.
    pub id: ModuleUuid,

    /// Id of the parent session.
    pub session_id: SessionUuid,

    /// The command that launched the test run.
    pub command: String,

    /// Test framework name.
    pub framework: String,

    /// The final module status.
    pub status: TestStatus,

    /// When the module started.
    pub started_at: DateTime<FixedOffset>,

    /// When the module finished.
    pub finished_at: DateTime<FixedOffset>,

    /// Aggregated test counters across every suite in the module.
    pub counts: StatusCounts,

    /// Intelligent-test-runner summary tags.
    pub itr: ItrSummary,
}

/// A finalized test suite: one per source/feature file.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SuiteRecord {
    /// The suite id.
    pub id: SuiteUuid,

    /// Id of the parent module.
    pub module_id: ModuleUuid,

    /// Id of the owning session.
    pub session_id: SessionUuid,

    /// Repository-relative path to the suite's source file.
    pub path: Utf8PathBuf,

    /// The final suite status.
    pub status: TestStatus,

    /// When the suite started.
    pub started_at: DateTime<FixedOffset>,

    /// When the suite finished.
    pub finished_at: DateTime<FixedOffset>,

    /// True if intelligent test skipping skipped this suite.
    pub skipped_by_itr: bool,

    /// True if the suite carried an unskippable override marker.
    pub unskippable: bool,

    /// True if the suite was in the skippable set but ran anyway due to an
    /// unskippable override.
    pub forced_to_run: bool,

    /// Correlation id tying skip decisions to backend bookkeeping, when the
    /// skippable set carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Per-test counters for the suite.
    pub counts: StatusCounts,
}

/// A finalized test case.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct TestRecord {
    /// The test id.
    pub id: TestUuid,

    /// Id of the owning suite.
    pub suite_id: SuiteUuid,

    /// Id of the owning module.
    pub module_id: ModuleUuid,

    /// Id of the owning session.
    pub session_id: SessionUuid,

    /// The test name, fully qualified within its suite.
    pub name: String,

    /// Repository-relative path of the owning suite.
    pub suite_path: Utf8PathBuf,

    /// The final test status.
    pub status: TestStatus,

    /// When the test started.
    pub started_at: DateTime<FixedOffset>,

    /// When the test finished.
    pub finished_at: DateTime<FixedOffset>,

    /// Error message, for failed tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// True if intelligent test skipping skipped this test.
    pub skipped_by_itr: bool,

    /// True if the owning suite carried an unskippable override marker.
    pub unskippable: bool,

    /// True if the test was in the skippable set but ran anyway due to an
    /// unskippable override.
    pub forced_to_run: bool,

    /// Correlation id tying skip decisions to backend bookkeeping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// True if the test is absent from the known-tests catalog. `None` when
    /// the catalog was unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,

    /// True if real-user-monitoring was active while the test ran.
    pub is_rum_active: bool,

    /// The first source line of the test, when the framework reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
}
