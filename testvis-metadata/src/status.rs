// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test statuses and their aggregation rules.

use crate::errors::{TestLevelParseError, TestStatusParseError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The status of a test, suite, module or session.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The entity passed.
    Pass,

    /// The entity failed.
    Fail,

    /// The entity was skipped, either by the framework or by intelligent test
    /// skipping.
    Skip,
}

impl TestStatus {
    /// Returns the string representation of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skip => "skip",
        }
    }

    /// String representations of all known variants.
    pub fn variants() -> [&'static str; 3] {
        ["pass", "fail", "skip"]
    }

    /// Maps a framework-native state string (`passed`, `failed`, `pending`,
    /// `skipped`) to a status.
    ///
    /// Returns `None` for states this pipeline does not understand.
    pub fn from_framework_state(state: &str) -> Option<Self> {
        match state {
            "passed" => Some(TestStatus::Pass),
            "failed" => Some(TestStatus::Fail),
            "pending" | "skipped" => Some(TestStatus::Skip),
            _ => None,
        }
    }

    /// Returns true if this status is `Fail`.
    pub fn is_fail(self) -> bool {
        matches!(self, TestStatus::Fail)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = TestStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(TestStatus::Pass),
            "fail" => Ok(TestStatus::Fail),
            "skip" => Ok(TestStatus::Skip),
            other => Err(TestStatusParseError::new(other)),
        }
    }
}

/// The granularity at which intelligent test skipping operates.
///
/// A single run operates at exactly one level; mixing levels is unsupported.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestLevel {
    /// Skip decisions are made per suite. The default.
    #[default]
    Suite,

    /// Skip decisions are made per individual test.
    Test,
}

impl TestLevel {
    /// Returns the string representation of this level.
    pub fn as_str(self) -> &'static str {
        match self {
            TestLevel::Suite => "suite",
            TestLevel::Test => "test",
        }
    }

    /// String representations of all known variants.
    pub fn variants() -> [&'static str; 2] {
        ["suite", "test"]
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestLevel {
    type Err = TestLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suite" => Ok(TestLevel::Suite),
            "test" => Ok(TestLevel::Test),
            other => Err(TestLevelParseError::new(other)),
        }
    }
}

/// Counters for the tests observed within one container (suite, module or
/// session).
///
/// Counters only ever increase, which makes the derived status monotonic: once
/// a failure has been counted the status can never revert to `Pass`.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct StatusCounts {
    /// The total number of tests observed.
    pub total: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,
}

impl StatusCounts {
    /// Records one finished test.
    pub fn record(&mut self, status: TestStatus) {
        self.total += 1;
        match status {
            TestStatus::Pass => self.passed += 1,
            TestStatus::Fail => self.failed += 1,
            TestStatus::Skip => self.skipped += 1,
        }
    }

    /// Merges another set of counters into this one. Commutative.
    pub fn merge(&mut self, other: StatusCounts) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// The status these counters reduce to.
    ///
    /// `fail` if any test failed; `skip` only if every observed test was
    /// skipped; `pass` otherwise (including the empty container). The
    /// reduction is a pure function of the counters, so re-evaluating it is
    /// always safe.
    pub fn status(&self) -> TestStatus {
        if self.failed > 0 {
            TestStatus::Fail
        } else if self.total > 0 && self.skipped == self.total {
            TestStatus::Skip
        } else {
            TestStatus::Pass
        }
    }
}

/// Reduces a set of child statuses to a container status.
///
/// Equivalent to feeding each status through [`StatusCounts`]; exposed for
/// callers that have statuses rather than counters in hand.
pub fn aggregate_statuses<I>(statuses: I) -> TestStatus
where
    I: IntoIterator<Item = TestStatus>,
{
    let mut counts = StatusCounts::default();
    for status in statuses {
        counts.record(status);
    }
    counts.status()
}
