// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation of per-test coverage into per-suite file lists.
//!
//! Frameworks report covered files per test, as absolute paths, with plenty
//! of repetition. The aggregator normalizes them repository-root-relative,
//! folds them into one deduplicated set per suite, and produces a single
//! payload per suite at suite finish, keyed by `(session_id, suite_id)`.

use crate::{errors::HierarchyError, helpers::rel_path_from_root};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use testvis_metadata::{SessionUuid, SuiteCoverage, SuiteRecord, SuiteUuid};
use tracing::debug;

#[derive(Debug)]
struct SuiteEntry {
    suite_id: SuiteUuid,
    files: BTreeSet<Utf8PathBuf>,
}

/// Collects coverage evidence for one run.
#[derive(Debug)]
pub struct CoverageAggregator {
    root: Utf8PathBuf,
    session_id: SessionUuid,
    suites: DebugIgnore<IndexMap<Utf8PathBuf, SuiteEntry>>,
    empty_coverage_count: usize,
    per_test_file_counts: Vec<usize>,
}

impl CoverageAggregator {
    /// Creates an aggregator normalizing paths against `root`.
    pub fn new(root: impl Into<Utf8PathBuf>, session_id: SessionUuid) -> Self {
        Self {
            root: root.into(),
            session_id,
            suites: DebugIgnore(IndexMap::new()),
            empty_coverage_count: 0,
            per_test_file_counts: Vec::new(),
        }
    }

    /// Records the files covered by one test.
    ///
    /// `suite_path` must already be repository-relative (it is the suite
    /// identifier); `raw_files` may be absolute. The suite's own source file
    /// is always part of the set. Returns the number of distinct files this
    /// test contributed, after normalization.
    pub fn record_test_coverage(
        &mut self,
        suite_path: &Utf8Path,
        suite_id: SuiteUuid,
        raw_files: &[Utf8PathBuf],
    ) -> usize {
        let normalized: BTreeSet<Utf8PathBuf> = raw_files
            .iter()
            .map(|file| rel_path_from_root(&self.root, file))
            .collect();
        if normalized.is_empty() {
            self.empty_coverage_count += 1;
            debug!(suite = %suite_path, "test reported empty coverage");
        }
        self.per_test_file_counts.push(normalized.len());

        let entry = self
            .suites
            .entry(suite_path.to_path_buf())
            .or_insert_with(|| SuiteEntry {
                suite_id,
                files: BTreeSet::new(),
            });
        entry.files.insert(suite_path.to_path_buf());
        entry.files.extend(normalized);
        entry.files.len()
    }

    /// Produces the coverage payload for a finished suite.
    ///
    /// Returns `Ok(None)` if no coverage was recorded for the suite. The
    /// payload ids are checked against the finalized record: a mismatch means
    /// a hierarchy bug, reported as a hard error rather than exported.
    pub fn finish_suite(
        &mut self,
        suite: &SuiteRecord,
    ) -> Result<Option<SuiteCoverage>, HierarchyError> {
        let Some(entry) = self.suites.shift_remove(&suite.path) else {
            return Ok(None);
        };
        if entry.suite_id != suite.id || self.session_id != suite.session_id {
            return Err(HierarchyError::CoverageIdMismatch {
                suite_path: suite.path.clone(),
                payload_session_id: self.session_id,
                payload_suite_id: entry.suite_id,
                session_id: suite.session_id,
                suite_id: suite.id,
            });
        }
        Ok(Some(SuiteCoverage {
            session_id: self.session_id,
            suite_id: entry.suite_id,
            files: entry.files.into_iter().collect(),
        }))
    }

    /// How many tests reported no coverage at all.
    pub fn empty_coverage_count(&self) -> usize {
        self.empty_coverage_count
    }

    /// Distinct-file counts per recorded test, in record order.
    pub fn per_test_file_counts(&self) -> &[usize] {
        &self.per_test_file_counts
    }
}
