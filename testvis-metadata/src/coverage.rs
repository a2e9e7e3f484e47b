// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-suite code-coverage payloads.

use crate::{SessionUuid, SuiteUuid};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// The aggregated coverage evidence for one suite.
///
/// Produced when the suite finishes. `files` is deduplicated and sorted: a
/// file touched by several tests in the suite appears exactly once. The ids
/// must match the ids on the corresponding finalized suite and session
/// records; the aggregator verifies this before handing the payload off.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SuiteCoverage {
    /// Id of the session the suite ran in.
    pub session_id: SessionUuid,

    /// Id of the suite the files were covered by.
    pub suite_id: SuiteUuid,

    /// Repository-relative covered file paths, sorted and deduplicated.
    pub files: Vec<Utf8PathBuf>,
}
