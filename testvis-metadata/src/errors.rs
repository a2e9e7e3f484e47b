// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while parsing metadata values.

use thiserror::Error;

/// Error returned while parsing a [`TestStatus`](crate::TestStatus) value from
/// a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for test status: {input}\n(known values: {})",
    crate::TestStatus::variants().join(", "),
)]
pub struct TestStatusParseError {
    input: String,
}

impl TestStatusParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Error returned while parsing a [`TestLevel`](crate::TestLevel) value from a
/// string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for test level: {input}\n(known values: {})",
    crate::TestLevel::variants().join(", "),
)]
pub struct TestLevelParseError {
    input: String,
}

impl TestLevelParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}
