// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the test-visibility pipeline.
//!
//! The error taxonomy mirrors how failures are handled: [`FetchError`]s
//! degrade to "collect less data", [`LifecycleViolation`]s are logged and
//! absorbed with a fallback entity, and [`HierarchyError`]s indicate an
//! internal bug and are surfaced loudly on the pipeline's internal-error
//! channel. None of them ever reach the host test run.

use camino::Utf8PathBuf;
use std::time::Duration;
use testvis_metadata::{SessionUuid, SuiteUuid};
use thiserror::Error;

/// An error that occurred while fetching the skippable set or the
/// known-tests catalog from the backend.
///
/// Always recoverable: the engine falls back to "nothing skippable / nothing
/// known" and the run proceeds.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// Authenticated mode was requested but no API key is available.
    #[error(
        "skippable suites were not fetched because the API key is not defined \
         (set {env_var} or use EVP proxy mode)"
    )]
    MissingApiKey {
        /// The environment variable that was consulted.
        env_var: &'static str,
    },

    /// The fetch did not complete within the configured deadline.
    #[error("backend request timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The transport layer reported an error.
    #[error("backend request failed")]
    Transport {
        /// The underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The response body did not match the expected wire shape.
    #[error("backend response could not be decoded")]
    MalformedResponse {
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// A framework callback arrived for an entity whose parent has already been
/// finalized, or referred to an entity the pipeline never saw.
///
/// Violations are recoverable: the pipeline synthesizes a fallback entity so
/// the event is not lost, logs the violation, and keeps going.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum LifecycleViolation {
    /// A suite start arrived after its module was finalized.
    #[error("suite `{path}` started after the module was finalized")]
    SuiteAfterModuleFinished {
        /// The suite path.
        path: Utf8PathBuf,
    },

    /// A suite start arrived for a suite that was already finalized.
    #[error("suite `{path}` restarted after it was finalized")]
    SuiteRestarted {
        /// The suite path.
        path: Utf8PathBuf,
    },

    /// A test start arrived after its suite was finalized.
    #[error("test `{name}` started after suite `{suite_path}` was finalized")]
    TestAfterSuiteFinished {
        /// The suite path.
        suite_path: Utf8PathBuf,
        /// The test name.
        name: String,
    },

    /// A test end arrived for a test that never started.
    #[error("test `{name}` in suite `{suite_path}` finished without a matching start")]
    TestEndWithoutStart {
        /// The suite path.
        suite_path: Utf8PathBuf,
        /// The test name.
        name: String,
    },

    /// A suite end arrived for a suite that never started.
    #[error("suite `{path}` finished without a matching start")]
    SuiteEndWithoutStart {
        /// The suite path.
        path: Utf8PathBuf,
    },

    /// A run-level event arrived after the session was finalized.
    #[error("`{event}` event arrived after the session was finalized")]
    EventAfterSessionFinished {
        /// The name of the offending event.
        event: &'static str,
    },
}

/// Internal consistency failure in the entity hierarchy.
///
/// Distinct from the degrade-and-continue policy for network failures: a
/// hierarchy error means this pipeline has a bug. It is fatal to the
/// subsystem (the affected payload is dropped and the error recorded for
/// diagnostics) but never to the host process.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum HierarchyError {
    /// A coverage payload's ids do not match the finalized entities it claims
    /// to belong to.
    #[error(
        "coverage payload for suite `{suite_path}` references session {payload_session_id} \
         and suite {payload_suite_id}, but the finalized entities are session \
         {session_id} and suite {suite_id}"
    )]
    CoverageIdMismatch {
        /// The suite path the payload was produced for.
        suite_path: Utf8PathBuf,
        /// Session id recorded on the payload.
        payload_session_id: SessionUuid,
        /// Suite id recorded on the payload.
        payload_suite_id: SuiteUuid,
        /// Session id on the finalized session.
        session_id: SessionUuid,
        /// Suite id on the finalized suite.
        suite_id: SuiteUuid,
    },
}
