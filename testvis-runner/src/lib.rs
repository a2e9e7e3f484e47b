// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! CI test-visibility event pipeline and intelligent-test-runner decision
//! engine.
//!
//! A test run is modeled as a session → module → suite → test hierarchy.
//! Framework instrumentation (external to this crate) drives the
//! [`EventPipeline`](crate::pipeline::EventPipeline) through lifecycle hooks;
//! the pipeline decides per suite or per test whether execution can be
//! skipped based on a backend-provided skippable set, reconciles local
//! unskippable overrides, aggregates per-test coverage into per-suite file
//! lists, and hands finalized records to an exporter.
//!
//! Test-visibility is best-effort instrumentation: no failure inside this
//! crate ever fails or blocks the host test run. Backend fetches degrade to
//! "nothing skippable / nothing known" on error or timeout, and lifecycle
//! mistakes from the instrumentation layer are absorbed rather than
//! propagated.

pub mod client;
pub mod config;
pub mod coverage;
pub mod errors;
pub mod events;
mod helpers;
pub mod hierarchy;
pub mod itr;
pub mod known_tests;
pub mod pipeline;
mod stopwatch;
