// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Serializable data model for the testvis CI test-visibility pipeline.
//!
//! This crate defines the types that cross process boundaries: finalized
//! entity records handed to an exporter, per-suite coverage payloads, and the
//! wire request/response shapes for the skippable-set and known-tests backend
//! endpoints. The decision logic that produces these values lives in
//! `testvis-runner`.

mod coverage;
mod errors;
mod ids;
mod records;
mod status;
mod wire;

pub use coverage::*;
pub use errors::*;
pub use ids::*;
pub use records::*;
pub use status::*;
pub use wire::*;
