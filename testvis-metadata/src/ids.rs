// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed identifiers for test-visibility entities.
//!
//! Each level of the session → module → suite → test hierarchy gets its own
//! UUID kind, so an id from one level cannot be passed where another level's
//! id is expected.

use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};

/// UUID kind for test sessions.
pub enum TestSessionKind {}

impl TypedUuidKind for TestSessionKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("test-session");
        TAG
    }
}

/// UUID kind for test modules.
pub enum TestModuleKind {}

impl TypedUuidKind for TestModuleKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("test-module");
        TAG
    }
}

/// UUID kind for test suites.
pub enum TestSuiteKind {}

impl TypedUuidKind for TestSuiteKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("test-suite");
        TAG
    }
}

/// UUID kind for individual test cases.
pub enum TestCaseKind {}

impl TypedUuidKind for TestCaseKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("test-case");
        TAG
    }
}

/// Unique identifier for a test session.
pub type SessionUuid = TypedUuid<TestSessionKind>;

/// Unique identifier for a test module.
pub type ModuleUuid = TypedUuid<TestModuleKind>;

/// Unique identifier for a test suite.
pub type SuiteUuid = TypedUuid<TestSuiteKind>;

/// Unique identifier for a test case.
pub type TestUuid = TypedUuid<TestCaseKind>;
