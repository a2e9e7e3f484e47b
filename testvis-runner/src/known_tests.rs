// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Known-tests catalog and early-flake classification.
//!
//! The backend provides the set of tests it has seen on previous runs. A test
//! absent from that catalog is "new" and gets extra scrutiny (e.g. retries)
//! from the instrumentation layer. When the catalog could not be fetched,
//! classification degrades to "not new" for every test rather than
//! mis-flagging the whole run as new.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{HashMap, HashSet};
use testvis_metadata::KnownTestsResponse;
use tracing::debug;

/// The known-tests catalog for one run.
#[derive(Clone, Debug)]
pub enum KnownTestsCatalog {
    /// The fetch failed, timed out, or was disabled. Every test classifies as
    /// not-new.
    Unavailable,

    /// Suite path → names of the tests the backend already knows.
    Catalog(HashMap<Utf8PathBuf, HashSet<String>>),
}

impl KnownTestsCatalog {
    /// Groups a backend response into the per-suite catalog.
    pub fn from_response(response: KnownTestsResponse) -> Self {
        let mut catalog: HashMap<Utf8PathBuf, HashSet<String>> = HashMap::new();
        for item in response.data {
            catalog
                .entry(item.attributes.suite)
                .or_default()
                .insert(item.attributes.name);
        }
        debug!(suites = catalog.len(), "received known-tests catalog");
        Self::Catalog(catalog)
    }

    /// The degraded catalog used when the fetch failed or was skipped.
    pub fn unavailable() -> Self {
        Self::Unavailable
    }

    /// Returns true if a real catalog is loaded.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Catalog(_))
    }

    /// Classifies a test.
    ///
    /// `Some(true)` if the suite is in the catalog without this name, or the
    /// suite is absent entirely; `Some(false)` if the test is known; `None`
    /// when the catalog is unavailable (the caller must not treat the test as
    /// either new or known).
    pub fn classify(&self, suite: &Utf8Path, name: &str) -> Option<bool> {
        match self {
            Self::Unavailable => None,
            Self::Catalog(catalog) => match catalog.get(suite) {
                Some(names) => Some(!names.contains(name)),
                None => Some(true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testvis_metadata::{KnownTestAttributes, KnownTestItem};

    fn catalog() -> KnownTestsCatalog {
        KnownTestsCatalog::from_response(KnownTestsResponse {
            data: vec![KnownTestItem {
                attributes: KnownTestAttributes {
                    name: "Say greetings".to_owned(),
                    suite: "greetings.feature".into(),
                },
            }],
        })
    }

    #[test]
    fn known_test_is_not_new() {
        assert_eq!(
            catalog().classify("greetings.feature".into(), "Say greetings"),
            Some(false)
        );
    }

    #[test]
    fn unknown_name_in_known_suite_is_new() {
        assert_eq!(
            catalog().classify("greetings.feature".into(), "Say new"),
            Some(true)
        );
    }

    #[test]
    fn unknown_suite_is_new() {
        assert_eq!(
            catalog().classify("unknown.feature".into(), "Say anything"),
            Some(true)
        );
    }

    #[test]
    fn unavailable_catalog_classifies_nothing() {
        assert_eq!(
            KnownTestsCatalog::unavailable().classify("greetings.feature".into(), "Say greetings"),
            None
        );
    }
}
