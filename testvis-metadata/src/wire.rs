// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes for the skippable-set and known-tests backend endpoints.
//!
//! Both endpoints share the `test_params` request envelope. The transport
//! that carries these bodies is out of scope; these types only pin down the
//! JSON the backend expects and produces.

use crate::TestLevel;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The `test_params` request envelope sent to both ITR endpoints.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct TestParamsRequest {
    /// The single request object.
    pub data: TestParamsData,
}

impl TestParamsRequest {
    /// Wraps attributes in the `test_params` envelope.
    pub fn new(attributes: TestParamsAttributes) -> Self {
        Self {
            data: TestParamsData {
                kind: "test_params".to_owned(),
                attributes,
            },
        }
    }
}

/// Inner request object carrying the type marker.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct TestParamsData {
    /// Always `test_params`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The request attributes.
    pub attributes: TestParamsAttributes,
}

/// Attributes identifying the run the backend should answer for.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct TestParamsAttributes {
    /// Whether skip decisions are requested per suite or per test.
    pub test_level: TestLevel,

    /// Host and runtime configuration the backend keys its answers on.
    pub configurations: WireConfigurations,

    /// Service name.
    pub service: String,

    /// Deployment environment, e.g. `ci`.
    pub env: String,

    /// Repository URL.
    pub repository_url: String,

    /// Commit SHA the run executes against.
    pub sha: String,
}

/// The `configurations` block of a `test_params` request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct WireConfigurations {
    /// Operating system platform.
    #[serde(rename = "os.platform")]
    pub os_platform: String,

    /// Operating system version.
    #[serde(rename = "os.version")]
    pub os_version: String,

    /// Machine architecture.
    #[serde(rename = "os.architecture")]
    pub os_architecture: String,

    /// Runtime name.
    #[serde(rename = "runtime.name")]
    pub runtime_name: String,

    /// Runtime version.
    #[serde(rename = "runtime.version")]
    pub runtime_version: String,

    /// Custom user-supplied dimensions.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub custom: IndexMap<String, String>,
}

/// Response to a skippable-set request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct SkippableResponse {
    /// One entry per skippable suite or test.
    pub data: Vec<SkippableItem>,

    /// Response metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SkippableMeta>,
}

impl SkippableResponse {
    /// The correlation id attached to the response, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.correlation_id.as_deref())
    }
}

/// One skippable suite or test.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SkippableItem {
    /// Granularity of this entry.
    #[serde(rename = "type")]
    pub kind: TestLevel,

    /// The identifying attributes.
    pub attributes: SkippableAttributes,
}

/// Attributes identifying a skippable suite or test.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SkippableAttributes {
    /// Repository-relative suite path.
    pub suite: Utf8PathBuf,

    /// Test name; present only for test-level entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Metadata on a skippable-set response.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct SkippableMeta {
    /// Server-issued token tying this run's skip decisions to backend-side
    /// bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Response to a known-tests request.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct KnownTestsResponse {
    /// One entry per known test.
    pub data: Vec<KnownTestItem>,
}

/// One known test.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct KnownTestItem {
    /// The identifying attributes.
    pub attributes: KnownTestAttributes,
}

/// Attributes identifying a known test.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct KnownTestAttributes {
    /// The test name.
    pub name: String,

    /// Repository-relative suite path the test lives in.
    pub suite: Utf8PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_envelope_shape() {
        let request = TestParamsRequest::new(TestParamsAttributes {
            test_level: TestLevel::Suite,
            configurations: WireConfigurations {
                os_platform: "linux".to_owned(),
                os_version: "6.1".to_owned(),
                os_architecture: "x86_64".to_owned(),
                runtime_name: "rust".to_owned(),
                runtime_version: "1.91.0".to_owned(),
                custom: IndexMap::new(),
            },
            service: "my-service".to_owned(),
            env: "ci".to_owned(),
            repository_url: "https://example.com/repo.git".to_owned(),
            sha: "abc123".to_owned(),
        });

        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(value["data"]["type"], "test_params");
        assert_eq!(value["data"]["attributes"]["test_level"], "suite");
        assert_eq!(
            value["data"]["attributes"]["configurations"]["os.platform"],
            "linux"
        );
        // An empty custom block is omitted entirely.
        assert!(
            value["data"]["attributes"]["configurations"]
                .get("custom")
                .is_none()
        );
    }

    #[test]
    fn skippable_response_parses() {
        let body = indoc! {r#"
            {
              "data": [
                {
                  "type": "suite",
                  "attributes": { "suite": "farewell.feature" }
                },
                {
                  "type": "test",
                  "attributes": { "suite": "greetings.feature", "name": "Say greetings" }
                }
              ],
              "meta": { "correlation_id": "correlation-id-123" }
            }
        "#};

        let response: SkippableResponse = serde_json::from_str(body).expect("valid body");
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].kind, TestLevel::Suite);
        assert_eq!(response.data[0].attributes.suite, "farewell.feature");
        assert_eq!(response.data[0].attributes.name, None);
        assert_eq!(
            response.data[1].attributes.name.as_deref(),
            Some("Say greetings")
        );
        assert_eq!(response.correlation_id(), Some("correlation-id-123"));
    }

    #[test]
    fn skippable_response_without_meta() {
        let response: SkippableResponse =
            serde_json::from_str(r#"{"data": []}"#).expect("valid body");
        assert_eq!(response.correlation_id(), None);
    }

    #[test]
    fn known_tests_response_parses() {
        let body = indoc! {r#"
            {
              "data": [
                { "attributes": { "name": "Say greetings", "suite": "greetings.feature" } },
                { "attributes": { "name": "Say farewell", "suite": "farewell.feature" } }
              ]
            }
        "#};

        let response: KnownTestsResponse = serde_json::from_str(body).expect("valid body");
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[1].attributes.suite, "farewell.feature");
    }
}
