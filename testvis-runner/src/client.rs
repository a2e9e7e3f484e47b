// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The backend client seam and the once-per-run fetch policy.
//!
//! The HTTP transport itself lives outside this crate; implementations of
//! [`BackendClient`] wrap whatever transport the embedding layer uses. This
//! module owns the policy around the transport: both fetches happen exactly
//! once, before any suite starts, under a bounded timeout, and every failure
//! degrades to "collect less data" instead of blocking or failing the run.

use crate::{
    config::{CiConfig, ResolvedAuth},
    errors::FetchError,
    itr::SkippableSet,
    known_tests::KnownTestsCatalog,
};
use testvis_metadata::{KnownTestsResponse, SkippableResponse, TestParamsRequest};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Transport adapter for the two ITR backend endpoints.
///
/// Implementations perform the actual network round-trip. They should not
/// apply their own timeout; the pipeline wraps every call in the configured
/// fetch deadline.
pub trait BackendClient {
    /// Fetches the skippable set for this run.
    fn fetch_skippable(
        &self,
        request: &TestParamsRequest,
        auth: &ResolvedAuth,
    ) -> impl Future<Output = Result<SkippableResponse, FetchError>>;

    /// Fetches the known-tests catalog for this run.
    fn fetch_known_tests(
        &self,
        request: &TestParamsRequest,
        auth: &ResolvedAuth,
    ) -> impl Future<Output = Result<KnownTestsResponse, FetchError>>;
}

/// Fetches the skippable set, applying the bounded timeout and the
/// degrade-on-failure policy.
///
/// Returns `None` when skipping is unavailable for this run: disabled by the
/// backend, auth misconfigured, fetch failed, or fetch timed out. The caller
/// proceeds with nothing skippable.
pub async fn fetch_skippable_set<C: BackendClient>(
    client: &C,
    config: &CiConfig,
) -> Option<SkippableSet> {
    if !config.itr_skipping_enabled {
        debug!("intelligent test skipping disabled; skippable set not fetched");
        return None;
    }
    let auth = match config.auth.resolve() {
        Ok(auth) => auth,
        Err(error) => {
            warn!(%error, "skippable set not fetched; continuing without skipping");
            return None;
        }
    };
    let request = TestParamsRequest::new(config.to_test_params());
    match timeout(
        config.fetch_timeout,
        client.fetch_skippable(&request, &auth),
    )
    .await
    {
        Ok(Ok(response)) => {
            debug!(
                entries = response.data.len(),
                correlation_id = ?response.correlation_id(),
                "received skippable set"
            );
            Some(SkippableSet::from_response(response))
        }
        Ok(Err(error)) => {
            warn!(%error, "skippable-set fetch failed; continuing without skipping");
            None
        }
        Err(_) => {
            let error = FetchError::Timeout {
                timeout: config.fetch_timeout,
            };
            warn!(%error, "skippable-set fetch timed out; continuing without skipping");
            None
        }
    }
}

/// Fetches the known-tests catalog, applying the bounded timeout and the
/// degrade-on-failure policy.
///
/// On any failure the catalog is [`KnownTestsCatalog::Unavailable`] and every
/// test classifies as not-new.
pub async fn fetch_known_tests<C: BackendClient>(
    client: &C,
    config: &CiConfig,
) -> KnownTestsCatalog {
    if !config.early_flake_detection_enabled {
        debug!("early flake detection disabled; known tests not fetched");
        return KnownTestsCatalog::unavailable();
    }
    let auth = match config.auth.resolve() {
        Ok(auth) => auth,
        Err(error) => {
            warn!(%error, "known tests not fetched; early flake detection disabled");
            return KnownTestsCatalog::unavailable();
        }
    };
    let request = TestParamsRequest::new(config.to_test_params());
    match timeout(
        config.fetch_timeout,
        client.fetch_known_tests(&request, &auth),
    )
    .await
    {
        Ok(Ok(response)) => KnownTestsCatalog::from_response(response),
        Ok(Err(error)) => {
            warn!(%error, "known-tests fetch failed; early flake detection disabled");
            KnownTestsCatalog::unavailable()
        }
        Err(_) => {
            let error = FetchError::Timeout {
                timeout: config.fetch_timeout,
            };
            warn!(%error, "known-tests fetch timed out; early flake detection disabled");
            KnownTestsCatalog::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendAuth;
    use std::time::Duration;
    use testvis_metadata::TestLevel;

    struct FailingClient;

    impl BackendClient for FailingClient {
        async fn fetch_skippable(
            &self,
            _request: &TestParamsRequest,
            _auth: &ResolvedAuth,
        ) -> Result<SkippableResponse, FetchError> {
            Err(FetchError::Transport {
                source: "connection refused".into(),
            })
        }

        async fn fetch_known_tests(
            &self,
            _request: &TestParamsRequest,
            _auth: &ResolvedAuth,
        ) -> Result<KnownTestsResponse, FetchError> {
            Err(FetchError::Transport {
                source: "connection refused".into(),
            })
        }
    }

    struct HangingClient;

    impl BackendClient for HangingClient {
        async fn fetch_skippable(
            &self,
            _request: &TestParamsRequest,
            _auth: &ResolvedAuth,
        ) -> Result<SkippableResponse, FetchError> {
            futures::future::pending().await
        }

        async fn fetch_known_tests(
            &self,
            _request: &TestParamsRequest,
            _auth: &ResolvedAuth,
        ) -> Result<KnownTestsResponse, FetchError> {
            futures::future::pending().await
        }
    }

    fn config(itr: bool, efd: bool) -> CiConfig {
        let mut builder = CiConfig::builder("svc", "cypress");
        builder
            .set_auth(BackendAuth::ApiKey("key".to_owned()))
            .set_test_level(TestLevel::Suite)
            .set_itr_skipping_enabled(itr)
            .set_early_flake_detection_enabled(efd)
            .set_fetch_timeout(Duration::from_millis(50));
        builder.build()
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_none() {
        assert!(
            fetch_skippable_set(&FailingClient, &config(true, true))
                .await
                .is_none()
        );
        assert!(
            !fetch_known_tests(&FailingClient, &config(true, true))
                .await
                .is_available()
        );
    }

    #[tokio::test]
    async fn disabled_features_skip_the_fetch_entirely() {
        // A hanging client proves the fetch is never issued.
        assert!(
            fetch_skippable_set(&HangingClient, &config(false, false))
                .await
                .is_none()
        );
        assert!(
            !fetch_known_tests(&HangingClient, &config(false, false))
                .await
                .is_available()
        );
    }

    #[tokio::test]
    async fn fetch_timeout_degrades_to_none() {
        assert!(
            fetch_skippable_set(&HangingClient, &config(true, true))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn missing_api_key_degrades_to_none() {
        let mut config = config(true, true);
        config.auth = BackendAuth::ApiKeyFromEnv;
        unsafe {
            std::env::remove_var(crate::config::API_KEY_ENV);
        }
        assert!(
            fetch_skippable_set(&FailingClient, &config).await.is_none()
        );
    }
}
