// Copyright (c) The testvis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration for the test-visibility pipeline.
//!
//! A [`CiConfig`] is assembled by the embedding layer (the instrumentation
//! glue that owns process arguments and environment discovery) and handed to
//! the pipeline once per run. The pipeline itself never reads configuration
//! files; that concern stays outside this crate.

use crate::errors::FetchError;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use std::time::Duration;
use testvis_metadata::{
    EnvironmentMetadata, TestLevel, TestParamsAttributes, WireConfigurations,
};

/// Environment variable consulted for the backend API key in authenticated
/// mode.
pub const API_KEY_ENV: &str = "TESTVIS_API_KEY";

/// The default deadline for the skippable-set and known-tests fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// How requests to the backend are authenticated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackendAuth {
    /// Authenticated mode with an explicit API key.
    ApiKey(String),

    /// Authenticated mode; the key is resolved from [`API_KEY_ENV`] at fetch
    /// time.
    ApiKeyFromEnv,

    /// Requests are routed through an EVP proxy intermediary which attaches
    /// credentials itself; no local key is required.
    EvpProxy,
}

impl BackendAuth {
    /// Resolves the auth mode, reading the environment if necessary.
    ///
    /// A missing key in authenticated mode is a configuration error surfaced
    /// at fetch time; the run then proceeds without skip or known-tests data.
    pub fn resolve(&self) -> Result<ResolvedAuth, FetchError> {
        match self {
            BackendAuth::ApiKey(key) => Ok(ResolvedAuth::ApiKey(key.clone())),
            BackendAuth::ApiKeyFromEnv => match std::env::var(API_KEY_ENV) {
                Ok(key) if !key.is_empty() => Ok(ResolvedAuth::ApiKey(key)),
                _ => Err(FetchError::MissingApiKey {
                    env_var: API_KEY_ENV,
                }),
            },
            BackendAuth::EvpProxy => Ok(ResolvedAuth::EvpProxy),
        }
    }
}

/// A resolved authentication decision, ready for the transport layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolvedAuth {
    /// Send the key in the request headers.
    ApiKey(String),

    /// Use the EVP proxy path prefix and subdomain header.
    EvpProxy,
}

/// Host and runtime dimensions the backend keys its skip decisions on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostConfigurations {
    /// Operating system platform, e.g. `linux`.
    pub os_platform: String,

    /// Operating system version.
    pub os_version: String,

    /// Machine architecture.
    pub os_architecture: String,

    /// Runtime name.
    pub runtime_name: String,

    /// Runtime version.
    pub runtime_version: String,

    /// Custom user-supplied dimensions.
    pub custom: IndexMap<String, String>,
}

impl HostConfigurations {
    fn to_wire(&self) -> WireConfigurations {
        WireConfigurations {
            os_platform: self.os_platform.clone(),
            os_version: self.os_version.clone(),
            os_architecture: self.os_architecture.clone(),
            runtime_name: self.runtime_name.clone(),
            runtime_version: self.runtime_version.clone(),
            custom: self.custom.clone(),
        }
    }
}

/// Configuration for one test-visibility run.
#[derive(Clone, Debug)]
pub struct CiConfig {
    /// Service name reported to the backend.
    pub service: String,

    /// Deployment environment, e.g. `ci`.
    pub env: String,

    /// Test framework name, e.g. `cypress`.
    pub framework: String,

    /// Repository URL from git metadata.
    pub repository_url: String,

    /// Commit SHA the run executes against.
    pub sha: String,

    /// Branch name, if known.
    pub branch: Option<String>,

    /// CI provider name, if the run happens on a recognized provider.
    pub ci_provider: Option<String>,

    /// Repository root; coverage and suite paths are normalized relative to
    /// this.
    pub repository_root: Utf8PathBuf,

    /// Host and runtime dimensions.
    pub host: HostConfigurations,

    /// Granularity of skip decisions for this run.
    pub test_level: TestLevel,

    /// Whether the backend enabled intelligent test skipping for this run.
    pub itr_skipping_enabled: bool,

    /// Whether per-test code coverage collection is enabled.
    pub code_coverage_enabled: bool,

    /// Whether the known-tests catalog should be fetched for early-flake
    /// detection.
    pub early_flake_detection_enabled: bool,

    /// How requests to the backend are authenticated.
    pub auth: BackendAuth,

    /// Deadline for each backend fetch.
    pub fetch_timeout: Duration,
}

impl CiConfig {
    /// Starts building a config for the given service and framework.
    pub fn builder(service: impl Into<String>, framework: impl Into<String>) -> CiConfigBuilder {
        CiConfigBuilder::new(service, framework)
    }

    /// The `test_params` attributes for backend requests issued by this run.
    pub fn to_test_params(&self) -> TestParamsAttributes {
        TestParamsAttributes {
            test_level: self.test_level,
            configurations: self.host.to_wire(),
            service: self.service.clone(),
            env: self.env.clone(),
            repository_url: self.repository_url.clone(),
            sha: self.sha.clone(),
        }
    }

    /// The environment metadata stamped on the session record.
    pub fn environment_metadata(&self) -> EnvironmentMetadata {
        EnvironmentMetadata {
            os_platform: self.host.os_platform.clone(),
            os_version: self.host.os_version.clone(),
            os_architecture: self.host.os_architecture.clone(),
            runtime_name: self.host.runtime_name.clone(),
            runtime_version: self.host.runtime_version.clone(),
            repository_url: self.repository_url.clone(),
            sha: self.sha.clone(),
            branch: self.branch.clone(),
            ci_provider: self.ci_provider.clone(),
        }
    }
}

/// Builder for [`CiConfig`].
#[derive(Clone, Debug)]
pub struct CiConfigBuilder {
    config: CiConfig,
}

impl CiConfigBuilder {
    fn new(service: impl Into<String>, framework: impl Into<String>) -> Self {
        Self {
            config: CiConfig {
                service: service.into(),
                env: "ci".to_owned(),
                framework: framework.into(),
                repository_url: String::new(),
                sha: String::new(),
                branch: None,
                ci_provider: None,
                repository_root: Utf8PathBuf::new(),
                host: HostConfigurations::default(),
                test_level: TestLevel::default(),
                itr_skipping_enabled: false,
                code_coverage_enabled: false,
                early_flake_detection_enabled: false,
                auth: BackendAuth::ApiKeyFromEnv,
                fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            },
        }
    }

    /// Sets the deployment environment.
    pub fn set_env(&mut self, env: impl Into<String>) -> &mut Self {
        self.config.env = env.into();
        self
    }

    /// Sets the git metadata for the run.
    pub fn set_git(
        &mut self,
        repository_url: impl Into<String>,
        sha: impl Into<String>,
        branch: Option<String>,
    ) -> &mut Self {
        self.config.repository_url = repository_url.into();
        self.config.sha = sha.into();
        self.config.branch = branch;
        self
    }

    /// Sets the CI provider name.
    pub fn set_ci_provider(&mut self, provider: impl Into<String>) -> &mut Self {
        self.config.ci_provider = Some(provider.into());
        self
    }

    /// Sets the repository root paths are normalized against.
    pub fn set_repository_root(&mut self, root: impl Into<Utf8PathBuf>) -> &mut Self {
        self.config.repository_root = root.into();
        self
    }

    /// Sets the host and runtime dimensions.
    pub fn set_host(&mut self, host: HostConfigurations) -> &mut Self {
        self.config.host = host;
        self
    }

    /// Sets the skip-decision granularity.
    pub fn set_test_level(&mut self, test_level: TestLevel) -> &mut Self {
        self.config.test_level = test_level;
        self
    }

    /// Enables or disables intelligent test skipping.
    pub fn set_itr_skipping_enabled(&mut self, enabled: bool) -> &mut Self {
        self.config.itr_skipping_enabled = enabled;
        self
    }

    /// Enables or disables code-coverage collection.
    pub fn set_code_coverage_enabled(&mut self, enabled: bool) -> &mut Self {
        self.config.code_coverage_enabled = enabled;
        self
    }

    /// Enables or disables the known-tests fetch.
    pub fn set_early_flake_detection_enabled(&mut self, enabled: bool) -> &mut Self {
        self.config.early_flake_detection_enabled = enabled;
        self
    }

    /// Sets the backend authentication mode.
    pub fn set_auth(&mut self, auth: BackendAuth) -> &mut Self {
        self.config.auth = auth;
        self
    }

    /// Sets the deadline for each backend fetch.
    pub fn set_fetch_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Finalizes the configuration.
    pub fn build(&self) -> CiConfig {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_api_key_resolves() {
        let auth = BackendAuth::ApiKey("secret".to_owned());
        assert_eq!(
            auth.resolve().expect("explicit key always resolves"),
            ResolvedAuth::ApiKey("secret".to_owned())
        );
    }

    #[test]
    fn evp_proxy_needs_no_key() {
        assert_eq!(
            BackendAuth::EvpProxy.resolve().expect("no key required"),
            ResolvedAuth::EvpProxy
        );
    }

    #[test]
    fn builder_defaults() {
        let config = CiConfig::builder("my-service", "cypress").build();
        assert_eq!(config.env, "ci");
        assert_eq!(config.test_level, TestLevel::Suite);
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
        assert!(!config.itr_skipping_enabled);
    }

    #[test]
    fn test_params_mirror_config() {
        let mut builder = CiConfig::builder("my-service", "cypress");
        builder
            .set_git("https://example.com/repo.git", "abc123", None)
            .set_test_level(TestLevel::Test);
        let params = builder.build().to_test_params();
        assert_eq!(params.test_level, TestLevel::Test);
        assert_eq!(params.service, "my-service");
        assert_eq!(params.sha, "abc123");
    }
}
