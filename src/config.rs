//! Whitelock configuration.

use crate::coordinator::RetryPolicy;
use crate::WhitelockError;
use std::time::Duration;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default path of the whitelist document inside the repository.
pub const DEFAULT_DOCUMENT_PATH: &str = "whitelist.json";

/// Default branch holding the whitelist document.
pub const DEFAULT_BRANCH: &str = "main";

/// Location and credentials of the whitelist document in a GitHub repository.
#[derive(Clone)]
pub struct GitHubStoreConfig {
    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Path of the JSON document inside the repository.
    pub path: String,

    /// Branch the document is read from and committed to.
    pub branch: String,

    /// Bearer token with contents read/write permission.
    /// SECURITY: never logged, redacted from `Debug`.
    pub token: String,

    /// API base URL, overridable for GitHub Enterprise or tests.
    pub api_base: String,
}

impl std::fmt::Debug for GitHubStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStoreConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Configuration for a whitelist service backed by GitHub.
#[derive(Debug, Clone)]
pub struct WhitelockConfig {
    /// Application name, used in the User-Agent and commit messages.
    pub app_name: String,

    /// Where the whitelist document lives.
    pub store: GitHubStoreConfig,

    /// Retry behaviour on version conflicts.
    pub retry: RetryPolicy,

    /// Transport timeout for each store request.
    pub request_timeout: Duration,
}

impl WhitelockConfig {
    /// Build a configuration from `WHITELOCK_*` environment variables.
    ///
    /// `WHITELOCK_GITHUB_TOKEN`, `WHITELOCK_GITHUB_OWNER` and
    /// `WHITELOCK_GITHUB_REPO` are required; path, branch and API base fall
    /// back to their defaults.
    pub fn from_env() -> Result<Self, WhitelockError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, WhitelockError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| WhitelockError::ConfigError(format!("{} is not set", name)))
        };
        let optional = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Self {
            app_name: optional("WHITELOCK_APP_NAME", "whitelock"),
            store: GitHubStoreConfig {
                owner: required("WHITELOCK_GITHUB_OWNER")?,
                repo: required("WHITELOCK_GITHUB_REPO")?,
                path: optional("WHITELOCK_GITHUB_PATH", DEFAULT_DOCUMENT_PATH),
                branch: optional("WHITELOCK_GITHUB_BRANCH", DEFAULT_BRANCH),
                token: required("WHITELOCK_GITHUB_TOKEN")?,
                api_base: optional("WHITELOCK_GITHUB_API", DEFAULT_API_BASE),
            },
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), WhitelockError> {
        if self.app_name.is_empty() {
            return Err(WhitelockError::ConfigError(
                "app_name cannot be empty".to_string(),
            ));
        }
        if self.store.owner.is_empty() || self.store.repo.is_empty() {
            return Err(WhitelockError::ConfigError(
                "store owner and repo cannot be empty".to_string(),
            ));
        }
        if self.store.path.is_empty() || self.store.path.starts_with('/') {
            return Err(WhitelockError::ConfigError(format!(
                "store path must be a relative repository path, got {:?}",
                self.store.path
            )));
        }
        if self.store.token.is_empty() {
            return Err(WhitelockError::ConfigError(
                "store token cannot be empty".to_string(),
            ));
        }
        if !self.store.api_base.starts_with("http://") && !self.store.api_base.starts_with("https://")
        {
            return Err(WhitelockError::ConfigError(format!(
                "api_base must be an http(s) URL, got {}",
                self.store.api_base
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(WhitelockError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(WhitelockError::ConfigError(
                "request_timeout cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}
