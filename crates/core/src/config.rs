use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_WORKFLOW: &str = "ci.yml";
pub const DEFAULT_POLL_MS: u64 = 15_000;
pub const DEFAULT_ERROR_GRACE_MS: u64 = 120_000;
pub const DEFAULT_NOT_FOUND_GRACE_MS: u64 = 90_000;

/// Optional file-based configuration. Every field has a default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubFileConfig,
    #[serde(default)]
    pub watch: WatchFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GitHubFileConfig {
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchFileConfig {
    pub workflow: Option<String>,
    pub poll_ms: Option<u64>,
    pub error_grace_ms: Option<u64>,
    pub notfound_grace_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Token for authenticated requests. Unauthenticated requests work but
    /// are subject to a much lower rate limit.
    pub token: Option<String>,
    pub api_url: String,
}

impl GitHubConfig {
    /// Read `GITHUB_TOKEN` (or `GH_TOKEN`) and `GITHUB_API_URL`, falling back
    /// to the file config for the API URL.
    pub fn from_lookup(file: &GitHubFileConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            token: get("GITHUB_TOKEN").or_else(|| get("GH_TOKEN")),
            api_url: get("GITHUB_API_URL")
                .or_else(|| file.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    pub fn from_env(file: &GitHubFileConfig) -> Self {
        Self::from_lookup(file, |key| std::env::var(key).ok())
    }
}

/// Timing parameters for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub poll_interval: Duration,
    /// How long consecutive generic failures are tolerated.
    pub error_grace: Duration,
    /// How long a run may stay missing before it is considered nonexistent.
    pub not_found_grace: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            error_grace: Duration::from_millis(DEFAULT_ERROR_GRACE_MS),
            not_found_grace: Duration::from_millis(DEFAULT_NOT_FOUND_GRACE_MS),
        }
    }
}

impl WatchConfig {
    /// Merge command line values over the file config over the defaults.
    pub fn resolve(
        file: &WatchFileConfig,
        poll_ms: Option<u64>,
        error_grace_ms: Option<u64>,
        notfound_grace_ms: Option<u64>,
    ) -> Self {
        let ms = |arg: Option<u64>, file: Option<u64>, default: u64| {
            Duration::from_millis(arg.or(file).unwrap_or(default))
        };
        Self {
            poll_interval: ms(poll_ms, file.poll_ms, DEFAULT_POLL_MS),
            error_grace: ms(error_grace_ms, file.error_grace_ms, DEFAULT_ERROR_GRACE_MS),
            not_found_grace: ms(
                notfound_grace_ms,
                file.notfound_grace_ms,
                DEFAULT_NOT_FOUND_GRACE_MS,
            ),
        }
    }
}
