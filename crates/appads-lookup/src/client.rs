use std::time::Duration;

use appads_core::AppConfig;
use reqwest::Client;

use crate::error::LookupError;

/// Connection and retry policy shared by the HTTP collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Additional attempts after the first failure for 429 and network errors.
    pub max_retries: u32,
    /// Base delay for exponential back-off: `backoff_base_ms * 2^(n-1)`.
    pub backoff_base_ms: u64,
    /// Upper bound on a declaration body.
    pub max_body_bytes: usize,
}

impl HttpSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
            max_body_bytes: config.max_declaration_bytes,
        }
    }

    /// Builds a `reqwest::Client` with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the client cannot be constructed
    /// (e.g. invalid TLS config).
    pub fn build_client(&self) -> Result<Client, LookupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.timeout_secs.min(10)))
            .user_agent(self.user_agent.as_str())
            .build()?;
        Ok(client)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "appads/0.1 (declaration-inspector)".to_owned(),
            max_retries: 2,
            backoff_base_ms: 500,
            max_body_bytes: 1_048_576,
        }
    }
}

/// Host component of `url`, for error context.
pub(crate) fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// `Retry-After` in seconds, defaulting to 60 when absent or not numeric.
pub(crate) fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(60)
}
