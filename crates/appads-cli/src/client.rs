use std::time::Duration;

use appads_core::ExtractRequest;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

pub(crate) const STREAM_PATH: &str = "/api/v1/extract/stream";
pub(crate) const CSV_PATH: &str = "/api/v1/extract/csv";

/// Why an extraction could not start. Failures after the response began are
/// reported in-band by the stream itself.
#[derive(Debug, Error)]
pub(crate) enum RequestFailure {
    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server rejected the request ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Thin client for the extraction endpoints. No overall timeout: a run
/// lasts as long as the server keeps streaming.
pub(crate) struct ExtractClient {
    http: Client,
    base_url: String,
}

impl ExtractClient {
    pub(crate) fn new(base_url: &str) -> Result<Self, RequestFailure> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("appads-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| RequestFailure::Transport {
                url: base_url.to_owned(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Posts `body` to `path` and returns the response once its status
    /// is known to be 2xx.
    pub(crate) async fn open(
        &self,
        path: &str,
        body: &ExtractRequest,
    ) -> Result<reqwest::Response, RequestFailure> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| RequestFailure::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "extraction stream opened");
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => ("http_error".to_owned(), text.trim().to_owned()),
        };
        Err(RequestFailure::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
