use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {host} (retry after {retry_after_secs}s)")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("app not found in store: {identifier}")]
    AppNotFound { identifier: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("response from {url} exceeds {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },

    #[error("invalid developer domain \"{domain}\": {reason}")]
    InvalidDomain { domain: String, reason: &'static str },

    #[error("failed to read domain map {path}: {source}")]
    DomainMapIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse domain map: {0}")]
    DomainMapParse(#[from] serde_yaml::Error),
}
