use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where identifier → domain resolution comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverSource {
    /// Remote resolver service answering `GET <base>/lookup?identifier=..`.
    Http { base_url: String },
    /// Local YAML file mapping identifiers to domains.
    DomainMap { path: PathBuf },
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub debug_mode: bool,
    pub resolver: ResolverSource,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub max_declaration_bytes: usize,
    pub batch_window_size: usize,
    /// Always within `1..=MAX_CONCURRENCY_LIMIT`.
    pub max_concurrency: usize,
    pub group_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub stream_buffer: usize,
    pub max_identifiers: usize,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    pub min_available_memory_mb: u64,
}

/// Upper bound applied to `APPADS_MAX_CONCURRENCY`.
pub const MAX_CONCURRENCY_LIMIT: usize = 10;

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolver = match &self.resolver {
            ResolverSource::Http { .. } => "http [redacted]".to_owned(),
            ResolverSource::DomainMap { path } => format!("domain map {}", path.display()),
        };
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("debug_mode", &self.debug_mode)
            .field("resolver", &resolver)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("max_declaration_bytes", &self.max_declaration_bytes)
            .field("batch_window_size", &self.batch_window_size)
            .field("max_concurrency", &self.max_concurrency)
            .field("group_delay_ms", &self.group_delay_ms)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("stream_buffer", &self.stream_buffer)
            .field("max_identifiers", &self.max_identifiers)
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("min_available_memory_mb", &self.min_available_memory_mb)
            .finish()
    }
}
