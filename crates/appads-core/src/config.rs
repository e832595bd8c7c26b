use crate::app_config::{AppConfig, Environment, ResolverSource, MAX_CONCURRENCY_LIMIT};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = parse_usize(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("APPADS_ENV", "development"))?;
    let bind_addr = parse_addr("APPADS_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("APPADS_LOG_LEVEL", "info");
    let debug_mode = parse_bool("APPADS_DEBUG_MODE", &or_default("APPADS_DEBUG_MODE", "false"))?;

    let resolver_url = lookup("APPADS_RESOLVER_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let domain_map_path = lookup("APPADS_DOMAIN_MAP_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let resolver = match (resolver_url, domain_map_path) {
        (Some(base_url), _) => ResolverSource::Http {
            base_url: base_url.trim_end_matches('/').to_string(),
        },
        (None, Some(path)) => ResolverSource::DomainMap {
            path: PathBuf::from(path),
        },
        (None, None) => {
            return Err(ConfigError::MissingEnvVar(
                "APPADS_RESOLVER_URL or APPADS_DOMAIN_MAP_PATH".to_string(),
            ))
        }
    };

    let request_timeout_secs = parse_u64("APPADS_REQUEST_TIMEOUT_SECS", "15")?;
    let user_agent = or_default("APPADS_USER_AGENT", "appads/0.1 (declaration-inspector)");
    let max_retries = parse_u32("APPADS_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("APPADS_RETRY_BACKOFF_BASE_MS", "500")?;
    let max_declaration_bytes = parse_positive("APPADS_MAX_DECLARATION_BYTES", "1048576")?;

    let batch_window_size = parse_positive("APPADS_BATCH_WINDOW_SIZE", "50")?;
    let max_concurrency = parse_usize("APPADS_MAX_CONCURRENCY", "5")?.clamp(1, MAX_CONCURRENCY_LIMIT);
    let group_delay_ms = parse_u64("APPADS_GROUP_DELAY_MS", "100")?;
    let heartbeat_interval_ms = parse_u64("APPADS_HEARTBEAT_INTERVAL_MS", "5000")?;
    if heartbeat_interval_ms == 0 {
        return Err(invalid(
            "APPADS_HEARTBEAT_INTERVAL_MS",
            "must be greater than zero".to_string(),
        ));
    }
    let stream_buffer = parse_positive("APPADS_STREAM_BUFFER", "16")?;
    let max_identifiers = parse_positive("APPADS_MAX_IDENTIFIERS", "1000")?;

    let rate_limit_max_requests = parse_positive("APPADS_RATE_LIMIT_MAX_REQUESTS", "20")?;
    let rate_limit_window_secs = parse_u64("APPADS_RATE_LIMIT_WINDOW_SECS", "60")?;
    let min_available_memory_mb = parse_u64("APPADS_MIN_AVAILABLE_MEMORY_MB", "256")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        debug_mode,
        resolver,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        max_declaration_bytes,
        batch_window_size,
        max_concurrency,
        group_delay_ms,
        heartbeat_interval_ms,
        stream_buffer,
        max_identifiers,
        rate_limit_max_requests,
        rate_limit_window_secs,
        min_available_memory_mb,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "APPADS_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
