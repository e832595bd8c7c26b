//! Developer domain normalization.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::LookupError;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z][a-z0-9-]{0,62}$")
        .expect("valid hostname regex")
});

/// Reduces a developer website value to the bare host that serves
/// `app-ads.txt`: scheme, credentials, port, path, query and a leading
/// `www.` are removed, and the result is lower-cased.
///
/// # Errors
///
/// Returns [`LookupError::InvalidDomain`] when nothing resembling a
/// hostname remains.
pub fn normalize_domain(raw: &str) -> Result<String, LookupError> {
    let invalid = |reason| LookupError::InvalidDomain {
        domain: raw.to_owned(),
        reason,
    };

    let mut host = raw.trim().to_ascii_lowercase();
    if let Some((_, rest)) = host.split_once("://") {
        host = rest.to_owned();
    }
    let host = host
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('@')
        .next()
        .unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default().trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    if !HOSTNAME.is_match(host) {
        return Err(invalid("not a hostname"));
    }
    Ok(host.to_owned())
}
