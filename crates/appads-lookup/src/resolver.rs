//! Store resolution: identifier → developer domain.

use std::collections::HashMap;
use std::path::Path;

use appads_core::{Identifier, StoreType};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{host_of, retry_after_secs, HttpSettings};
use crate::domain::normalize_domain;
use crate::error::LookupError;
use crate::retry::retry_with_backoff;

/// What a store lookup yields for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedApp {
    pub domain: String,
    #[serde(default = "unknown_store")]
    pub store_type: StoreType,
}

fn unknown_store() -> StoreType {
    StoreType::Unknown
}

#[async_trait]
pub trait StoreResolver: Send + Sync {
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedApp, LookupError>;
}

/// Resolves identifiers through `GET <base>/lookup?identifier=<id>`.
///
/// The service answers `{"domain": "...", "storeType": "..."}`; 404 means the
/// identifier is unknown to every store.
pub struct HttpStoreResolver {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpStoreResolver {
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, LookupError> {
        Ok(Self {
            client: settings.build_client()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
        })
    }

    async fn resolve_once(&self, identifier: &Identifier) -> Result<ResolvedApp, LookupError> {
        let url = format!("{}/lookup", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("identifier", identifier.as_str())])
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::RateLimited {
                host: host_of(&url),
                retry_after_secs: retry_after_secs(&response),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::AppNotFound {
                identifier: identifier.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LookupError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let app: ResolvedApp =
            serde_json::from_str(&body).map_err(|source| LookupError::Deserialize {
                context: format!("store lookup for {identifier}"),
                source,
            })?;
        Ok(app)
    }
}

#[async_trait]
impl StoreResolver for HttpStoreResolver {
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedApp, LookupError> {
        let app = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.resolve_once(identifier)
        })
        .await?;
        Ok(ResolvedApp {
            domain: normalize_domain(&app.domain)?,
            store_type: app.store_type,
        })
    }
}

/// File shape read by [`StaticStoreResolver::from_path`].
///
/// ```yaml
/// apps:
///   com.example.game:
///     domain: example.com
///     storeType: googleplay
/// ```
#[derive(Debug, Deserialize)]
struct DomainMapFile {
    apps: HashMap<String, ResolvedApp>,
}

/// Resolves identifiers from a fixed map, typically loaded from YAML.
#[derive(Debug, Clone, Default)]
pub struct StaticStoreResolver {
    apps: HashMap<String, ResolvedApp>,
}

impl StaticStoreResolver {
    #[must_use]
    pub fn new(apps: HashMap<String, ResolvedApp>) -> Self {
        Self { apps }
    }

    /// Load the identifier map from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::DomainMapIo`] if the file cannot be read,
    /// [`LookupError::DomainMapParse`] if it is not a valid map, and
    /// [`LookupError::InvalidDomain`] for an entry whose domain does not
    /// normalize.
    pub fn from_path(path: &Path) -> Result<Self, LookupError> {
        let content = std::fs::read_to_string(path).map_err(|e| LookupError::DomainMapIo {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// # Errors
    ///
    /// See [`StaticStoreResolver::from_path`].
    pub fn from_yaml(content: &str) -> Result<Self, LookupError> {
        let file: DomainMapFile = serde_yaml::from_str(content)?;
        let mut apps = HashMap::with_capacity(file.apps.len());
        for (identifier, app) in file.apps {
            let domain = normalize_domain(&app.domain)?;
            apps.insert(
                identifier.trim().to_owned(),
                ResolvedApp {
                    domain,
                    store_type: app.store_type,
                },
            );
        }
        tracing::info!(apps = apps.len(), "loaded static domain map");
        Ok(Self { apps })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

#[async_trait]
impl StoreResolver for StaticStoreResolver {
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedApp, LookupError> {
        self.apps
            .get(identifier.as_str())
            .cloned()
            .ok_or_else(|| LookupError::AppNotFound {
                identifier: identifier.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "
apps:
  com.example.game:
    domain: https://www.Example.com/
    storeType: googleplay
  '284882215':
    domain: studio.io
    storeType: appstore
  B00EXAMPLE:
    domain: tv.example.net
";

    #[tokio::test]
    async fn static_resolver_normalizes_domains() {
        let resolver = StaticStoreResolver::from_yaml(MAP).unwrap();
        assert_eq!(resolver.len(), 3);

        let app = resolver
            .resolve(&Identifier::parse("com.example.game").unwrap())
            .await
            .unwrap();
        assert_eq!(app.domain, "example.com");
        assert_eq!(app.store_type, StoreType::GooglePlay);

        let app = resolver
            .resolve(&Identifier::parse("B00EXAMPLE").unwrap())
            .await
            .unwrap();
        assert_eq!(app.store_type, StoreType::Unknown);
    }

    #[tokio::test]
    async fn static_resolver_reports_unknown_identifiers() {
        let resolver = StaticStoreResolver::from_yaml(MAP).unwrap();
        let err = resolver
            .resolve(&Identifier::parse("com.unknown.app").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::AppNotFound { ref identifier } if identifier == "com.unknown.app"));
    }

    #[test]
    fn invalid_map_is_rejected() {
        assert!(matches!(
            StaticStoreResolver::from_yaml("apps: [1, 2]"),
            Err(LookupError::DomainMapParse(_))
        ));
        assert!(matches!(
            StaticStoreResolver::from_yaml("apps:\n  com.a.b:\n    domain: localhost\n"),
            Err(LookupError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = StaticStoreResolver::from_path(Path::new("/nonexistent/domains.yaml")).unwrap_err();
        assert!(matches!(err, LookupError::DomainMapIo { .. }));
    }
}
