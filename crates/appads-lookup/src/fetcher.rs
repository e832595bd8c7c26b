//! Declaration retrieval: developer domain → `app-ads.txt` text.

use appads_core::{Declaration, DeclarationStatus};
use async_trait::async_trait;
use reqwest::Client;

use crate::client::{host_of, retry_after_secs, HttpSettings};
use crate::error::LookupError;
use crate::retry::retry_with_backoff;

/// Candidate locations, tried in order. `{domain}` is substituted.
pub const DEFAULT_URL_TEMPLATES: [&str; 2] = [
    "https://{domain}/app-ads.txt",
    "http://{domain}/app-ads.txt",
];

/// Result of a declaration fetch. `text` is `None` when the domain serves
/// no declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDeclaration {
    pub url: String,
    pub text: Option<String>,
}

impl From<FetchedDeclaration> for Declaration {
    fn from(fetched: FetchedDeclaration) -> Self {
        let status = match fetched.text {
            Some(text) => DeclarationStatus::Found { text },
            None => DeclarationStatus::NotFound,
        };
        Declaration {
            url: Some(fetched.url),
            status,
        }
    }
}

#[async_trait]
pub trait DeclarationFetcher: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<FetchedDeclaration, LookupError>;
}

/// Fetches `app-ads.txt` over HTTPS, falling back to plain HTTP.
///
/// 404 and 410 mean "no declaration", as does an HTML page served with 200
/// (a soft 404). 429 and network failures are retried with back-off.
/// Bodies larger than the configured cap are rejected.
pub struct HttpDeclarationFetcher {
    client: Client,
    url_templates: Vec<String>,
    max_retries: u32,
    backoff_base_ms: u64,
    max_body_bytes: usize,
}

impl HttpDeclarationFetcher {
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, LookupError> {
        Ok(Self {
            client: settings.build_client()?,
            url_templates: DEFAULT_URL_TEMPLATES.iter().map(|t| (*t).to_owned()).collect(),
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    /// Replaces the candidate URL templates (each must contain `{domain}`).
    #[must_use]
    pub fn with_url_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_templates = templates.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn candidate_urls(&self, domain: &str) -> Vec<String> {
        self.url_templates
            .iter()
            .map(|t| t.replace("{domain}", domain))
            .collect()
    }

    async fn fetch_once(&self, url: &str) -> Result<Option<String>, LookupError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(None);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::RateLimited {
                host: host_of(url),
                retry_after_secs: retry_after_secs(&response),
            });
        }
        if !status.is_success() {
            return Err(LookupError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let too_large = || LookupError::BodyTooLarge {
            url: url.to_owned(),
            limit: self.max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > u64::try_from(self.max_body_bytes).unwrap_or(u64::MAX))
        {
            return Err(too_large());
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"));

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let text = String::from_utf8_lossy(&body).into_owned();
        if is_html && looks_like_html(&text) {
            tracing::debug!(url, "declaration url served an html page");
            return Ok(None);
        }
        Ok(Some(text))
    }
}

fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start().get(..64).unwrap_or(text.trim_start());
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<head")
}

#[async_trait]
impl DeclarationFetcher for HttpDeclarationFetcher {
    async fn fetch(&self, domain: &str) -> Result<FetchedDeclaration, LookupError> {
        let urls = self.candidate_urls(domain);
        let mut first_missing: Option<String> = None;
        let mut last_error: Option<LookupError> = None;

        for url in urls {
            let outcome = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                self.fetch_once(&url)
            })
            .await;

            match outcome {
                Ok(Some(text)) => {
                    tracing::debug!(domain, url = %url, bytes = text.len(), "declaration found");
                    return Ok(FetchedDeclaration {
                        url,
                        text: Some(text),
                    });
                }
                Ok(None) => {
                    first_missing.get_or_insert(url);
                }
                Err(err) => {
                    tracing::debug!(domain, url = %url, error = %err, "declaration candidate failed");
                    last_error = Some(err);
                }
            }
        }

        if let Some(url) = first_missing {
            return Ok(FetchedDeclaration { url, text: None });
        }
        Err(last_error.unwrap_or_else(|| LookupError::InvalidDomain {
            domain: domain.to_owned(),
            reason: "no candidate urls configured",
        }))
    }
}
