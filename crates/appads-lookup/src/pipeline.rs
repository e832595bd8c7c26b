//! Per-identifier lookup: resolve, fetch, match.

use std::sync::Arc;

use appads_core::{Declaration, DeclarationStatus, Identifier, LookupResult};
use appads_match::MatchEngine;

use crate::fetcher::DeclarationFetcher;
use crate::resolver::StoreResolver;

/// Runs one identifier through both collaborators and the match engine.
///
/// Never fails: every error becomes part of the returned [`LookupResult`].
/// A resolution failure yields a failed result; a fetch failure yields a
/// resolved result whose declaration carries the error.
#[derive(Clone)]
pub struct LookupPipeline {
    resolver: Arc<dyn StoreResolver>,
    fetcher: Arc<dyn DeclarationFetcher>,
}

impl LookupPipeline {
    pub fn new(resolver: Arc<dyn StoreResolver>, fetcher: Arc<dyn DeclarationFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    pub async fn process(&self, identifier: &Identifier, engine: &MatchEngine) -> LookupResult {
        let app = match self.resolver.resolve(identifier).await {
            Ok(app) => app,
            Err(err) => {
                tracing::warn!(identifier = %identifier, error = %err, "store lookup failed");
                return LookupResult::failed(identifier.as_str(), err.to_string());
            }
        };

        let declaration = match self.fetcher.fetch(&app.domain).await {
            Ok(fetched) => Declaration::from(fetched),
            Err(err) => {
                tracing::warn!(
                    identifier = %identifier,
                    domain = %app.domain,
                    error = %err,
                    "declaration fetch failed"
                );
                Declaration {
                    url: None,
                    status: DeclarationStatus::Failed {
                        message: err.to_string(),
                    },
                }
            }
        };

        let match_info = match declaration.text() {
            Some(text) if !engine.is_empty() => Some(engine.evaluate(text)),
            _ => None,
        };

        tracing::debug!(
            identifier = %identifier,
            domain = %app.domain,
            has_declaration = declaration.exists(),
            matched = match_info.as_ref().is_some_and(appads_core::MatchInfo::is_match),
            "lookup complete"
        );

        LookupResult::resolved(
            identifier.as_str(),
            app.store_type,
            app.domain,
            declaration,
            match_info,
        )
    }
}
