//! In-process lookup collaborators for scheduler and route tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use appads_core::{Identifier, StoreType};
use appads_lookup::{
    DeclarationFetcher, FetchedDeclaration, LookupError, LookupPipeline, ResolvedApp,
    StoreResolver,
};
use async_trait::async_trait;

/// Resolves `<id>` to `<id-with-dots-as-dashes>.example` after a delay,
/// tracking how many calls overlap.
#[derive(Default)]
pub struct FakeResolver {
    pub delay: Duration,
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeResolver {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(mut self, identifier: &str) -> Self {
        self.failing.insert(identifier.to_owned());
        self
    }
}

#[async_trait]
impl StoreResolver for FakeResolver {
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedApp, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(identifier.as_str()) {
            return Err(LookupError::UnexpectedStatus {
                status: 502,
                url: format!("http://resolver.test/lookup?identifier={identifier}"),
            });
        }
        Ok(ResolvedApp {
            domain: format!("{}.example", identifier.as_str().replace('.', "-")),
            store_type: StoreType::GooglePlay,
        })
    }
}

/// Serves the same declaration for every domain.
pub struct FixedFetcher(pub &'static str);

#[async_trait]
impl DeclarationFetcher for FixedFetcher {
    async fn fetch(&self, domain: &str) -> Result<FetchedDeclaration, LookupError> {
        Ok(FetchedDeclaration {
            url: format!("https://{domain}/app-ads.txt"),
            text: Some(self.0.to_owned()),
        })
    }
}

pub const DECLARATION: &str = "appnexus.com, 12447, DIRECT\ngoogle.com, pub-1, RESELLER, f08c47fec0942fa0\n";

pub fn pipeline(resolver: Arc<FakeResolver>) -> LookupPipeline {
    LookupPipeline::new(resolver, Arc::new(FixedFetcher(DECLARATION)))
}
