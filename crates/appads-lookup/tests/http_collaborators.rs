//! Integration tests for the HTTP collaborators and the lookup pipeline.
//!
//! Uses `wiremock` so no real network traffic is made.

use std::sync::Arc;

use appads_core::{DeclarationStatus, FilterCriteria, Identifier, StoreType};
use appads_lookup::{
    DeclarationFetcher, HttpDeclarationFetcher, HttpSettings, HttpStoreResolver, LookupError,
    LookupPipeline, StaticStoreResolver, StoreResolver,
};
use appads_match::MatchEngine;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 5-second timeout, no retries, tiny back-off.
fn settings(max_retries: u32) -> HttpSettings {
    HttpSettings {
        timeout_secs: 5,
        user_agent: "appads-test/0.1".to_owned(),
        max_retries,
        backoff_base_ms: 1,
        max_body_bytes: 1024,
    }
}

fn fetcher_for(server: &MockServer, max_retries: u32) -> HttpDeclarationFetcher {
    HttpDeclarationFetcher::new(&settings(max_retries))
        .expect("failed to build test fetcher")
        .with_url_templates([format!("{}/{{domain}}/app-ads.txt", server.uri())])
}

fn id(raw: &str) -> Identifier {
    Identifier::parse(raw).expect("valid identifier")
}

// ---------------------------------------------------------------------------
// HttpStoreResolver
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolver_parses_and_normalizes_domain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .and(query_param("identifier", "com.example.game"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domain": "https://www.example.com/",
            "storeType": "googleplay"
        })))
        .mount(&server)
        .await;

    let resolver = HttpStoreResolver::new(&server.uri(), &settings(0)).unwrap();
    let app = resolver.resolve(&id("com.example.game")).await.unwrap();

    assert_eq!(app.domain, "example.com");
    assert_eq!(app.store_type, StoreType::GooglePlay);
}

#[tokio::test]
async fn resolver_maps_404_to_app_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolver = HttpStoreResolver::new(&server.uri(), &settings(2)).unwrap();
    let err = resolver.resolve(&id("com.missing.app")).await.unwrap_err();

    assert!(
        matches!(err, LookupError::AppNotFound { ref identifier } if identifier == "com.missing.app"),
        "expected AppNotFound, got: {err:?}"
    );
}

#[tokio::test]
async fn resolver_retries_rate_limited_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domain": "studio.io",
            "storeType": "appstore"
        })))
        .mount(&server)
        .await;

    let resolver = HttpStoreResolver::new(&server.uri(), &settings(2)).unwrap();
    let app = resolver.resolve(&id("id284882215")).await.unwrap();
    assert_eq!(app.domain, "studio.io");
    assert_eq!(app.store_type, StoreType::AppStore);
}

#[tokio::test]
async fn resolver_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let resolver = HttpStoreResolver::new(&server.uri(), &settings(0)).unwrap();
    let err = resolver.resolve(&id("com.example.game")).await.unwrap_err();
    assert!(matches!(err, LookupError::Deserialize { .. }), "got: {err:?}");
}

// ---------------------------------------------------------------------------
// HttpDeclarationFetcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetcher_returns_declaration_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/app-ads.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("appnexus.com, 12447, DIRECT\n"),
        )
        .mount(&server)
        .await;

    let fetched = fetcher_for(&server, 0).fetch("example.com").await.unwrap();
    assert_eq!(fetched.text.as_deref(), Some("appnexus.com, 12447, DIRECT\n"));
    assert!(fetched.url.ends_with("/example.com/app-ads.txt"));
}

#[tokio::test]
async fn fetcher_treats_404_and_410_as_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 3);
    assert_eq!(fetcher.fetch("gone.com").await.unwrap().text, None);
    assert_eq!(fetcher.fetch("missing.com").await.unwrap().text, None);
}

#[tokio::test]
async fn fetcher_treats_html_page_as_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/spa.com/app-ads.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<!doctype html><html><body>Not here</body></html>"),
        )
        .mount(&server)
        .await;

    let fetched = fetcher_for(&server, 0).fetch("spa.com").await.unwrap();
    assert_eq!(fetched.text, None);
}

#[tokio::test]
async fn fetcher_retries_429_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a.com, 1, RESELLER"))
        .mount(&server)
        .await;

    let fetched = fetcher_for(&server, 2).fetch("busy.com").await.unwrap();
    assert_eq!(fetched.text.as_deref(), Some("a.com, 1, RESELLER"));
}

#[tokio::test]
async fn fetcher_gives_up_on_persistent_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(2)
        .mount(&server)
        .await;

    let err = fetcher_for(&server, 1).fetch("busy.com").await.unwrap_err();
    assert!(
        matches!(err, LookupError::RateLimited { retry_after_secs: 30, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetcher_rejects_oversized_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let err = fetcher_for(&server, 0).fetch("huge.com").await.unwrap_err();
    assert!(matches!(err, LookupError::BodyTooLarge { limit: 1024, .. }), "got: {err:?}");
}

#[tokio::test]
async fn fetcher_falls_back_to_next_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("b.com, 2, DIRECT"))
        .mount(&server)
        .await;

    // Port 1 refuses connections, standing in for a host without TLS.
    let fetcher = HttpDeclarationFetcher::new(&settings(0))
        .unwrap()
        .with_url_templates([
            "http://127.0.0.1:1/{domain}/app-ads.txt".to_owned(),
            format!("{}/{{domain}}/app-ads.txt", server.uri()),
        ]);

    let fetched = fetcher.fetch("example.com").await.unwrap();
    assert_eq!(fetched.text.as_deref(), Some("b.com, 2, DIRECT"));
    assert!(fetched.url.starts_with(&server.uri()));
}

// ---------------------------------------------------------------------------
// LookupPipeline
// ---------------------------------------------------------------------------

const DOMAIN_MAP: &str = "
apps:
  com.example.game:
    domain: example.com
    storeType: googleplay
  com.nodecl.app:
    domain: nodecl.com
    storeType: amazon
";

fn appnexus_engine() -> MatchEngine {
    MatchEngine::new(&[FilterCriteria {
        domain: Some("appnexus.com".into()),
        ..FilterCriteria::default()
    }])
}

#[tokio::test]
async fn pipeline_resolves_fetches_and_matches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("appnexus.com, 12447, DIRECT"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nodecl.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolver: Arc<dyn StoreResolver> =
        Arc::new(StaticStoreResolver::from_yaml(DOMAIN_MAP).unwrap());
    let fetcher: Arc<dyn DeclarationFetcher> = Arc::new(fetcher_for(&server, 0));
    let pipeline = LookupPipeline::new(resolver, fetcher);
    let engine = appnexus_engine();

    let found = pipeline.process(&id("com.example.game"), &engine).await;
    assert!(found.is_success());
    assert!(found.has_declaration());
    assert_eq!(found.match_info().map(|m| m.count), Some(1));

    let missing = pipeline.process(&id("com.nodecl.app"), &engine).await;
    assert!(missing.is_success());
    assert!(!missing.has_declaration());
    assert_eq!(missing.match_info(), None);
    assert_eq!(missing.store_type(), Some(StoreType::Amazon));

    let unknown = pipeline.process(&id("com.unknown.app"), &engine).await;
    assert!(!unknown.is_success());
    assert!(unknown.error().unwrap().contains("com.unknown.app"));
}

#[tokio::test]
async fn pipeline_records_fetch_failure_on_resolved_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/app-ads.txt"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let pipeline = LookupPipeline::new(
        Arc::new(StaticStoreResolver::from_yaml(DOMAIN_MAP).unwrap()),
        Arc::new(fetcher_for(&server, 0)),
    );
    let result = pipeline
        .process(&id("com.example.game"), &MatchEngine::default())
        .await;

    assert!(result.is_success());
    let declaration = result.declaration().unwrap();
    assert!(matches!(
        declaration.status,
        DeclarationStatus::Failed { ref message } if message.contains("503")
    ));
    assert!(result.match_info().is_none());
}
