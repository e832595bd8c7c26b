mod api;
mod housekeeping;
mod middleware;
mod scheduler;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use appads_core::{AppConfig, ResolverSource};
use appads_lookup::{
    DeclarationFetcher, HttpDeclarationFetcher, HttpSettings, HttpStoreResolver, LookupPipeline,
    StaticStoreResolver, StoreResolver,
};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, rate_limit_state, AppState, ExtractLimits},
    scheduler::{BatchScheduler, SchedulerSettings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = appads_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    let pipeline = build_pipeline(&config)?;
    let scheduler = BatchScheduler::new(pipeline, SchedulerSettings::from_config(&config));
    let state = AppState {
        scheduler: Arc::new(scheduler),
        limits: ExtractLimits::from_config(&config),
    };
    let app = build_app(state, rate_limit_state(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "appads server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<LookupPipeline> {
    let settings = HttpSettings::from_config(config);
    let resolver: Arc<dyn StoreResolver> = match &config.resolver {
        ResolverSource::Http { base_url } => Arc::new(HttpStoreResolver::new(base_url, &settings)?),
        ResolverSource::DomainMap { path } => Arc::new(StaticStoreResolver::from_path(path)?),
    };
    let fetcher: Arc<dyn DeclarationFetcher> = Arc::new(HttpDeclarationFetcher::new(&settings)?);
    Ok(LookupPipeline::new(resolver, fetcher))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
