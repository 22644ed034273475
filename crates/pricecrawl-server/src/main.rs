mod api;
mod middleware;

use std::sync::Arc;

use pricecrawl_crawler::{
    build_adapters_from_env, AdapterSettings, Aggregator, AggregatorSettings, ResultCache,
};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = pricecrawl_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let sources = pricecrawl_core::load_sources(&config.sources_path)?;
    let adapters =
        build_adapters_from_env(&sources, &AdapterSettings::from_app_config(&config))?;
    if adapters.is_empty() {
        tracing::warn!(
            path = %config.sources_path.display(),
            "no price sources registered; price queries will return 503"
        );
    }

    let state = AppState {
        aggregator: Arc::new(Aggregator::new(
            adapters,
            AggregatorSettings::from_app_config(&config),
        )),
        cache: Arc::new(ResultCache::new()),
    };

    let auth = AuthState::from_env(matches!(
        config.env,
        pricecrawl_core::Environment::Development
    ))?;
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "price service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
