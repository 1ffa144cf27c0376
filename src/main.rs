mod api;
mod config;
mod extract;
mod prompt;
mod upstream;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use axum::http::Method;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use upstream::UpstreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    // Logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env().context("failed to load configuration")?);
    if !config.api_key_configured() {
        tracing::warn!("no API key configured; set OPENROUTER_API_KEY or OPENAI_API_KEY");
    }

    let upstream = UpstreamClient::new(config.clone())?;
    let api_router = api::app(api::AppState { config: config.clone(), upstream });

    // The browser extension calls from its own origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = api_router.layer(TraceLayer::new_for_http()).layer(cors);

    // Bind
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid HOST/PORT")?;
    tracing::info!(
        model = %config.model,
        base_url = %config.base_url,
        api_key_configured = config.api_key_configured(),
        "listening on http://{}",
        addr
    );
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
