//! codebrokerd - code-assistance request broker
//!
//! Accepts line-delimited JSON requests over TCP and answers them from a
//! remote completions service, a local llama.cpp model, or canned guidance.

use anyhow::{Context, Result};
use codebrokerd::broker::Broker;
use codebrokerd::config::Config;
use codebrokerd::{availability, health, server};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("codebrokerd v{} starting", codebroker_common::VERSION);

    let config = Config::load();

    // Must complete before the first request is routed
    let availability = availability::probe(&config).await;
    info!(
        "Backends: remote={}, local={}",
        availability.remote_configured(),
        availability.local_configured()
    );

    let broker = Arc::new(Broker::from_config(&config, availability.clone())?);

    let health_listener = TcpListener::bind(config.health_addr())
        .await
        .with_context(|| format!("Failed to bind health endpoint on {}", config.health_addr()))?;
    let health_availability = Arc::new(availability);
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_listener, health_availability).await {
            error!("Health server stopped: {}", e);
        }
    });

    let listener = TcpListener::bind(config.request_addr())
        .await
        .with_context(|| format!("Failed to bind request server on {}", config.request_addr()))?;

    tokio::select! {
        result = server::serve(listener, broker, config.server.max_message_bytes) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully");
        }
    }

    Ok(())
}
