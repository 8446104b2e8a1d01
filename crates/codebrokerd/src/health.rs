//! Health endpoint

use crate::availability::BackendAvailability;
use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use codebroker_common::{HealthReport, VERSION};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(availability: Arc<BackendAvailability>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(availability)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(availability): State<Arc<BackendAvailability>>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy".to_string(),
        service: "codebroker".to_string(),
        version: VERSION.to_string(),
        timestamp: Utc::now(),
        remote_configured: availability.remote_configured(),
        local_configured: availability.local_configured(),
    })
}

/// Run the health server on an already bound listener
pub async fn serve(listener: TcpListener, availability: Arc<BackendAvailability>) -> Result<()> {
    info!("Health endpoint on http://{}/health", listener.local_addr()?);
    axum::serve(listener, router(availability)).await?;
    Ok(())
}
