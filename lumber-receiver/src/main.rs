//! Lumber Receiver
//!
//! Accepts log batches over HTTP, decodes them and re-emits the entries
//! through the local `tracing` pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod pipeline;
pub mod service;

use crate::config::ReceiverConfig;
use crate::pipeline::{LogPipeline, TracingPipeline};
use crate::service::ForwardingEndpoint;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumber_receiver=info,lumber::remote=trace,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lumber Receiver...");

    let config = ReceiverConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;

    if config.logger_name_prefix.is_empty() {
        tracing::info!("Forwarding logger names unchanged");
    } else {
        tracing::info!("Prefixing logger names with '{}'", config.logger_name_prefix);
    }

    let pipeline: Arc<dyn LogPipeline> = Arc::new(TracingPipeline::new());
    let endpoint = ForwardingEndpoint::new(pipeline)
        .with_prefix(config.logger_name_prefix.clone())
        .with_limits(config.limits());

    // Build router with all API endpoints
    let app = api::create_router(Arc::new(endpoint), config.max_body_bytes);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Receiver stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
