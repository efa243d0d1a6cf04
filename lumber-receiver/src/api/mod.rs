//! API Module
//!
//! HTTP API layer for the receiver.

pub mod batch;
pub mod error;
pub mod health;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::ForwardingEndpoint;

/// Create the main API router with all endpoints
pub fn create_router(endpoint: Arc<ForwardingEndpoint>, max_body_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Batch endpoints
        .route("/api/v1/batches", post(batch::receive_batch))
        // Add state and middleware
        .with_state(endpoint)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}
