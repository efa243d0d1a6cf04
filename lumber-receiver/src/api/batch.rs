//! Batch API Handlers
//!
//! HTTP endpoint accepting encoded log batches.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use lumber_core::schema::{SCHEMA_HEADER, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::service::ForwardingEndpoint;

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchAccepted {
    pub accepted: usize,
}

/// POST /api/v1/batches
/// Decode a batch and forward its entries to the local pipeline
pub async fn receive_batch(
    State(endpoint): State<Arc<ForwardingEndpoint>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<BatchAccepted>> {
    let version = schema_version(&headers)?;
    tracing::debug!("Received batch: {} bytes, schema v{}", body.len(), version);

    let accepted = endpoint.receive(&body, version).await?;

    Ok(Json(BatchAccepted { accepted }))
}

/// Schema version named by the request, the current one when absent
fn schema_version(headers: &HeaderMap) -> ApiResult<u32> {
    let Some(value) = headers.get(SCHEMA_HEADER) else {
        return Ok(SCHEMA_VERSION);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| {
            ApiError::BadRequest(format!("Invalid {} header: {:?}", SCHEMA_HEADER, value))
        })
}
