//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::ForwardError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<ForwardError> for ApiError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Malformed(_)
            | ForwardError::Validation(_)
            | ForwardError::UnsupportedSchema(_) => ApiError::BadRequest(err.to_string()),
            ForwardError::Pipeline(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lumber_core::BatchError;

    #[test]
    fn test_forward_error_status() {
        let malformed: ApiError = ForwardError::Malformed(BatchError::malformed("bad")).into();
        assert_eq!(malformed.into_response().status(), StatusCode::BAD_REQUEST);

        let pipeline: ApiError =
            ForwardError::Pipeline(crate::pipeline::PipelineError::Closed).into();
        assert_eq!(
            pipeline.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
