use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited {
        limit: u32,
        reset_at: String,
        retry_after: u64,
    },

    #[error("Storage error: {0}")]
    TransientStorage(String),

    #[error("Rank recomputation failed: {0}")]
    Recomputation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidQuery { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::TransientStorage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Recomputation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "detail": self.to_string() }));
        let mut response = (status, body).into_response();

        if let AppError::RateLimited {
            limit,
            reset_at,
            retry_after,
        } = &self
        {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("x-ratelimit-limit", value);
            }
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
            if let Ok(value) = HeaderValue::from_str(reset_at) {
                headers.insert("x-ratelimit-reset", value);
            }
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                headers.insert("retry-after", value);
            }
        }

        response
    }
}
