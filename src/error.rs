use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::{error, warn};

#[derive(Debug, ThisError)]
pub enum StockError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("No data found for the given ticker and date range.")]
    NoData,

    #[error("not enough history: need more than {needed} closing prices, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("model error: {0}")]
    Model(String),

    #[error("Username already exists.")]
    UsernameTaken,

    #[error("Email already registered.")]
    EmailTaken,

    #[error("invalid password hash encoding")]
    PasswordHash,
}

/// Whether a failed upstream call is worth another attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for StockError {
    fn is_retryable(&self) -> bool {
        match self {
            StockError::Reqwest(e) => e.is_timeout() || e.is_connect(),
            StockError::UpstreamStatus(code) => {
                code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl StockError {
    fn is_prediction(&self) -> bool {
        matches!(
            self,
            StockError::InsufficientHistory { .. }
                | StockError::ModelLoad { .. }
                | StockError::Model(_)
        )
    }
}

impl IntoResponse for StockError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            StockError::NoData => (StatusCode::NOT_FOUND, self.to_string()),
            StockError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            StockError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            e if e.is_prediction() => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Prediction error: {e}"),
            ),
            e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(ApiErrorResponse { error: message })).into_response()
    }
}

/// JSON error body returned by the API endpoints.
#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: StockError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn no_data_maps_to_404() {
        let (status, body) = body_of(StockError::NoData).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["error"],
            "No data found for the given ticker and date range."
        );
    }

    #[tokio::test]
    async fn model_failures_are_prefixed() {
        let (status, body) = body_of(StockError::Model("shape mismatch".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Prediction error: model error: shape mismatch");
    }

    #[tokio::test]
    async fn invalid_request_is_400() {
        let (status, body) = body_of(StockError::InvalidRequest("bad date".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad date");
    }

    #[test]
    fn retry_only_transient_upstream_failures() {
        assert!(StockError::UpstreamStatus(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(StockError::UpstreamStatus(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!StockError::UpstreamStatus(StatusCode::NOT_FOUND).is_retryable());
        assert!(!StockError::NoData.is_retryable());
    }
}
