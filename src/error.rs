use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures answered with a plain HTTP status, before any event stream is
/// committed.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request body")]
    InvalidBody(#[source] serde_json::Error),
    #[error("Prompt is required")]
    EmptyPrompt,
    #[error("Streaming unsupported")]
    StreamUnsupported,
    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidBody(_) | GatewayError::EmptyPrompt => StatusCode::BAD_REQUEST,
            GatewayError::StreamUnsupported | GatewayError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
