use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::ApiResponse;

/// Errors surfaced by the management and redirect endpoints.
///
/// `CaptchaMismatch` and `CredentialMismatch` are distinct internally but
/// both map to 403 so callers cannot tell which check rejected them.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request parameter: {0}")]
    InvalidArgument(String),

    #[error("too many requests")]
    Backpressure,

    #[error("captcha verification failed")]
    CaptchaMismatch,

    #[error("password verification failed")]
    CredentialMismatch,

    #[error("no link found")]
    NotFound,

    #[error("internal server error")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::Backpressure => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::CaptchaMismatch | ServiceError::CredentialMismatch => {
                StatusCode::FORBIDDEN
            }
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Internal(ref detail) = self {
            tracing::error!(target: "linkshortener::error", detail = %detail, "internal error");
        }

        let status = self.status();
        ApiResponse::failure(status.as_u16(), self.to_string()).into_response()
    }
}
