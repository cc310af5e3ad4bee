//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; [`AppError`] wraps
//! [`br_core::Error`] and renders it as a JSON body with the status code the
//! error maps to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: br_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: br_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<br_core::Error> for AppError {
    fn from(e: br_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Server error in handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use br_core::{ChunkHash, Error};

    #[test]
    fn not_found_produces_404() {
        let response = AppError::new(Error::stream_not_found("what#1")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn paid_produces_402() {
        let err = AppError::new(Error::PaidStream { uri: "p#1".into() });
        assert_eq!(err.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn missing_blob_produces_503() {
        let err = AppError::new(Error::ChunkNotFound {
            hash: ChunkHash::digest(b"x").to_string(),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn seek_error_produces_416() {
        let err = AppError::new(Error::OutOfBounds { offset: 5, size: 1 });
        assert_eq!(err.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(Error::Internal("oops".into())).with_request_id("req-123");
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
