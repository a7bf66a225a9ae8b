//! HTTP error mapping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sanare_core::error::SanareError;
use serde_json::json;

/// Wrapper turning pipeline errors into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub SanareError);

impl From<SanareError> for ApiError {
    fn from(e: SanareError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SanareError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            SanareError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            SanareError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SanareError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            SanareError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            SanareError::StateConflict(_) => (StatusCode::CONFLICT, "state_conflict"),
            SanareError::Database(_) | SanareError::Io(_) | SanareError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }

        // Configuration details never leave the process.
        let message = match &self.0 {
            SanareError::Config(_) => "service misconfigured".to_string(),
            SanareError::Database(_) | SanareError::Io(_) | SanareError::Internal(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "error": code, "message": message }));
        let mut response = (status, body).into_response();

        if let SanareError::RateLimited { retry_after } = &self.0 {
            if let Ok(value) = retry_after.as_secs().to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SanareError::validation("email", "bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (SanareError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (SanareError::StateConflict("x".into()), StatusCode::CONFLICT),
            (SanareError::upstream("kyc-provider", "down"), StatusCode::BAD_GATEWAY),
            (SanareError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let response = ApiError(SanareError::RateLimited {
            retry_after: Duration::from_secs(42),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).map(|v| v.to_str().ok()),
            Some(Some("42"))
        );
    }
}
