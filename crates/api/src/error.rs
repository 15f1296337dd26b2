//! API error types and HTTP mapping
//!
//! Responses carry a generic message in `{"error": …}`; the detailed cause
//! is logged server-side and never leaked to unauthenticated callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid session/bearer token
    #[error("unauthorized")]
    Unauthorized,

    /// Request body or parameters failed validation
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Row the caller asked for does not exist (or is not theirs)
    #[error("not found")]
    NotFound,

    /// Monthly clip or storage quota is exhausted
    #[error("quota exceeded")]
    QuotaExceeded,

    /// Billing is not configured on this deployment
    #[error("service unavailable")]
    ServiceUnavailable,

    /// Database or payment-provider failure; for webhooks this is the
    /// retry signal
    #[error("internal error: {0}")]
    Database(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::QuotaExceeded => StatusCode::FORBIDDEN,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthorized => "Authentication required".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::NotFound => "Not found".to_string(),
            ApiError::QuotaExceeded => "Plan limit reached".to_string(),
            ApiError::ServiceUnavailable => "Service unavailable".to_string(),
            ApiError::Database(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<pagestash_billing::BillingError> for ApiError {
    fn from(err: pagestash_billing::BillingError) -> Self {
        ApiError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::QuotaExceeded.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::ServiceUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Database("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = ApiError::Database("password authentication failed for user".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
