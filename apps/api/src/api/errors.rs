use axum::{
    extract::multipart::MultipartError,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::errors::{DomainError, RepositoryError};
use crate::infrastructure::payments::PaymentError;
use crate::infrastructure::shipping::ShippingError;
use crate::infrastructure::storage::StorageError;

/// API error type with HTTP status code and message
///
/// Renders as `{ "message": "..." }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Creates a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Creates a 403 Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Creates a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Creates a 409 Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Creates a 500 Internal Server Error
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Creates a 502 Bad Gateway error
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    /// Creates a 503 Service Unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Like `From<RepositoryError>`, but a duplicate becomes 409 with `message`
    pub fn duplicate_as(err: RepositoryError, message: &str) -> Self {
        match err {
            RepositoryError::Duplicate(_) => Self::conflict(message),
            other => other.into(),
        }
    }

    /// Like `From<RepositoryError>`, but a foreign-key conflict becomes 409 with `message`
    pub fn referenced_as(err: RepositoryError, message: &str) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::conflict(message),
            other => other.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "Request failed");
        }

        let body = Json(json!({
            "message": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate(_) => Self::conflict("Record already exists"),
            RepositoryError::Conflict(_) => {
                Self::conflict("Record is still referenced by other records")
            }
            RepositoryError::Stale(_) => {
                Self::conflict("Record was changed by another request, reload and try again")
            }
            RepositoryError::InsufficientStock(id) => {
                Self::conflict(format!("Insufficient stock for product {}", id))
            }
            RepositoryError::NotFound(id) => Self::not_found(format!("Record not found: {}", id)),
            RepositoryError::Database(message) => {
                tracing::error!(error = %message, "Database error");
                Self::internal_server_error("Internal server error")
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ShippingError> for ApiError {
    fn from(err: ShippingError) -> Self {
        match err {
            ShippingError::UnknownLocation(message) => Self::bad_request(message),
            other => Self::bad_gateway(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => {
                tracing::error!(error = %e, "Upload storage failed");
                Self::internal_server_error("Failed to store file")
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::bad_request(err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn repository_errors_map_to_statuses() {
        let cases = [
            (RepositoryError::Duplicate("x".into()), StatusCode::CONFLICT),
            (RepositoryError::Conflict("x".into()), StatusCode::CONFLICT),
            (RepositoryError::Stale(Uuid::nil()), StatusCode::CONFLICT),
            (RepositoryError::InsufficientStock(Uuid::nil()), StatusCode::CONFLICT),
            (RepositoryError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                RepositoryError::Database("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn database_details_are_not_leaked() {
        let err = ApiError::from(RepositoryError::Database("password=hunter2".into()));
        assert!(!err.message.contains("hunter2"));
    }

    #[test]
    fn validation_is_bad_request() {
        let err = ApiError::from(DomainError::validation("Name is required"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Name is required");
    }

    #[test]
    fn duplicate_as_overrides_message() {
        let err = ApiError::duplicate_as(RepositoryError::Duplicate("email".into()), "Email taken");
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Email taken");

        let err = ApiError::duplicate_as(RepositoryError::NotFound(Uuid::nil()), "Email taken");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn body_uses_message_key() {
        let response = ApiError::not_found("Product not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "message": "Product not found" }));
    }
}
