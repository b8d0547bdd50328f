//! Error handling for the API server
//!
//! Handlers return [`ApiResult<T>`]; [`ApiError`] turns into a JSON error
//! body with the matching HTTP status. Repository, JWT and password errors
//! convert with `?`.
//!
//! # Example
//!
//! ```
//! use memberbase_api::error::{ApiError, ApiResult};
//! use axum::Json;
//! use serde_json::json;
//!
//! async fn handler(id: String) -> ApiResult<Json<serde_json::Value>> {
//!     if id.is_empty() {
//!         return Err(ApiError::BadRequest("id is required".to_string()));
//!     }
//!     Ok(Json(json!({ "id": id })))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use memberbase_shared::auth::jwt::JwtError;
use memberbase_shared::auth::password::PasswordError;
use memberbase_shared::error::{MemberError, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 404
    NotFound(String),

    /// 409, e.g. a username that is already registered
    Conflict(String),

    /// 422
    ValidationError(Vec<ValidationErrorDetail>),

    /// 500; the message is logged, never returned
    InternalError(String),

    /// 503
    ServiceUnavailable(String),
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,

    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `conflict`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<MemberError> for ApiError {
    fn from(err: MemberError) -> Self {
        match err {
            MemberError::Validation(e) => ApiError::invalid(e.field(), e.to_string()),
            MemberError::Duplicate => ApiError::Conflict(err.to_string()),
            MemberError::NotFound(_) => ApiError::NotFound("Member not found".to_string()),
            MemberError::Authentication => ApiError::Unauthorized(err.to_string()),
            MemberError::Suspended => ApiError::Forbidden(err.to_string()),
            MemberError::Store(StoreError::DeadlineExceeded { .. }) => {
                ApiError::ServiceUnavailable("Request timed out".to_string())
            }
            MemberError::Store(StoreError::Cancelled { .. }) => {
                ApiError::ServiceUnavailable("Request cancelled".to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(_) => ApiError::InternalError(err.to_string()),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memberbase_shared::error::ValidationError;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::invalid("email", "Invalid email format");
        assert_eq!(err.to_string(), "Validation failed: 1 errors");
    }

    #[test]
    fn test_member_error_status_mapping() {
        let cases: Vec<(MemberError, StatusCode)> = vec![
            (
                ValidationError::PhoneOrEmailRequired.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (MemberError::Duplicate, StatusCode::CONFLICT),
            (
                MemberError::NotFound("Member-x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (MemberError::Authentication, StatusCode::UNAUTHORIZED),
            (MemberError::Suspended, StatusCode::FORBIDDEN),
            (
                StoreError::DeadlineExceeded { op: "find_many" }.into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StoreError::Corrupt("bad row".to_string()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MemberError::Credential("bad hash".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), expected, "{}", api);
        }
    }

    #[test]
    fn test_validation_carries_field() {
        let api: ApiError = MemberError::from(ValidationError::InvalidPage(0)).into();
        match api {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "page"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_jwt_errors_are_unauthorized() {
        let api: ApiError = JwtError::Expired.into();
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);

        let api: ApiError = JwtError::InvalidIssuer.into();
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
    }
}
