//! API route handlers
//!
//! - `health`: liveness and store connectivity
//! - `auth`: registration, login and token refresh
//! - `members`: member listing, lookup and profile updates

pub mod auth;
pub mod health;
pub mod members;

use crate::error::{ApiError, ValidationErrorDetail};
use validator::ValidationErrors;

/// Flattens `validator` field errors into a 422 response
pub(crate) fn validation_failed(errors: ValidationErrors) -> ApiError {
    let details = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(details)
}
