//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every handler returns `Result<_, AppError>`, and `AppError` implements
//! `actix_web::error::ResponseError` so that failures turn into JSON responses with the
//! right status code.
//!
//! Validation failures carry a field -> reasons map which is rendered verbatim as the
//! response body. Authorization failures carry a single reason string. Store failures
//! are logged and reported to the client as a generic server error.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

use crate::validation::describe_validation_error;

/// Field name -> list of human readable reasons.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// A write was attempted without credentials, or the bearer token is invalid (HTTP 401).
    Unauthorized(String),
    /// Login failed because the username/password pair did not match (HTTP 401).
    InvalidCredentials,
    /// The actor is authenticated but lacks rights on the target (HTTP 403).
    Forbidden(String),
    /// A malformed request that is not tied to a single field (HTTP 400).
    BadRequest(String),
    /// The requested entity or filter target does not exist (HTTP 404).
    NotFound(String),
    /// Field-level validation failures (HTTP 400).
    ValidationError(FieldErrors),
    /// Per-item validation failures of a list payload, in payload order (HTTP 400).
    BatchValidationError(Vec<FieldErrors>),
    /// Represents an unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Represents an error originating from database operations (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    /// Builds a validation error carrying a single reason for a single field.
    pub fn field(field: &str, reason: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![reason.into()]);
        AppError::ValidationError(errors)
    }

    /// The field map of a validation error, if this is one.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::ValidationError(errors) => Some(errors),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::InvalidCredentials => write!(f, "Invalid credentials"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::ValidationError(errors) => {
                write!(f, "Validation Error: ")?;
                let fields: Vec<String> = errors
                    .iter()
                    .map(|(field, reasons)| format!("{}: {}", field, reasons.join(" ")))
                    .collect();
                write!(f, "{}", fields.join("; "))
            }
            AppError::BatchValidationError(items) => {
                let failing = items.iter().filter(|item| !item.is_empty()).count();
                write!(f, "Validation Error: {} of {} items invalid", failing, items.len())
            }
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_)
            | AppError::ValidationError(_)
            | AppError::BatchValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match self {
            AppError::ValidationError(errors) => response.json(errors),
            AppError::BatchValidationError(items) => response.json(items),
            AppError::InvalidCredentials => response.json(json!({
                "error": "Incorrect username or password."
            })),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg) => response.json(json!({ "error": msg })),
            AppError::InternalServerError(msg) => {
                log::error!("internal error: {}", msg);
                response.json(json!({ "error": "Internal server error" }))
            }
            // The driver message may contain SQL; it only goes to the log.
            AppError::DatabaseError(msg) => {
                log::error!("database error: {}", msg);
                response.json(json!({ "error": "Database error" }))
            }
        }
    }
}

/// Maps a unique constraint from the schema to the request field it guards.
fn constraint_field(constraint: &str) -> &'static str {
    match constraint {
        "users_username_key" => "username",
        "users_email_key" => "email",
        _ => "name",
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`, unique violations become a field validation
/// error, and everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                let field = db_err.constraint().map(constraint_field).unwrap_or("non_field_errors");
                AppError::field(field, format!("A record with this {} already exists.", field))
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest("Referenced record does not exist".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`,
/// keeping one entry per failing field.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut fields = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            fields.insert(
                field.to_string(),
                field_errors.iter().map(describe_validation_error).collect(),
            );
        }
        AppError::ValidationError(fields)
    }
}

/// Token decoding failures are authentication failures.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, max = 5))]
        name: String,
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(AppError::Unauthorized("x".into()).error_response().status(), 401);
        assert_eq!(AppError::InvalidCredentials.error_response().status(), 401);
        assert_eq!(AppError::Forbidden("x".into()).error_response().status(), 403);
        assert_eq!(AppError::BadRequest("x".into()).error_response().status(), 400);
        assert_eq!(AppError::field("name", "x").error_response().status(), 400);
        assert_eq!(AppError::BatchValidationError(vec![]).error_response().status(), 400);
        assert_eq!(AppError::NotFound("x".into()).error_response().status(), 404);
        assert_eq!(AppError::DatabaseError("x".into()).error_response().status(), 500);
    }

    #[actix_rt::test]
    async fn test_validation_body_is_field_map() {
        let response = AppError::field("deadline", "Date has wrong format.").error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "deadline": ["Date has wrong format."] }));
    }

    #[actix_rt::test]
    async fn test_database_error_body_hides_details() {
        let response = AppError::DatabaseError("relation \"x\" does not exist".into()).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "error": "Database error" }));
    }

    #[test]
    fn test_validator_errors_become_field_map() {
        let err: AppError = Named { name: "toolong".into() }.validate().unwrap_err().into();
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(
            fields["name"],
            vec!["Ensure this field has no more than 5 characters.".to_string()]
        );
    }

    #[test]
    fn test_row_not_found_is_not_found() {
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound(_)));
    }
}
