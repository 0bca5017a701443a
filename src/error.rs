// HTTP API Error Types
use axum::{response::IntoResponse, http::StatusCode, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::{DatabaseError, MappingNotFound};
use crate::filter::FilterError;
use crate::services::auth_service::AuthError;
use crate::services::data_service::DataError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to the response envelope: `{success: false, message, code}`
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["field_errors"] = json!(field_errors);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors
        }
    }

    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), message.clone());
        ApiError::validation_error(message, Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UnknownTable(table) => {
                tracing::error!(table = %table, "mapped table does not exist");
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) => {
                tracing::error!("Database pool timed out");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<MappingNotFound> for ApiError {
    fn from(err: MappingNotFound) -> Self {
        ApiError::not_found(err.to_string())
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::UnknownField(field) => {
                ApiError::field_error(field.clone(), format!("Unknown field: {}", field))
            }
            FilterError::MissingOwnerColumn(table) => {
                tracing::error!(table = %table, "table has no user_id column");
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            FilterError::MissingOwner => {
                tracing::error!("unscoped query rejected");
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::MappingNotFound(e) => e.into(),
            DataError::Filter(e) => e.into(),
            DataError::NoValidFields => ApiError::validation_error("No valid fields to save", None),
            DataError::RecordNotFound => ApiError::not_found("Record not found"),
            DataError::InvalidPayload(msg) => ApiError::bad_request(msg),
            DataError::NoDateColumn(mapping) => {
                ApiError::bad_request(format!("Mapping {} has no date column", mapping))
            }
            DataError::ExportNotConfigured => ApiError::not_found("Export is not configured"),
            DataError::QueryFailed(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingFields => ApiError::validation_error("Please fill in all fields", None),
            AuthError::PasswordMismatch => ApiError::field_error("password_confirm", "Passwords do not match"),
            AuthError::WeakPassword(min) => ApiError::field_error(
                "password",
                format!("Password must be at least {} characters long", min),
            ),
            AuthError::InvalidInvitation => ApiError::field_error("invitation_code", "Invalid or already used invitation code"),
            AuthError::DuplicateUser => ApiError::validation_error("Username or email already taken", None),
            AuthError::InvalidCredentials => ApiError::unauthorized("Invalid username or password"),
            AuthError::RateLimited { minutes } => ApiError::too_many_requests(format!(
                "Too many failed login attempts. Please try again in {} minutes.",
                minutes
            )),
            AuthError::NotAuthenticated => ApiError::unauthorized("Not authenticated"),
            AuthError::RegistrationFailed => {
                ApiError::internal_server_error("Registration failed, please try again")
            }
            AuthError::DeletionFailed => {
                ApiError::internal_server_error("Account could not be deleted")
            }
            AuthError::Password(e) => {
                tracing::error!("password hashing error: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            AuthError::Database(e) => e.into(),
            AuthError::Session(e) => {
                tracing::error!(error = %e, "session store error");
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let err = ApiError::not_found("Mapping not found: x");
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            err.to_json(),
            json!({"success": false, "message": "Mapping not found: x", "code": "NOT_FOUND"})
        );
    }

    #[test]
    fn database_detail_is_not_forwarded() {
        let err: ApiError =
            DatabaseError::Sqlx(sqlx::Error::Protocol("relation \"secret\" does not exist".into())).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("secret"));

        let busy: ApiError = DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(busy.status_code(), 503);
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(ApiError::from(AuthError::RateLimited { minutes: 15 }).status_code(), 429);
        assert_eq!(ApiError::from(AuthError::InvalidCredentials).status_code(), 401);
        assert_eq!(ApiError::from(AuthError::InvalidInvitation).status_code(), 400);
        assert_eq!(ApiError::from(DataError::RecordNotFound).status_code(), 404);
        assert_eq!(
            ApiError::from(DataError::Filter(FilterError::UnknownField("pw".into()))).error_code(),
            "VALIDATION_ERROR"
        );
    }
}
