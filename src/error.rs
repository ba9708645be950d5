//! Error taxonomy of the auth core and its HTTP rendering.
//!
//! Every variant renders as `{"success": false, "message": ...}`. Internal
//! failures are logged where they are converted and always render the same
//! generic message.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::services::user_store::{StoreError, UniqueField};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Validation failed")]
    ValidationFailed(Vec<FieldError>),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Access denied. Please authenticate.")]
    Unauthenticated,

    #[error("Access denied. Insufficient permissions.")]
    Forbidden,

    #[error("Refresh token not provided")]
    MissingToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Cannot deactivate your own account")]
    CannotDeactivateSelf,

    #[error("Invalid role")]
    InvalidRole,

    #[error("Internal server error")]
    InternalError,
}

impl AuthError {
    pub fn validation(field: &str, message: &str) -> Self {
        AuthError::ValidationFailed(vec![FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }])
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ValidationFailed(_)
            | AuthError::InvalidOrExpiredToken
            | AuthError::CannotDeactivateSelf
            | AuthError::InvalidRole => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail | AuthError::DuplicateUsername => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::AccountDeactivated
            | AuthError::Unauthenticated
            | AuthError::MissingToken
            | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserNotFound | AuthError::NotificationNotFound => StatusCode::NOT_FOUND,
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        if let AuthError::ValidationFailed(errors) = self {
            body["errors"] = serde_json::json!(errors);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |err| FieldError {
                    field: field.clone(),
                    message: err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", err.code)),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        tracing::warn!(?fields, "Validation errors");
        AuthError::ValidationFailed(fields)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::Email) => AuthError::DuplicateEmail,
            StoreError::Duplicate(UniqueField::Username) => AuthError::DuplicateUsername,
            StoreError::Database(detail) => {
                tracing::error!(%detail, "Credential store failure");
                AuthError::InternalError
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::error!(error = ?err, "Token signing failed");
        AuthError::InternalError
    }
}
