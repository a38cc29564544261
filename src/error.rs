//! Error handler for emodiary.

use std::fmt;

use axum::extract::rejection::{
    FormRejection, JsonRejection, PathRejection, QueryRejection,
};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which of the two signed tokens an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("{}", .0.body_text())]
    Json(#[from] JsonRejection),

    #[error("{}", .0.body_text())]
    Form(#[from] FormRejection),

    #[error("{}", .0.body_text())]
    Query(#[from] QueryRejection),

    #[error("{}", .0.body_text())]
    Path(#[from] PathRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("{0}")]
    Conflict(String),

    /// Same message whether the email or the password was wrong.
    #[error("email or password is incorrect")]
    InvalidCredentials,

    #[error("this {kind} token is expired")]
    TokenExpired { kind: TokenKind },

    #[error("this {kind} token is not valid")]
    TokenInvalid { kind: TokenKind },

    #[error("missing or invalid 'Authorization' header")]
    Unauthorized,

    #[error("the google token is invalid")]
    InvalidIdentity,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("stored {collection} record {id} is corrupted: {details}")]
    CorruptRecord {
        collection: &'static str,
        id: String,
        details: String,
    },

    #[error("{service} is unavailable")]
    ServiceUnavailable {
        service: &'static str,
        details: String,
    },

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<BoxError>,
    },
}

impl ServerError {
    /// Wrap any error as an internal one.
    pub fn internal(
        details: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Internal {
            details: details.into(),
            source: Some(source.into()),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServerError::ServiceUnavailable { .. })
    }

    fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Form(_)
            | ServerError::Query(_)
            | ServerError::Path(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::InvalidCredentials
            | ServerError::TokenExpired { .. }
            | ServerError::TokenInvalid { .. }
            | ServerError::Unauthorized
            | ServerError::InvalidIdentity => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            },
            ServerError::Sql(_)
            | ServerError::CorruptRecord { .. }
            | ServerError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ServerError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::internal("failed to sign token", err)
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    fn new(message: &str) -> Self {
        Self {
            message: capitalize(message),
            errors: None,
        }
    }

    /// Automatically add errors field.
    fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ServerError::Validation(errors) => {
                ResponseError::new("there were validation errors with your request")
                    .errors(errors)
            },

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "database request failed");
                ResponseError::new("internal server error")
            },

            ServerError::CorruptRecord {
                collection,
                id,
                details,
            } => {
                tracing::error!(
                    %collection,
                    %id,
                    %details,
                    "data integrity fault on stored record"
                );
                ResponseError::new(&format!(
                    "this {collection} record format is not correct"
                ))
            },

            ServerError::ServiceUnavailable { service, details } => {
                tracing::warn!(%service, %details, "upstream service exhausted retries");
                ResponseError::new(&self.to_string())
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");
                ResponseError::new("internal server error")
            },

            _ => ResponseError::new(&self.to_string()),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("email or password is incorrect"), "Email or password is incorrect");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServerError::TokenExpired { kind: TokenKind::Access }.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::Conflict("Email is already exists".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::CorruptRecord {
                collection: "diary",
                id: "1".into(),
                details: "bad emotion".into(),
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(
            ServerError::ServiceUnavailable {
                service: "translator",
                details: "timeout".into(),
            }
            .is_transient()
        );
        assert!(!ServerError::NotFound("gone".into()).is_transient());
    }

    #[test]
    fn test_token_messages() {
        let err = ServerError::TokenExpired { kind: TokenKind::Refresh };
        assert_eq!(err.to_string(), "this refresh token is expired");
        let err = ServerError::TokenInvalid { kind: TokenKind::Access };
        assert_eq!(err.to_string(), "this access token is not valid");
    }
}
