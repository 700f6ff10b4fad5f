use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::Provider;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    RateLimited(String),
    /// Bad or missing input field, including failed numeric coercion.
    Validation { field: String, message: String },
    /// A provider adapter call failed during a create/delete.
    Provider {
        provider: Provider,
        operation: String,
        cause: String,
    },
    /// The account's OAuth session is missing or broken.
    LinkRequired {
        account_id: i64,
        redirect_url: Option<String>,
        message: String,
    },
    Internal(String),
    Database(sqlx::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The offending field for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            AppError::Validation { field, message } => {
                write!(f, "Validation Error: {field}: {message}")
            }
            AppError::Provider {
                provider,
                operation,
                cause,
            } => write!(f, "{provider} {operation} failed: {cause}"),
            AppError::LinkRequired {
                account_id,
                message,
                ..
            } => write!(f, "Account {account_id} is not linked: {message}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, json!({ "error": msg }))
            }
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("{field}: {message}"), "field": field }),
            ),
            AppError::Provider {
                provider,
                operation,
                cause,
            } => {
                tracing::warn!("{provider} {operation} failed: {cause}");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": format!("{provider} {operation} failed: {cause}"),
                        "provider": provider,
                        "operation": operation,
                    }),
                )
            }
            AppError::LinkRequired {
                account_id,
                redirect_url,
                message,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "error": format!("Account {account_id} is not linked: {message}"),
                    "accountID": account_id,
                    "redirectURL": redirect_url,
                }),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}
