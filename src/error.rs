//! Unified application error model and mapping helpers.
//! Every failure carries an operator-facing message; the client-facing body is
//! deliberately generic so that callers cannot distinguish why a request was
//! refused. The two channels never mix.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { message: String },
    Auth { message: String },
    Denied { message: String },
    Explore { message: String },
    Internal { message: String },
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message }
            | AppError::Auth { message }
            | AppError::Denied { message }
            | AppError::Explore { message }
            | AppError::Internal { message } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self { AppError::Validation { message: msg.into() } }
    pub fn auth<S: Into<String>>(msg: S) -> Self { AppError::Auth { message: msg.into() } }
    pub fn denied<S: Into<String>>(msg: S) -> Self { AppError::Denied { message: msg.into() } }
    pub fn explore<S: Into<String>>(msg: S) -> Self { AppError::Explore { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::Denied { .. } => StatusCode::FORBIDDEN,
            AppError::Explore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body the client sees. Fixed per variant; never includes the cause.
    pub fn client_body(&self) -> serde_json::Value {
        match self {
            AppError::Validation { .. } => json!({ "error": "Validation Error" }),
            AppError::Auth { .. } => json!({ "error": "Login Failed" }),
            AppError::Denied { .. } => json!({ "error": "Access Denied" }),
            AppError::Explore { .. } => json!({ "error": "Failed to get directory contents" }),
            AppError::Internal { .. } => json!({ "error": "Server Error" }),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::debug!("request failed: {}", self.message());
        (self.http_status(), Json(self.client_body())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}
