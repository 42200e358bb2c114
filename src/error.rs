//! Unified client error model and mapping helpers.
//! Every network path (identity probes, collection and nested fetches, writes)
//! converts its failures into `AppError` so nothing escapes a sync cycle untyped.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Transport { code: String, message: String },
    Timeout { code: String, message: String },
    Auth { code: String, message: String },
    NotFound { code: String, message: String },
    Decode { code: String, message: String },
    Config { code: String, message: String },
    Server { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Timeout { code, .. }
            | AppError::Auth { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Decode { code, .. }
            | AppError::Config { code, .. }
            | AppError::Server { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Timeout { message, .. }
            | AppError::Auth { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Decode { message, .. }
            | AppError::Config { message, .. }
            | AppError::Server { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn transport<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn timeout<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Timeout { code: code.into(), message: msg.into() } }
    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn decode<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Decode { code: code.into(), message: msg.into() } }
    pub fn config<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn server<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Server { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map a non-success HTTP status (plus whatever body text came back) to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let msg = if body.is_empty() { format!("HTTP {}", status) } else { format!("HTTP {}: {}", status, body) };
        match status {
            401 | 403 => Self::auth("unauthorized", msg),
            404 => Self::not_found("not_found", msg),
            400 | 422 => Self::user("rejected", msg),
            500..=599 => Self::server("server_error", msg),
            _ => Self::transport("unexpected_status", msg),
        }
    }

    /// True for authorization-style failures (expired or missing session).
    pub fn is_auth(&self) -> bool { matches!(self, AppError::Auth { .. }) }

    pub fn is_timeout(&self) -> bool { matches!(self, AppError::Timeout { .. }) }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::timeout("timeout", err.to_string());
        }
        if let Some(status) = err.status() {
            return AppError::from_status(status.as_u16(), "");
        }
        if err.is_decode() {
            return AppError::decode("decode_error", err.to_string());
        }
        AppError::transport("transport_error", err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::decode("decode_error", err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        AppError::internal("internal", err.to_string())
    }
}
