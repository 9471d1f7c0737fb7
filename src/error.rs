//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the HTTP handlers and
//! the access/index modules, along with a mapper to HTTP status codes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed request payloads and invalid parameters.
    UserInput { code: String, message: String },
    /// The resolved path escapes the public root. Never retried.
    OutOfBounds { code: String, message: String },
    /// The path does not exist at decision time.
    NotFound { code: String, message: String },
    /// A folder key is required or the supplied key was rejected. The two
    /// cases intentionally share one message so callers cannot distinguish
    /// a wrong key from no key at all.
    Auth { code: String, message: String },
    /// Attempt to protect or hide the public root itself.
    InvalidTarget { code: String, message: String },
    /// A persisted index file failed to parse; the index loaded empty.
    ConfigCorrupt { code: String, message: String },
    /// Write-through to disk failed. In-memory state is already updated.
    Persistence { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::OutOfBounds { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Auth { code, .. }
            | AppError::InvalidTarget { code, .. }
            | AppError::ConfigCorrupt { code, .. }
            | AppError::Persistence { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::OutOfBounds { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Auth { message, .. }
            | AppError::InvalidTarget { message, .. }
            | AppError::ConfigCorrupt { message, .. }
            | AppError::Persistence { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn out_of_bounds(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::OutOfBounds { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn auth(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn invalid_target(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::InvalidTarget { code: code.into(), message: msg.into() } }
    pub fn config_corrupt(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::ConfigCorrupt { code: code.into(), message: msg.into() } }
    pub fn persistence(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Persistence { code: code.into(), message: msg.into() } }
    pub fn io(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// The canonical "authentication required" error. Used both when no key
    /// was supplied and when the supplied key was wrong.
    pub fn authentication_required() -> Self {
        AppError::auth("authentication_required", "Authentication required.")
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::OutOfBounds { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Auth { .. } => 401,
            AppError::InvalidTarget { .. } => 400,
            AppError::ConfigCorrupt { .. } => 500,
            AppError::Persistence { .. } => 500,
            AppError::Io { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound { code: "not_found".into(), message: err.to_string() },
            _ => AppError::Io { code: "io_error".into(), message: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::out_of_bounds("escape", "no").http_status(), 403);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::auth("auth", "no").http_status(), 401);
        assert_eq!(AppError::invalid_target("root", "no").http_status(), 400);
        assert_eq!(AppError::persistence("save", "disk full").http_status(), 500);
    }

    #[test]
    fn wrong_key_and_missing_key_present_identically() {
        let a = AppError::authentication_required();
        let b = AppError::authentication_required();
        assert_eq!(a.code_str(), b.code_str());
        assert_eq!(a.message(), b.message());
        assert_eq!(a.http_status(), b.http_status());
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = AppError::config_corrupt("folder_keys", "bad json");
        assert_eq!(format!("{}", e), "folder_keys: bad json");
    }
}
