//! Error types for Redfish client operations

use std::time::Duration;

use thiserror::Error;

/// Longest response body snippet carried inside an error
const BODY_SNIPPET_LEN: usize = 500;

/// Result type alias for Redfish client operations
pub type Result<T> = std::result::Result<T, RedfishError>;

/// Errors that can occur during Redfish client operations
#[derive(Error, Debug)]
pub enum RedfishError {
    /// Missing or invalid endpoint, config file or URL
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login, logout, or an operation attempted without a session
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network or HTTP layer failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Firmware image could not be read or was rejected
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Task reached a terminal failure state
    #[error("Task {task_uri} ended in state {state}: {message}")]
    TaskFailed {
        task_uri: String,
        state: String,
        message: String,
    },

    /// Polling deadline elapsed before a terminal state was observed
    #[error("Timed out after {elapsed:?} waiting for {operation}")]
    TaskTimeout {
        operation: String,
        elapsed: Duration,
    },

    /// Failed to parse response
    #[error("Failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },
}

/// Transport-level failures. Never retried.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request exceeded the configured timeout
    #[error("{method} {url} timed out")]
    Timeout { method: String, url: String },

    /// Connection could not be established or was dropped
    #[error("{method} {url} connection failed: {reason}")]
    ConnectionFailed {
        method: String,
        url: String,
        reason: String,
    },

    /// Server answered with a non-2xx status
    #[error("{method} {url} returned HTTP {code}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        code: u16,
        body: String,
    },
}

/// Coarse classification of a [`TransportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionFailed,
    HttpStatus,
}

impl TransportError {
    /// Build an `HttpStatus` error, trimming the body to a diagnostic snippet
    pub fn http_status(
        method: impl Into<String>,
        url: impl Into<String>,
        code: u16,
        body: &str,
    ) -> Self {
        Self::HttpStatus {
            method: method.into(),
            url: url.into(),
            code,
            body: snippet(body),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::ConnectionFailed { .. } => TransportErrorKind::ConnectionFailed,
            Self::HttpStatus { .. } => TransportErrorKind::HttpStatus,
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl RedfishError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create an upload error
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    /// HTTP status code carried by a transport error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status_code(),
            _ => None,
        }
    }

    /// True when the server answered 404
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// True when the server refused the session token (401/403)
    pub fn is_session_rejected(&self) -> bool {
        matches!(self.status_code(), Some(401) | Some(403))
    }
}

impl From<url::ParseError> for RedfishError {
    fn from(e: url::ParseError) -> Self {
        Self::Configuration(format!("Invalid URL: {}", e))
    }
}

/// Trim a response body to at most [`BODY_SNIPPET_LEN`] bytes on a char boundary
pub(crate) fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
