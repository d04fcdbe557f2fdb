//! Error types for Verdict Hub
//!
//! Expected workflow conditions (duplicate pending reclamation, confirming a
//! terminal reclamation, peer sync exhaustion) are typed variants rather than
//! panics or catch-all strings, so callers can branch on them.

use hyper::StatusCode;

/// Main error type for Verdict Hub operations
#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Item descriptor could not be parsed as a URI with scheme + authority
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// An unprocessed reclamation already exists for this (itemHash, threatType)
    #[error("Duplicate pending reclamation: {0}")]
    DuplicatePending(String),

    /// Confirmation targeted a reclamation that is already terminal
    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    /// Peer authority unreachable or rejecting after all retry attempts
    #[error("Peer sync failed: {0}")]
    Sync(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VerdictError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidLocator(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicatePending(_) => StatusCode::CONFLICT,
            Self::AlreadyProcessed(_) => StatusCode::CONFLICT,
            Self::Sync(_) => StatusCode::BAD_GATEWAY,
            Self::WebSocket(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidLocator(_) => "invalid_locator",
            Self::DuplicatePending(_) => "duplicate_pending",
            Self::AlreadyProcessed(_) => "already_processed",
            Self::Sync(_) => "sync_failed",
            Self::WebSocket(_) => "websocket_error",
            Self::Database(_) => "database_error",
            Self::Internal(_) => "internal_error",
            Self::Config(_) => "config_error",
        }
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for VerdictError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for VerdictError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for VerdictError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for VerdictError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<mongodb::error::Error> for VerdictError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for Verdict Hub operations
pub type Result<T> = std::result::Result<T, VerdictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_variants_map_to_409() {
        let dup = VerdictError::DuplicatePending("h/Phishing".into());
        let done = VerdictError::AlreadyProcessed("42".into());
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);
        assert_eq!(done.status_code(), StatusCode::CONFLICT);
        assert_ne!(dup.code(), done.code());
    }

    #[test]
    fn test_sync_is_bad_gateway() {
        let err = VerdictError::Sync("3 attempts exhausted".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "sync_failed");
    }
}
