//! Shared error and result types for Astra

use hyper::StatusCode;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AstraError>;

/// Errors produced by Astra components
#[derive(Debug, Error)]
pub enum AstraError {
    /// MongoDB connection or query failure
    #[error("Database error: {0}")]
    Database(String),

    /// Missing or invalid credentials on a request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A referenced document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request (bad JSON, missing fields, bad query params)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport failure (body read, upgrade, serialization)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Google OAuth token exchange or People API failure
    #[error("Google OAuth error: {0}")]
    GoogleAuth(String),

    /// Julep task-runner API failure
    #[error("Julep error: {0}")]
    Julep(String),

    /// The user has no linked task-runner account
    #[error("Account not linked to task runner: {0}")]
    UnlinkedAccount(String),

    /// ElevenLabs API or session failure
    #[error("ElevenLabs error: {0}")]
    ElevenLabs(String),

    /// Task template or prompt template failure (missing file, bad YAML)
    #[error("Template error: {0}")]
    Template(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AstraError {
    /// HTTP status code this error maps to at the route layer
    pub fn status_code(&self) -> StatusCode {
        match self {
            AstraError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AstraError::NotFound(_) => StatusCode::NOT_FOUND,
            AstraError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AstraError::GoogleAuth(_) => StatusCode::BAD_GATEWAY,
            AstraError::Julep(_) | AstraError::ElevenLabs(_) => StatusCode::BAD_GATEWAY,
            AstraError::UnlinkedAccount(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AstraError::Database(_) => "DATABASE_ERROR",
            AstraError::Unauthorized(_) => "UNAUTHORIZED",
            AstraError::NotFound(_) => "NOT_FOUND",
            AstraError::BadRequest(_) => "BAD_REQUEST",
            AstraError::Config(_) => "CONFIG_ERROR",
            AstraError::Http(_) => "HTTP_ERROR",
            AstraError::GoogleAuth(_) => "GOOGLE_AUTH_ERROR",
            AstraError::Julep(_) => "JULEP_ERROR",
            AstraError::UnlinkedAccount(_) => "UNLINKED_ACCOUNT",
            AstraError::ElevenLabs(_) => "ELEVENLABS_ERROR",
            AstraError::Template(_) => "TEMPLATE_ERROR",
            AstraError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for AstraError {
    fn from(e: std::io::Error) -> Self {
        AstraError::Internal(format!("I/O error: {}", e))
    }
}

impl From<serde_json::Error> for AstraError {
    fn from(e: serde_json::Error) -> Self {
        AstraError::Http(format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AstraError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AstraError::NotFound("user".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AstraError::UnlinkedAccount("u-1".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AstraError::Julep("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AstraError::UnlinkedAccount("x".into()).code(), "UNLINKED_ACCOUNT");
        assert_eq!(AstraError::Database("x".into()).code(), "DATABASE_ERROR");
    }
}
