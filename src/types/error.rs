//! Error types for Lectern
//!
//! Only durable-store failures are meant to reach a caller of the read path.
//! Cache and counter failures are absorbed (logged) by the services; they
//! surface as [`LecternError::Cache`] only on write paths that choose to
//! report them.

use hyper::StatusCode;

use crate::cache::CacheBackendError;

/// Main error type for Lectern operations
#[derive(Debug, thiserror::Error)]
pub enum LecternError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LecternError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }

    /// Whether this is a "does not exist" outcome rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for LecternError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for LecternError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for LecternError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<redis::RedisError> for LecternError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<CacheBackendError> for LecternError {
    fn from(err: CacheBackendError) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Result type alias for Lectern operations
pub type Result<T> = std::result::Result<T, LecternError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            LecternError::NotFound("article 1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LecternError::Conflict("title".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            LecternError::Database("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            LecternError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_status_code_and_body() {
        let (status, body) = LecternError::NotFound("article 42".into()).into_status_code_and_body();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not found: article 42");
    }

    #[test]
    fn test_cache_backend_error_converts_to_cache() {
        let err: LecternError = CacheBackendError::Command("READONLY".into()).into();
        assert!(matches!(err, LecternError::Cache(_)));
        assert!(!err.is_not_found());
    }
}
