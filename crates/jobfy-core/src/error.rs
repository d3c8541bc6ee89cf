use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error types for JobFy.
#[derive(Error, Debug)]
pub enum AppError {
    /// The scrape request was malformed (no sites, unknown site ids).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Credentials were missing or rejected by the site.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The site refused service (HTTP 403/429 or an anti-bot page).
    #[error("Blocked: {0}")]
    BlockedError(String),

    /// Network/connection error or a transient server failure.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The response could not be turned into job records.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A request could not be built or the HTTP client could not be created.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Unknown run or site id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid adapter registration or runtime configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The work was abandoned because its run was cancelled.
    #[error("Run cancelled")]
    Cancelled,

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Blocks are retried because sites usually lift 429s after a pause.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::BlockedError(_)
        )
    }

    /// The per-site outcome kind this error is reported as.
    pub fn site_error_kind(&self) -> SiteErrorKind {
        match self {
            AppError::AuthenticationError(_) => SiteErrorKind::AuthenticationError,
            AppError::BlockedError(_) => SiteErrorKind::BlockedError,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::HttpError(_) => {
                SiteErrorKind::NetworkError
            }
            AppError::ParseError(_) | AppError::SerializationError(_) => SiteErrorKind::ParseError,
            AppError::Cancelled => SiteErrorKind::Cancelled,
            AppError::ValidationError(_)
            | AppError::NotFound(_)
            | AppError::ConfigError(_)
            | AppError::Generic(_) => SiteErrorKind::Internal,
        }
    }
}

/// Why a single site produced no jobs within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteErrorKind {
    AuthenticationError,
    BlockedError,
    NetworkError,
    ParseError,
    Cancelled,
    /// Adapter or configuration bug; never produced by the remote site.
    Internal,
}

impl SiteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteErrorKind::AuthenticationError => "AuthenticationError",
            SiteErrorKind::BlockedError => "BlockedError",
            SiteErrorKind::NetworkError => "NetworkError",
            SiteErrorKind::ParseError => "ParseError",
            SiteErrorKind::Cancelled => "Cancelled",
            SiteErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for SiteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
