//! Error type definitions for strm-sync
//!
//! Provider failures split into transient and fatal, cache failures always abort with a
//! rollback, and filesystem failures are per-file unless they hit an output root.

use std::path::PathBuf;

use sandboxed_output::SandboxedFileError;
use thiserror::Error;

use crate::models::ContentDomain;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Provider API errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Catalog cache errors
    #[error("Cache integrity error: {0}")]
    CacheIntegrity(#[from] CacheIntegrityError),

    /// Artifact output errors
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A sync run already holds the domain lock
    #[error("Operation already in progress: {operation_type} on {resource}")]
    OperationInProgress {
        operation_type: String,
        resource: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by the provider client.
///
/// `Transient` failures are retried on the next scheduled run, `Fatal` ones abort the
/// domain run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout, 5xx or rate limiting
    #[error("Transient provider failure at {url}: {message}")]
    Transient { url: String, message: String },

    /// Rejected credentials, client errors or a malformed response shape
    #[error("Fatal provider failure at {url}: {message}")]
    Fatal { url: String, message: String },
}

/// Errors from the catalog cache. Any of these rolls the domain transaction back.
#[derive(Error, Debug)]
pub enum CacheIntegrityError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Migration failures
    #[error("Migration failed: {message}")]
    MigrationFailed { message: String },
}

/// Errors while materializing artifacts.
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// A single artifact could not be written or removed
    #[error("{operation} failed for '{path}': {source}")]
    File {
        operation: &'static str,
        path: String,
        #[source]
        source: SandboxedFileError,
    },

    /// The output root itself is unusable
    #[error("Output root {root:?} for {domain} is not writable: {source}")]
    Root {
        domain: ContentDomain,
        root: PathBuf,
        #[source]
        source: SandboxedFileError,
    },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: ToString>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create the busy signal returned when a domain is already syncing
    pub fn busy(domain: ContentDomain) -> Self {
        Self::OperationInProgress {
            operation_type: "sync".to_string(),
            resource: domain.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the busy signal
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::OperationInProgress { .. })
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::CacheIntegrity(CacheIntegrityError::Database(err))
    }
}

impl ProviderError {
    pub fn transient<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Transient {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn fatal<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Fatal {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classify an HTTP status that is not a success.
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        let message = format!("HTTP {status}");
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            Self::transient(url, message)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Self::fatal(url, format!("{message}: credentials rejected"))
        } else {
            Self::fatal(url, message)
        }
    }

    /// Classify a transport level failure.
    pub fn from_reqwest(err: &reqwest::Error, url: &str) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, url);
        }
        if err.is_decode() || err.is_builder() {
            Self::fatal(url, err.to_string())
        } else {
            // timeouts, connect failures and dropped bodies
            Self::transient(url, err.to_string())
        }
    }
}

impl FilesystemError {
    /// Whether this failure aborts the whole generation pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Root { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case(StatusCode::BAD_GATEWAY, true)]
    #[case(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case(StatusCode::UNAUTHORIZED, false)]
    #[case(StatusCode::FORBIDDEN, false)]
    #[case(StatusCode::NOT_FOUND, false)]
    fn test_status_classification(#[case] status: StatusCode, #[case] transient: bool) {
        let err = ProviderError::from_status(status, "http://provider/player_api.php");
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn test_busy_error() {
        let err = AppError::busy(ContentDomain::Series);
        assert!(err.is_busy());
        assert_eq!(
            err.to_string(),
            "Operation already in progress: sync on series"
        );
    }
}
