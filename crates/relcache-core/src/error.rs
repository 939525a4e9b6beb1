//! Error types for relcache.
//!
//! Errors fall into three groups:
//! - configuration errors, raised before any SQL reaches the database;
//! - backend errors, which wrap the driver error unmodified as their source;
//! - not-supported errors, for operations a backend refuses to perform.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the relcache library.
#[derive(Debug, Error)]
pub enum CacheError {
    // Configuration errors
    #[error("Duplicated scope: {scope}")]
    DuplicateScope { scope: String },

    #[error("Duplicated table: {table}")]
    DuplicateTable { table: String },

    #[error("Unsupported parameter style: {style}")]
    UnsupportedParamStyle { style: String },

    #[error("Value adapter expects {expected} column(s), got {actual}")]
    AdapterMismatch { expected: usize, actual: usize },

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Expected a {what} of {expected} column(s), got {actual}")]
    KeyArity {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("New scope is not allowed: {scope}")]
    ScopeNotAllowed { scope: String },

    #[error("Scope factory returned config for {configured}, requested {requested}")]
    ScopeConflict { requested: String, configured: String },

    #[error("Key {key} is different from value {value} of column {column}")]
    KeyConflict {
        column: String,
        key: String,
        value: String,
    },

    #[error("Invalid table config for {table}: {message}")]
    InvalidTableConfig { table: String, message: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("Invalid cache URI: {uri}")]
    InvalidUri { uri: String },

    #[error("No backend registered for scheme: {scheme}")]
    UnknownScheme { scheme: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Backend errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql::Error),

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Not-supported errors
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },
}

/// Result type alias for relcache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CacheError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        CacheError::InvalidValue {
            message: message.into(),
        }
    }

    /// Check if this error was raised by configuration checks.
    ///
    /// These are never retried: the same call fails the same way again.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CacheError::DuplicateScope { .. }
                | CacheError::DuplicateTable { .. }
                | CacheError::UnsupportedParamStyle { .. }
                | CacheError::AdapterMismatch { .. }
                | CacheError::MissingArgument(_)
                | CacheError::KeyArity { .. }
                | CacheError::ScopeNotAllowed { .. }
                | CacheError::ScopeConflict { .. }
                | CacheError::KeyConflict { .. }
                | CacheError::InvalidTableConfig { .. }
                | CacheError::InvalidValue { .. }
                | CacheError::InvalidUri { .. }
                | CacheError::UnknownScheme { .. }
                | CacheError::Config { .. }
        )
    }

    /// Check if this error came from the underlying database driver.
    pub fn is_backend_error(&self) -> bool {
        match self {
            CacheError::Database { .. } => true,
            #[cfg(feature = "postgres")]
            CacheError::Postgres(_) => true,
            #[cfg(feature = "mysql")]
            CacheError::Mysql(_) => true,
            _ => false,
        }
    }
}
