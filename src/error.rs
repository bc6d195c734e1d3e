//! Error types for api-harvest
//!
//! This module provides the error taxonomy of a harvest run:
//! - Source errors (HTTP status, transport, undecodable pages)
//! - Storage errors (Parquet checkpoint and CSV artifact I/O)
//! - Schema errors raised while projecting or transforming tables
//! - A stable mapping from every error to a machine-readable code and a
//!   process exit code

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for api-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for api-harvest
///
/// Every failure inside a run is carried to the caller as one of these
/// variants. The binary turns it into an exit code through [`ToExitCode`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "source.page_size")
        key: Option<String>,
    },

    /// Request against the remote data source failed
    #[error("source request error: {0}")]
    Source(#[from] SourceError),

    /// Reading or writing a durable artifact failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The accumulated records or a stored table do not fit the expected schema
    #[error("schema error: {0}")]
    Schema(String),

    /// Arrow kernel failure while building or transforming a table
    #[error("table error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before it completed
    #[error("run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while requesting a page from the remote source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source answered with a non-success status code
    #[error("page {page} returned HTTP {status} from {url}")]
    Status {
        /// The 1-based page number that was requested
        page: u32,
        /// The HTTP status code returned by the source
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// The request could not be sent or the response could not be received
    #[error("transport failure on page {page}: {source}")]
    Transport {
        /// The 1-based page number that was requested
        page: u32,
        /// The underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not a JSON array of objects
    #[error("page {page} could not be decoded: {reason}")]
    Decode {
        /// The 1-based page number that was requested
        page: u32,
        /// Why the body was rejected
        reason: String,
    },
}

impl SourceError {
    /// Page number the failed request was issued for
    pub fn page(&self) -> u32 {
        match self {
            SourceError::Status { page, .. }
            | SourceError::Transport { page, .. }
            | SourceError::Decode { page, .. } => *page,
        }
    }
}

/// Errors raised by the columnar checkpoint and the CSV sink
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing an artifact failed
    #[error("failed to write {path}: {reason}")]
    Write {
        /// The location being written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Reading an artifact failed
    #[error("failed to read {path}: {reason}")]
    Read {
        /// The location being read
        path: PathBuf,
        /// The reason the read failed
        reason: String,
    },

    /// The location holds no complete checkpoint
    #[error("no complete table at {path}")]
    Incomplete {
        /// The location that was expected to hold a table
        path: PathBuf,
    },
}

impl StorageError {
    /// Build a write error from any displayable cause
    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        StorageError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a read error from any displayable cause
    pub fn read(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        StorageError::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl Error {
    /// Create a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Map errors to stable process exit codes and machine-readable codes
pub trait ToExitCode {
    /// Process exit code for this error
    fn exit_code(&self) -> i32;

    /// Machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } => 2,

            Error::Source(_) => 10,

            Error::Storage(_) | Error::Io(_) => 11,

            Error::Schema(_) | Error::Arrow(_) | Error::Serialization(_) => 12,

            Error::Cancelled => 13,

            Error::Other(_) => 1,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Source(e) => match e {
                SourceError::Status { .. } => "source_status",
                SourceError::Transport { .. } => "source_transport",
                SourceError::Decode { .. } => "source_decode",
            },
            Error::Storage(e) => match e {
                StorageError::Write { .. } => "storage_write",
                StorageError::Read { .. } => "storage_read",
                StorageError::Incomplete { .. } => "storage_incomplete",
            },
            Error::Schema(_) => "schema_error",
            Error::Arrow(_) => "table_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}
