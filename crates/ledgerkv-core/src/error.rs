//! Error types for LedgerKV operations
//!
//! Every failure surfaces to the immediate caller as a `StoreError`.
//! Nothing is retried internally. File-level variants carry the path
//! where the failure happened.

use std::path::PathBuf;

use thiserror::Error;

/// LedgerKV error types with file context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O operation failed (read, write, remove, sync)
    #[error("I/O error{}: {message} ({kind})", fmt_path(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// The codec could not serialize the mapping or the log
    #[error("Encode failed{}: {reason}", fmt_path(.path))]
    Encode {
        /// File the encoded bytes were destined for
        path: Option<PathBuf>,
        /// Codec error text
        reason: String,
    },

    /// A persisted file could not be decoded
    #[error("Corrupted file {}: {reason}", .path.display())]
    Corrupted {
        /// The malformed file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// CRC32C of an incremental frame did not match its header
    #[error(
        "Checksum mismatch in {} at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}",
        .path.display()
    )]
    ChecksumMismatch {
        /// File where checksum failed
        path: PathBuf,
        /// Checksum stored in the frame header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
        /// Byte offset of the frame
        offset: u64,
    },

    /// Configuration rejected by `StoreConfig::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl StoreError {
    /// Wrap an `io::Error` with the path it happened on.
    pub(crate) fn io(path: &std::path::Path, context: &str, err: std::io::Error) -> Self {
        StoreError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", context, err),
        }
    }
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for LedgerKV operations
pub type StoreResult<T> = Result<T, StoreError>;
