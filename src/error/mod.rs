//! # Error Module
//!
//! Error types for the similarity engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Per-item failures stay local** - a bad file becomes an unscannable
//!   entry, never a scan-level error

use std::path::PathBuf;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while enumerating media or running a scan pass
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors that occur while hashing a single media item
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Failed to extract video frame from {path}: {reason}")]
    FrameExtraction { path: PathBuf, reason: String },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Failed to read media file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the persistent stores (fingerprints, denials, scan results)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Store corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Failed to serialize stored data: {0}")]
    SerializationFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        assert!(error.to_string().contains("/photos/vacation"));
    }

    #[test]
    fn hash_error_includes_path_and_reason() {
        let error = HashError::FrameExtraction {
            path: PathBuf::from("/videos/clip.mp4"),
            reason: "no video stream".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/videos/clip.mp4"));
        assert!(message.contains("no video stream"));
    }

    #[test]
    fn store_error_suggests_recovery() {
        let error = StoreError::Corrupted {
            path: PathBuf::from("/cache/engine.db"),
        };
        assert!(error.to_string().contains("Delete this file"));
    }

    #[test]
    fn sqlite_errors_become_query_failures() {
        let error: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(error, StoreError::QueryFailed(_)));
    }
}
