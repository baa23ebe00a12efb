//! Crate error types

use thiserror::Error;

/// Main corpus error type
#[derive(Debug, Error)]
pub enum CorpusError {
    // ========== Storage Errors ==========
    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    // ========== Validation Errors ==========
    /// Invalid hash format
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// Connection not found in the TOC
    #[error("connection not found: {0}")]
    ConnectionNotFound(i64),

    /// Invalid certificate search pattern
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    // ========== External Tool Errors ==========
    /// Certificate rendering via the external codec failed
    #[error("codec error: {0}")]
    Codec(String),

    // ========== Pipeline Errors ==========
    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Data corruption detected
    #[error("data corruption: {0}")]
    Corruption(String),
}

/// Corpus result type alias
pub type CorpusResult<T> = Result<T, CorpusError>;

// Conversions from external errors

impl From<rusqlite::Error> for CorpusError {
    fn from(e: rusqlite::Error) -> Self {
        CorpusError::Storage(StorageError::Sqlite(e))
    }
}

impl From<std::io::Error> for CorpusError {
    fn from(e: std::io::Error) -> Self {
        CorpusError::Storage(StorageError::Io(e))
    }
}

impl From<hex::FromHexError> for CorpusError {
    fn from(e: hex::FromHexError) -> Self {
        CorpusError::InvalidHash(e.to_string())
    }
}

impl From<tokio::task::JoinError> for CorpusError {
    fn from(e: tokio::task::JoinError) -> Self {
        CorpusError::Internal(format!("task join failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Corruption("cert_hashes length 33".to_string());
        assert_eq!(err.to_string(), "data corruption: cert_hashes length 33");
    }

    #[test]
    fn test_corpus_error_wraps_storage() {
        let err = CorpusError::from(StorageError::Corruption("bad blob".to_string()));
        assert_eq!(err.to_string(), "storage error: data corruption: bad blob");
    }

    #[test]
    fn test_sqlite_error_converts_to_corpus_error() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err = CorpusError::from(sqlite_err);
        assert!(matches!(
            err,
            CorpusError::Storage(StorageError::Sqlite(_))
        ));
    }

    #[test]
    fn test_io_error_converts_to_storage_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing shard");
        let err = StorageError::from(io_err);
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn test_hex_error_converts_to_invalid_hash() {
        let err = CorpusError::from(hex::decode("zz").unwrap_err());
        assert!(matches!(err, CorpusError::InvalidHash(_)));
    }

    #[test]
    fn test_connection_not_found_display() {
        let err = CorpusError::ConnectionNotFound(42);
        assert_eq!(err.to_string(), "connection not found: 42");
    }
}
