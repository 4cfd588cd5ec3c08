//! Error types for the imessage-export library.
//!
//! Only conditions that abort a run live here. Per-record problems (a missing
//! attachment blob, an undecodable timestamp, a chat without a participant)
//! are absorbed where they happen and show up in the exported document and
//! the run report instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The message store could not be opened
    #[error("Failed to open message store at {path}: {source}")]
    StoreOpen {
        /// Path that was handed to SQLite
        path: PathBuf,
        /// Underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// A query against the message store failed
    #[error("Message store query failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// Writing the output tree failed
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A user-supplied path failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience type alias for Result with `ExportError`
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_open_error_names_the_path() {
        let err = ExportError::StoreOpen {
            path: PathBuf::from("/tmp/missing/sms.db"),
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(err.to_string().contains("/tmp/missing/sms.db"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: ExportError = io.into();
        assert!(matches!(err, ExportError::Io(_)));
    }
}
