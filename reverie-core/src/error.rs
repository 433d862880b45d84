//! Error types for the Reverie core library.

use thiserror::Error;

/// Top-level error type for all Reverie core operations.
///
/// The emotion engine and memory cascade never fail; these variants only
/// surface from configuration loading and the snapshot boundary.
#[derive(Error, Debug)]
pub enum ReverieError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persisted snapshot was readable but inconsistent.
    #[error("Corrupt snapshot: {reason}")]
    CorruptSnapshot {
        /// What made the snapshot unusable.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ReverieError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ReverieError>;
