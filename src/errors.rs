//! Centralized error handling for RuDaLES
//!
//! Every fallible operation in the crate reports one of these variants
//! synchronously to its caller. Nothing is retried: local file I/O failures
//! are treated as deterministic.

use std::path::PathBuf;

/// Main error type for RuDaLES operations
#[derive(Debug, thiserror::Error)]
pub enum FieldIoError {
    /// Non-exact decomposition, invalid halo/shape, or an inconsistent request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An expected sub-domain, time or restart file is absent
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Fewer bytes than one record were available at the requested offset
    #[error(
        "Incomplete record in {} at timestep {timestep}: expected {expected} bytes, got {actual}",
        path.display()
    )]
    IncompleteRecord {
        path: PathBuf,
        timestep: usize,
        expected: usize,
        actual: usize,
    },

    /// Bracketed-mode length markers do not agree, or the record is cut
    /// short; a marker that could not be read is reported as -1
    #[error("Corrupt record: leading marker {leading} does not match trailing marker {trailing}")]
    CorruptRecord { leading: i64, trailing: i64 },

    /// The writer was invoked without a mandatory field and without auto-fill
    #[error("Missing field '{field}'. Enable an auto-fill policy to generate it.")]
    MissingField { field: String },

    /// Statistics computation errors
    #[error("Statistics computation error: {0}")]
    Statistics(String),

    /// The caller raised the abort signal between chunks
    #[error("Operation aborted by caller")]
    Aborted,

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Configuration or export (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FieldIoError {
    /// Shorthand for a [`FieldIoError::Configuration`] with a formatted message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type alias for RuDaLES operations
pub type Result<T> = std::result::Result<T, FieldIoError>;
