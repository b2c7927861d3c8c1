//! Error types for qcal-fit
//!
//! An empty search result is not an error: the search returns `Option`.

use thiserror::Error;

/// Main error type for qcal-fit
#[derive(Error, Debug)]
pub enum Error {
    /// Measurement source missing, unreadable, or structurally invalid
    #[error("Data error: {0}")]
    Data(String),

    /// A constructed candidate violated the overapproximation postcondition
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    /// Configuration and shared errors
    #[error(transparent)]
    Common(#[from] qcal_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type using qcal-fit Error
pub type Result<T> = std::result::Result<T, Error>;
