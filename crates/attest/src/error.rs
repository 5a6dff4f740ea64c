//! Error types for the attest harness

use thiserror::Error;

/// Result type alias using the attest Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced while driving the system under test.
///
/// `Mismatch` carries a fully rendered, multi-line failure block (request
/// signature, expected vs. actual, stage-supplied help text) and is what a
/// failing `assert` returns. The remaining variants are infrastructure
/// failures: they abort the operation that hit them rather than being folded
/// into a matcher mismatch.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Mismatch(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("process {0:?} not found")]
    ProcessNotFound(String),

    #[error("{0}")]
    ProcessStart(String),

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
