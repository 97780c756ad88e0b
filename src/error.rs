//! Error types for the quiz2qti library.
//!
//! A single enum, [`QuizError`], covers every way a conversion episode or an
//! export can fail. None of them are fatal to the process: each one leaves the
//! workflow in a state the user can recover from (fix the input, retry the
//! conversion, confirm the export again).
//!
//! Variants are grouped by where the failure originates:
//!
//! * **Input**: the user supplied nothing, both inputs at once, or a file that
//!   cannot be read. Raised before any request is sent.
//! * **Remote**: the conversion service failed, timed out, or the request was
//!   cancelled because a newer episode superseded it.
//! * **Workflow / output**: export requested at the wrong time, or the
//!   package could not be written to disk.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown when text and a file are both populated at convert time.
pub const BOTH_INPUTS_MESSAGE: &str = "Please provide either quiz content or a file, not both.";

/// All errors returned by the quiz2qti library.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Text and file were both populated when a conversion was requested.
    #[error("{}", BOTH_INPUTS_MESSAGE)]
    Validation,

    /// Conversion requested with neither text nor a file.
    #[error("Nothing to convert: paste quiz text or select a file first.")]
    EmptyInput,

    /// Selected file does not exist.
    #[error("Quiz file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the selected file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while loading the selected file.
    #[error("Failed to read quiz file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// Network failure or non-success response from the conversion service.
    #[error("Request to {endpoint} failed: {reason}\nCheck the conversion service is running and try again.")]
    Request { endpoint: String, reason: String },

    /// The conversion service did not answer within the configured timeout.
    #[error("Request to {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    /// The request was abandoned because the workflow moved on.
    #[error("Request to {endpoint} was cancelled")]
    Cancelled { endpoint: String },

    // ── Workflow errors ───────────────────────────────────────────────────
    /// `finalize()` called without a completed preview episode.
    #[error("No completed preview to export. Convert the quiz first.")]
    NothingToExport,

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the downloaded package.
    #[error("Failed to write package '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    /// True for failures that came from talking to the conversion service.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            QuizError::Request { .. } | QuizError::Timeout { .. } | QuizError::Cancelled { .. }
        )
    }

    /// True for failures raised by input validation, before any request.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            QuizError::Validation
                | QuizError::EmptyInput
                | QuizError::FileNotFound { .. }
                | QuizError::PermissionDenied { .. }
                | QuizError::FileRead { .. }
        )
    }

    pub(crate) fn request(endpoint: &str, reason: impl Into<String>) -> Self {
        QuizError::Request {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}
