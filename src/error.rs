//! Error types for the edgequake-text2diagram library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`DiagramError`] — **Fatal**: the run cannot proceed at all (input file
//!   missing, no API key configured, output directory cannot be created).
//!   Returned as `Err(DiagramError)` from the top-level `convert*` functions.
//!
//! * [`GenerationFailure`] — **Non-fatal**: one diagram could not be produced
//!   (rate limit never cleared, backend refused, stream carried no image) but
//!   the run as a whole continues. Stored inside
//!   [`crate::output::WorkflowResult`] and [`crate::output::DiagramOutput`].
//!
//! * [`BackendError`] — a single attempt against the image backend failed.
//!   The generation client inspects it to decide whether to back off and retry
//!   or to give up on the item.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the edgequake-text2diagram library.
///
/// Per-diagram failures use [`GenerationFailure`] and are stored in the
/// output types rather than propagated here.
#[derive(Debug, Error)]
pub enum DiagramError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but could not be read (a directory, an I/O fault).
    #[error("Failed to read input '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid UTF-8 text.
    #[error("Input file '{path}' is not valid UTF-8 text")]
    InvalidUtf8 { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// No API key in the config or the environment.
    #[error(
        "No API key configured for the image backend.\n\
Set GOOGLE_API_KEY (or GEMINI_API_KEY) in the environment or in a .env file."
    )]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the batch output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single diagram.
///
/// In batch mode the orchestrator records it against the workflow's title
/// and moves on to the next workflow.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum GenerationFailure {
    /// The response stream completed without any image payload.
    #[error("No image generated after {attempts} attempt(s)")]
    NoImage { attempts: u32 },

    /// Every attempt in the retry budget was rate-limited.
    #[error("Rate limit persisted after {attempts} attempt(s): {detail}")]
    RateLimitExhausted { attempts: u32, detail: String },

    /// The backend failed with a non-rate-limit error; not retried.
    #[error("Backend error on attempt {attempts}: {detail}")]
    Backend { attempts: u32, detail: String },

    /// The image was received but could not be written to disk.
    #[error("Failed to write diagram '{path}' after {attempts} attempt(s): {detail}")]
    WriteFailed {
        path: PathBuf,
        attempts: u32,
        detail: String,
    },
}

/// Failure of a single request against an [`crate::backend::ImageBackend`].
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend asked us to slow down.
    ///
    /// `retry_after` carries the server's suggested wait when it gave one;
    /// `None` means the caller falls back to its default backoff.
    #[error("Rate limited: {detail}")]
    RateLimited {
        retry_after: Option<Duration>,
        detail: String,
    },

    /// Non-success response that is not a rate limit.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Connection, TLS or stream framing failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, BackendError::RateLimited { .. })
    }

    /// Server-suggested wait, if this is a rate limit that carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
