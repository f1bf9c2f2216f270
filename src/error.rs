//! Error types for the cloudconvert-jobs library.
//!
//! Every public operation returns `Result<_, ConvertError>`. There is no
//! partial-success state: a conversion either yields the final bytes or
//! fails with exactly one of these variants, and nothing inside the crate
//! retries. Callers that want another attempt re-invoke the operation,
//! which creates a fresh remote job.
//!
//! The variants fall into three groups:
//!
//! * **Caller contract**: [`ConvertError::InvalidGraph`],
//!   [`ConvertError::InvalidConfig`], [`ConvertError::InvalidUrl`]: the
//!   request could never have succeeded.
//! * **Remote outcome**: [`ConvertError::RemoteApi`],
//!   [`ConvertError::JobFailed`], [`ConvertError::NoResult`]: the service
//!   answered, but not with a usable result.
//! * **Local / transport**: network failures, timeouts, cancellation and
//!   file-system errors.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the cloudconvert-jobs library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Request construction ──────────────────────────────────────────────
    /// An endpoint or upload URL could not be parsed.
    #[error("Invalid URL '{url}'")]
    InvalidUrl { url: String },

    /// The task graph violates the builder contract (duplicate node,
    /// dangling input reference, no export task).
    #[error("Invalid task graph: {0}")]
    InvalidGraph(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upload ────────────────────────────────────────────────────────────
    /// Multipart upload was rejected, or the upload target was missing.
    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    // ── Remote API ────────────────────────────────────────────────────────
    /// A JSON API call returned a non-2xx status.
    ///
    /// `message` comes from the `{"message": …}` error body when present,
    /// otherwise it is `"HTTP <status>"`.
    #[error("{message}")]
    RemoteApi { message: String },

    /// The remote job reached the `error` status.
    #[error("{message}")]
    JobFailed { message: String },

    /// Polling gave up before the job reached a terminal status.
    #[error("Job did not finish within {secs}s ({polls} polls)")]
    JobTimeout { secs: u64, polls: u32 },

    /// The finished job exposes no downloadable export file.
    #[error("Job '{job_id}' finished without a downloadable result")]
    NoResult { job_id: String },

    /// The caller cancelled the local polling loop.
    #[error("Conversion cancelled")]
    Cancelled,

    // ── Transport ─────────────────────────────────────────────────────────
    /// Connection, TLS or per-request timeout failure.
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// A response body did not have the expected JSON shape.
    #[error("Unexpected response for {context}: {detail}")]
    Decode { context: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    /// True when the remote service itself rejected or failed the work.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ConvertError::RemoteApi { .. }
                | ConvertError::JobFailed { .. }
                | ConvertError::NoResult { .. }
        )
    }

    pub(crate) fn network(err: reqwest::Error) -> Self {
        ConvertError::Network {
            reason: err.to_string(),
        }
    }

    pub(crate) fn decode(context: impl Into<String>, err: serde_json::Error) -> Self {
        ConvertError::Decode {
            context: context.into(),
            detail: err.to_string(),
        }
    }
}
