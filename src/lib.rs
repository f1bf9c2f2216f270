//! # cloudconvert-jobs
//!
//! Drive a job-based remote conversion API to completion: build the task
//! graph, upload the source bytes to pre-signed forms, poll the job until it
//! is terminal, and download the exported result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SourceFile(s)
//!  │
//!  ├─ 1. Build    typed task graph (convert / merge / capture / OCR)
//!  ├─ 2. Submit   POST /jobs
//!  ├─ 3. Upload   GET /tasks/{id} → multipart POST to the signed form
//!  ├─ 4. Poll     GET /jobs/{id} every 2 s until finished / error / timeout
//!  └─ 5. Fetch    first file of the export/url task → bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloudconvert_jobs::{ClientConfig, ConvertClient, SourceFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads CLOUDCONVERT_API_KEY (and optional CLOUDCONVERT_BASE_URL)
//!     let client = ConvertClient::new(ClientConfig::from_env()?)?;
//!     let doc = SourceFile::from_path("report.docx").await?;
//!     let pdf = client.convert_to_pdf(doc).await?;
//!     pdf.save("report.pdf").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ccjob` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cloudconvert-jobs = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::{CancelHandle, CancelToken};
pub use config::{ApiKey, ClientConfig, ClientConfigBuilder};
pub use convert::ConvertClient;
pub use error::ConvertError;
pub use format::{input_format_for, output_filename, ConversionFormat, DocumentKind};
pub use model::{Job, ResultFile, Status, Task, TaskDetail, TaskResult, UploadTarget};
pub use output::ConvertedFile;
pub use pipeline::driver::{JobDriver, JobState};
pub use pipeline::graph::{Import, JobRequest, PendingUpload, TaskGraph, TaskSpec};
pub use pipeline::source::SourceFile;
pub use pipeline::transport::{HttpTransport, Transport};
pub use progress::{JobObserver, NoopObserver, SharedObserver};
