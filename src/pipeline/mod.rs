//! Pipeline stages for a remote conversion job.
//!
//! Each submodule has one job. The network
//! layer can be swapped for a mock without touching graph construction or
//! the polling state machine.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ graph ──▶ driver ──────────────────────▶ resolve
//! (bytes)   (JobRequest)  submit · upload · poll        (download)
//!                            │
//!                        transport (HTTP / mock)
//! ```
//!
//! 1. [`source`]   : read local files into named payloads
//! 2. [`graph`]    : build and validate the typed task graph; no I/O
//! 3. [`transport`]: authenticated JSON calls, multipart uploads, downloads
//! 4. [`driver`]   : submit, upload, poll until terminal
//! 5. [`resolve`]  : pick the export file and fetch its bytes

pub mod driver;
pub mod graph;
pub mod resolve;
pub mod source;
pub mod transport;
