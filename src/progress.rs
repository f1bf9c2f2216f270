//! Observer trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] to follow a job as it
//! moves through submit → upload → poll → download. The CLI uses this to
//! drive its spinner; a service might forward the events to a channel.
//!
//! # Example
//!
//! ```rust
//! use cloudconvert_jobs::{ClientConfig, JobObserver, Status};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter(AtomicU32);
//!
//! impl JobObserver for PollCounter {
//!     fn on_poll(&self, _job_id: &str, attempt: u32, status: &Status) {
//!         self.0.store(attempt, Ordering::SeqCst);
//!         eprintln!("poll #{attempt}: {status}");
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .api_key("key")
//!     .observer(Arc::new(PollCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::model::Status;
use std::sync::Arc;

/// Called by the job driver as it moves a job forward.
///
/// Implementations must be `Send + Sync`: uploads for a merge run
/// concurrently, so `on_upload_complete` may be called from several tasks
/// at once. Every method defaults to a no-op.
pub trait JobObserver: Send + Sync {
    /// The job was created remotely.
    fn on_job_submitted(&self, job_id: &str, task_count: usize) {
        let _ = (job_id, task_count);
    }

    /// One upload finished. `done` counts completed uploads so far.
    fn on_upload_complete(&self, filename: &str, done: usize, total: usize) {
        let _ = (filename, done, total);
    }

    /// A status poll returned. `attempt` is 1-based.
    fn on_poll(&self, job_id: &str, attempt: u32, status: &Status) {
        let _ = (job_id, attempt, status);
    }

    /// The job reached `finished`.
    fn on_job_finished(&self, job_id: &str) {
        let _ = job_id;
    }

    /// The result bytes were downloaded.
    fn on_result_downloaded(&self, filename: &str, bytes: usize) {
        let _ = (filename, bytes);
    }
}

/// An observer that ignores every event, for callers that need a value to
/// pass. A config with no observer set (`None`) skips the callbacks entirely.
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type SharedObserver = Arc<dyn JobObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracking {
        uploads: AtomicUsize,
        polls: AtomicUsize,
    }

    impl JobObserver for Tracking {
        fn on_upload_complete(&self, _filename: &str, _done: usize, _total: usize) {
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }

        fn on_poll(&self, _job_id: &str, _attempt: u32, _status: &Status) {
            self.polls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_job_submitted("j", 3);
        o.on_upload_complete("a.pdf", 1, 2);
        o.on_poll("j", 1, &Status::Processing);
        o.on_job_finished("j");
        o.on_result_downloaded("out.pdf", 10);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let t = Tracking {
            uploads: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        };
        t.on_upload_complete("a", 1, 2);
        t.on_upload_complete("b", 2, 2);
        t.on_poll("j", 1, &Status::Waiting);
        t.on_job_finished("j");
        assert_eq!(t.uploads.load(Ordering::SeqCst), 2);
        assert_eq!(t.polls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: SharedObserver = Arc::new(NoopObserver);
        o.on_poll("j", 2, &Status::Finished);
    }
}
