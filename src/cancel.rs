//! Cooperative cancellation of the local polling loop.
//!
//! The remote API has no cancel call for a running job, so cancelling only
//! stops *our* side: the driver drops any in-flight upload or status call,
//! stops polling and returns [`crate::ConvertError::Cancelled`]. The remote
//! job runs to completion and its result expires unclaimed.

use std::sync::Arc;
use tokio::sync::watch;

/// Sender side: call [`CancelHandle::cancel`] to stop the paired token.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiver side, raced by the driver against uploads, polls and sleeps.
#[derive(Clone, Debug)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// A linked handle/token pair.
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(Arc::new(tx)), CancelToken(rx))
    }

    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, token) = Self::new();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled; pending forever if the handle was dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        let closed = rx.wait_for(|c| *c).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
