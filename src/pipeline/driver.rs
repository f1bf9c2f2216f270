//! Job driver: submit a graph, feed its uploads, poll it to a terminal state.
//!
//! ```text
//! Built ──▶ Submitted ──▶ Uploading ──▶ Polling ──▶ Finished
//!                │             │            │
//!                └─────────────┴────────────┴──────▶ Failed
//! ```
//!
//! Nothing here retries. A failed upload leaves the remote job orphaned (the
//! API has no cancel call), and the caller starts over with a new job.
//!
//! ## Polling
//!
//! The interval is fixed. The wall-clock budget starts at the first poll,
//! not at submission, so slow uploads do not eat into it. Independently of
//! time, the number of polls is capped (see
//! [`ClientConfig::effective_max_polls`]) so a server that keeps inventing
//! non-terminal statuses cannot keep us looping.

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::error::ConvertError;
use crate::model::{Data, Job, Status, TaskDetail, UploadTarget};
use crate::pipeline::graph::{JobRequest, PendingUpload};
use crate::pipeline::source::SourceFile;
use crate::pipeline::transport::{request_json, Transport};
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use reqwest::Method;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Where a job is in the driver's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Built,
    Submitted,
    Uploading,
    Polling,
    Finished,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Built => "built",
            JobState::Submitted => "submitted",
            JobState::Uploading => "uploading",
            JobState::Polling => "polling",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Drives one job at a time through the remote API.
///
/// Cheap to clone; clones share the transport.
pub struct JobDriver<T: ?Sized> {
    transport: Arc<T>,
    config: ClientConfig,
}

impl<T: ?Sized> Clone for JobDriver<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport + ?Sized> JobDriver<T> {
    pub fn new(transport: Arc<T>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit → upload → poll. Returns the finished job.
    pub async fn run(&self, request: &JobRequest, cancel: &CancelToken) -> Result<Job, ConvertError> {
        debug!(state = %JobState::Built, tasks = request.graph.len(), "Job built");
        check_cancel(cancel)?;

        let job = self.submit(request).await?;

        if !request.uploads.is_empty() {
            check_cancel(cancel)?;
            debug!(job_id = %job.id, state = %JobState::Uploading, "Uploading {} file(s)", request.uploads.len());
            or_cancel(cancel, self.upload_all(&job, &request.uploads)).await?;
            info!("Uploaded {} file(s) for job {}", request.uploads.len(), job.id);
        }

        self.poll_until_done(&job.id, cancel).await
    }

    /// `POST /jobs` with the task graph.
    pub async fn submit(&self, request: &JobRequest) -> Result<Job, ConvertError> {
        request.graph.validate()?;
        let body = request.body();
        let created: Data<Job> = request_json(&*self.transport, Method::POST, "/jobs", Some(&body)).await?;
        let job = created.data;
        info!(state = %JobState::Submitted, "Job created: {}", job.id);
        if let Some(ref obs) = self.config.observer {
            obs.on_job_submitted(&job.id, job.tasks.len());
        }
        Ok(job)
    }

    /// Upload every pending payload into its task. All must succeed; the
    /// first failure aborts the rest.
    pub async fn upload_all<'u>(&self, job: &Job, uploads: &'u [PendingUpload]) -> Result<(), ConvertError> {
        let total = uploads.len();
        let done = AtomicUsize::new(0);

        let uploads: Vec<_> = uploads
            .iter()
            .map(|upload: &'u PendingUpload| {
                let done = &done;
                async move {
                    let task = job.task_named(&upload.task).ok_or_else(|| {
                        ConvertError::UploadFailed {
                            reason: format!("job {} has no task named '{}'", job.id, upload.task),
                        }
                    })?;
                    let target = self.upload_target(&task.id).await?;
                    self.upload_to(&target, &upload.file).await?;
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref obs) = self.config.observer {
                        obs.on_upload_complete(&upload.file.filename, n, total);
                    }
                    Ok::<(), ConvertError>(())
                }
                .boxed()
            })
            .collect();
        stream::iter(uploads)
            .buffer_unordered(self.config.upload_concurrency.max(1))
            .try_collect::<Vec<()>>()
            .await
            .inspect_err(|e| warn!(job_id = %job.id, state = %JobState::Failed, "Upload aborted: {}", e))?;
        Ok(())
    }

    /// `GET /tasks/{id}` and extract its upload form.
    pub async fn upload_target(&self, task_id: &str) -> Result<UploadTarget, ConvertError> {
        debug!("Getting upload info for task: {}", task_id);
        let endpoint = format!("/tasks/{task_id}");
        let resp: Data<TaskDetail> = request_json(&*self.transport, Method::GET, &endpoint, None)
            .await
            .map_err(bad_upload_info)?;
        form_of(resp.data)
    }

    /// Multipart-upload one payload to a pre-signed target.
    pub async fn upload_to(&self, target: &UploadTarget, file: &SourceFile) -> Result<(), ConvertError> {
        debug!("Uploading {} ({} bytes)", file.filename, file.len());
        self.transport
            .upload_multipart(target, &file.bytes, &file.filename)
            .await
    }

    /// Create a standalone upload task (`POST /import/upload`), fill it, and
    /// return its id for use in a later graph.
    pub async fn stage_upload(&self, file: &SourceFile) -> Result<String, ConvertError> {
        debug!("Creating upload task for {}", file.filename);
        let body = serde_json::json!({});
        let resp: Data<TaskDetail> =
            request_json(&*self.transport, Method::POST, "/import/upload", Some(&body))
                .await
                .map_err(bad_upload_info)?;
        let task_id = resp.data.id.clone();
        let target = form_of(resp.data)?;
        self.upload_to(&target, file).await?;
        info!("Staged {} as upload task {}", file.filename, task_id);
        Ok(task_id)
    }

    /// `GET /jobs/{id}` once.
    pub async fn fetch_job(&self, job_id: &str) -> Result<Job, ConvertError> {
        let endpoint = format!("/jobs/{job_id}");
        let resp: Data<Job> = request_json(&*self.transport, Method::GET, &endpoint, None).await?;
        Ok(resp.data)
    }

    /// Poll until `finished` (Ok) or `error` (JobFailed), the timeout, the
    /// poll cap, or cancellation.
    pub async fn poll_until_done(&self, job_id: &str, cancel: &CancelToken) -> Result<Job, ConvertError> {
        let timeout = self.config.job_timeout;
        let max_polls = self.config.effective_max_polls();
        let start = Instant::now();
        let mut polls: u32 = 0;
        info!(state = %JobState::Polling, "Waiting for job: {}", job_id);

        while start.elapsed() < timeout && polls < max_polls {
            check_cancel(cancel)?;
            polls += 1;
            let job = or_cancel(cancel, self.fetch_job(job_id)).await?;
            let elapsed = start.elapsed().as_secs();
            debug!("   Poll #{}: status={} ({}s)", polls, job.status, elapsed);
            if let Some(ref obs) = self.config.observer {
                obs.on_poll(job_id, polls, &job.status);
            }

            match job.status {
                Status::Finished => {
                    info!(state = %JobState::Finished, "Job {} completed in {}s", job_id, elapsed);
                    if let Some(ref obs) = self.config.observer {
                        obs.on_job_finished(job_id);
                    }
                    return Ok(job);
                }
                Status::Error => {
                    let message = job.failure_message();
                    warn!(state = %JobState::Failed, "Job {} failed: {}", job_id, message);
                    return Err(ConvertError::JobFailed { message });
                }
                _ if polls >= max_polls => break,
                _ => {
                    tokio::select! {
                        _ = sleep(self.config.poll_interval) => {}
                        _ = cancel.cancelled() => {
                            warn!("Polling of job {} cancelled after {} polls", job_id, polls);
                            return Err(ConvertError::Cancelled);
                        }
                    }
                }
            }
        }

        warn!(
            state = %JobState::Failed,
            "Job {} timed out after {}s ({} polls)",
            job_id,
            start.elapsed().as_secs(),
            polls
        );
        Err(ConvertError::JobTimeout {
            secs: timeout.as_secs(),
            polls,
        })
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<(), ConvertError> {
    if cancel.is_cancelled() {
        Err(ConvertError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run `fut` unless `cancel` fires first; the in-flight call is dropped.
async fn or_cancel<F, R>(cancel: &CancelToken, fut: F) -> Result<R, ConvertError>
where
    F: Future<Output = Result<R, ConvertError>>,
{
    tokio::select! {
        res = fut => res,
        _ = cancel.cancelled() => {
            warn!("Cancelled with a request in flight");
            Err(ConvertError::Cancelled)
        }
    }
}

/// Upload-target info that does not decode is an upload failure.
fn bad_upload_info(err: ConvertError) -> ConvertError {
    match err {
        ConvertError::Decode { context, detail } => ConvertError::UploadFailed {
            reason: format!("bad upload info from {context}: {detail}"),
        },
        other => other,
    }
}

fn form_of(task: TaskDetail) -> Result<UploadTarget, ConvertError> {
    let id = task.id;
    task.result
        .and_then(|r| r.form)
        .ok_or_else(|| ConvertError::UploadFailed {
            reason: format!("task {id} has no upload form"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(JobState::Uploading.to_string(), "uploading");
        assert_eq!(JobState::Failed.to_string(), "failed");
    }

    #[test]
    fn form_of_missing_form_is_upload_failed() {
        let task = TaskDetail {
            id: "t1".into(),
            result: None,
        };
        let err = form_of(task).unwrap_err();
        assert!(matches!(err, ConvertError::UploadFailed { .. }));
        assert!(err.to_string().contains("t1"));
    }
}
