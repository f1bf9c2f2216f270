//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudconvert_jobs::{ClientConfig, ConvertError, Transport, UploadTarget};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded network call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Request {
        method: Method,
        endpoint: String,
        body: Option<Value>,
    },
    Upload {
        url: String,
        parameters: BTreeMap<String, String>,
        filename: String,
        bytes: Vec<u8>,
    },
    Download {
        url: String,
    },
}

/// Answers the job API from a script and records every call in order.
///
/// * `POST /jobs` → `created_job`, or `submit_error` as a `RemoteApi` error
/// * `GET /jobs/{id}` → next entry of `polls`; the last entry repeats forever
/// * `GET /tasks/{id}` → `{id, result: {form}}` with a form at
///   `https://upload.test/{id}`, or `task_detail` when set
/// * `POST /import/upload` → a fresh `staged-N` task in the same shape
/// * uploads to a URL in `failing_uploads` → `UploadFailed`; with
///   `stall_uploads` set, uploads never complete
/// * `download(url)` → `downloads[url]`, else `RemoteApi("HTTP 404")`
#[derive(Default)]
pub struct MockTransport {
    pub created_job: Mutex<Value>,
    pub submit_error: Mutex<Option<String>>,
    pub polls: Mutex<VecDeque<Value>>,
    pub task_detail: Mutex<Option<Value>>,
    pub failing_uploads: Mutex<HashSet<String>>,
    pub stall_uploads: AtomicBool,
    pub downloads: Mutex<HashMap<String, Vec<u8>>>,
    pub calls: Mutex<Vec<Call>>,
    staged: Mutex<usize>,
}

impl MockTransport {
    pub fn new(created_job: Value, polls: Vec<Value>) -> Self {
        Self {
            created_job: Mutex::new(created_job),
            polls: Mutex::new(polls.into()),
            ..Default::default()
        }
    }

    pub fn with_download(self, url: &str, bytes: &[u8]) -> Self {
        self.downloads
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn failing_upload(self, url: &str) -> Self {
        self.failing_uploads.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn with_task_detail(self, detail: Value) -> Self {
        *self.task_detail.lock().unwrap() = Some(detail);
        self
    }

    pub fn stalling_uploads(self) -> Self {
        self.stall_uploads.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `GET /jobs/{id}` calls so far.
    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Request { method, endpoint, .. }
                if *method == Method::GET && endpoint.starts_with("/jobs/")))
            .count()
    }

    pub fn uploads(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Upload { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn upload_url(task_id: &str) -> String {
    format!("https://upload.test/{task_id}")
}

fn form(task_id: &str) -> Value {
    json!({"url": upload_url(task_id), "parameters": {"key": task_id, "policy": "signed"}})
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, ConvertError> {
        self.record(Call::Request {
            method: method.clone(),
            endpoint: endpoint.to_string(),
            body: body.cloned(),
        });

        let data = match (method, endpoint) {
            (Method::POST, "/jobs") => {
                if let Some(msg) = self.submit_error.lock().unwrap().clone() {
                    return Err(ConvertError::RemoteApi { message: msg });
                }
                self.created_job.lock().unwrap().clone()
            }
            (Method::POST, "/import/upload") => {
                let mut n = self.staged.lock().unwrap();
                *n += 1;
                let id = format!("staged-{n}");
                json!({"id": id, "result": {"form": form(&id)}})
            }
            (Method::GET, ep) if ep.starts_with("/jobs/") => {
                let mut polls = self.polls.lock().unwrap();
                if polls.len() > 1 {
                    polls.pop_front().unwrap()
                } else {
                    polls.front().cloned().expect("no poll responses scripted")
                }
            }
            (Method::GET, ep) if ep.starts_with("/tasks/") => {
                let id = ep.trim_start_matches("/tasks/");
                match self.task_detail.lock().unwrap().clone() {
                    Some(detail) => detail,
                    None => json!({"id": id, "result": {"form": form(id)}}),
                }
            }
            (m, ep) => {
                return Err(ConvertError::RemoteApi {
                    message: format!("unscripted {m} {ep}"),
                })
            }
        };
        Ok(serde_json::to_vec(&json!({ "data": data })).unwrap())
    }

    async fn upload_multipart(
        &self,
        target: &UploadTarget,
        bytes: &[u8],
        filename: &str,
    ) -> Result<(), ConvertError> {
        self.record(Call::Upload {
            url: target.url.clone(),
            parameters: target.parameters.clone(),
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
        });
        if self.stall_uploads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing_uploads.lock().unwrap().contains(&target.url) {
            return Err(ConvertError::UploadFailed {
                reason: "HTTP 403".into(),
            });
        }
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ConvertError> {
        self.record(Call::Download {
            url: url.to_string(),
        });
        self.downloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ConvertError::RemoteApi {
                message: "HTTP 404".into(),
            })
    }
}

// ── JSON fixtures ────────────────────────────────────────────────────────────

pub fn task(id: &str, name: &str, operation: &str, status: &str) -> Value {
    json!({"id": id, "name": name, "operation": operation, "status": status})
}

pub fn failed_task(id: &str, name: &str, operation: &str, message: &str) -> Value {
    json!({"id": id, "name": name, "operation": operation, "status": "error", "message": message})
}

pub fn export_task(status: &str, files: Value) -> Value {
    json!({"id": "t-export", "name": "export", "operation": "export/url",
           "status": status, "result": {"files": files}})
}

pub fn job(id: &str, status: &str, tasks: Vec<Value>) -> Value {
    json!({"id": id, "status": status, "tasks": tasks})
}

pub const RESULT_URL: &str = "https://x/out.pdf";

/// A finished job whose export task lists `out.pdf` at [`RESULT_URL`].
pub fn finished(id: &str) -> Value {
    job(
        id,
        "finished",
        vec![export_task(
            "finished",
            json!([{"filename": "out.pdf", "url": RESULT_URL}]),
        )],
    )
}

/// Job as returned by `POST /jobs` for a single-file conversion.
pub fn created_single(id: &str) -> Value {
    job(
        id,
        "waiting",
        vec![
            task("t-upload", "upload", "import/upload", "waiting"),
            task("t-convert", "convert", "convert", "waiting"),
            task("t-export", "export", "export/url", "waiting"),
        ],
    )
}

/// Config with a short poll interval suitable for a paused test clock.
pub fn config() -> ClientConfig {
    ClientConfig::builder()
        .api_key("test-key")
        .poll_interval(Duration::from_secs(2))
        .build()
        .unwrap()
}
