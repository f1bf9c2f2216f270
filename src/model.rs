//! Wire types returned by the remote job API.
//!
//! These structs are only ever *read* by the client: a [`Job`] is created by
//! a submit call, mutated exclusively by the remote service, and re-fetched
//! while polling. Fields the client does not use are ignored on decode so
//! new server-side fields never break us.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Operation names understood by the remote service.
pub mod operation {
    pub const IMPORT_UPLOAD: &str = "import/upload";
    pub const CONVERT: &str = "convert";
    pub const MERGE: &str = "merge";
    pub const EXPORT_URL: &str = "export/url";
    pub const CAPTURE_WEBSITE: &str = "capture-website";
    pub const PDF_OCR: &str = "pdf/ocr";
}

/// Lifecycle status shared by jobs and tasks.
///
/// Unrecognised values decode into [`Status::Other`] and are treated as
/// non-terminal, so a new server-side status keeps the poller waiting
/// instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Waiting,
    Processing,
    Finished,
    Error,
    Other(String),
}

impl Status {
    /// `finished` and `error` end polling; everything else keeps waiting.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Finished | Status::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Waiting => "waiting",
            Status::Processing => "processing",
            Status::Finished => "finished",
            Status::Error => "error",
            Status::Other(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "waiting" => Status::Waiting,
            "processing" => Status::Processing,
            "finished" => Status::Finished,
            "error" => Status::Error,
            _ => Status::Other(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote unit of work composed of named tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: Status,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Job {
    /// Find a task by its graph node name.
    pub fn task_named(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// First task whose status is `error`, if any.
    pub fn first_failed_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == Status::Error)
    }

    /// The first `export/url` task in the graph.
    pub fn export_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.operation == operation::EXPORT_URL)
    }

    /// Message to surface when the job ended in `error`.
    pub fn failure_message(&self) -> String {
        self.first_failed_task()
            .and_then(|t| t.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// One stage of a job's graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Graph node name; empty for standalone tasks created outside a job.
    #[serde(default)]
    pub name: String,
    pub operation: String,
    pub status: Status,
    #[serde(default)]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What `GET /tasks/{id}` and `POST /import/upload` are guaranteed to carry:
/// the task id and, for upload tasks, the form to post to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskDetail {
    pub id: String,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

impl TaskDetail {
    /// The pre-signed upload form, if the task has one.
    pub fn form(&self) -> Option<&UploadTarget> {
        self.result.as_ref().and_then(|r| r.form.as_ref())
    }
}

/// Result payload of a task. Upload tasks carry `form`; export tasks carry
/// `files`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub files: Vec<ResultFile>,
    #[serde(default)]
    pub form: Option<UploadTarget>,
}

/// A produced file with its time-limited download URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Pre-signed destination for a single multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// The `{"data": …}` envelope around every API response.
#[derive(Debug, Clone, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

/// Body of a non-2xx API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}
