//! Job builder: typed task graphs for every conversion shape.
//!
//! The remote API takes a dynamically keyed object (`node name → task
//! descriptor`) whose descriptors reference each other by name. Here each
//! descriptor is a [`TaskSpec`] variant, the graph keeps insertion order, and
//! [`TaskGraph::validate`] rejects dangling references before anything is
//! sent over the wire.
//!
//! ```text
//! single file   upload ──▶ convert ──▶ export
//! website       capture ──▶ export
//! merge         import-0 ┐
//!               import-1 ├─▶ merge ──▶ export      (input order = page order)
//!               import-N ┘
//! ocr           upload ──▶ ocr ──▶ export
//! staged        import(task) ──▶ convert ──▶ export
//! ```
//!
//! Building a graph performs no I/O.

use crate::error::ConvertError;
use crate::format::ConversionFormat;
use crate::model::operation;
use crate::pipeline::source::SourceFile;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// One node of a task graph, tagged on the wire by its `operation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation")]
pub enum TaskSpec {
    /// Receive bytes. `task` set means the upload was staged ahead of time
    /// and already holds data.
    #[serde(rename = "import/upload")]
    ImportUpload {
        #[serde(skip_serializing_if = "Option::is_none")]
        task: Option<String>,
    },

    #[serde(rename = "convert")]
    Convert {
        input: Vec<String>,
        input_format: String,
        output_format: ConversionFormat,
    },

    /// Concatenate inputs; `input` order is the page order of the result.
    #[serde(rename = "merge")]
    Merge {
        input: Vec<String>,
        output_format: ConversionFormat,
    },

    #[serde(rename = "capture-website")]
    CaptureWebsite {
        url: String,
        output_format: ConversionFormat,
        wait_until: String,
    },

    #[serde(rename = "pdf/ocr")]
    PdfOcr { input: Vec<String>, language: String },

    #[serde(rename = "export/url")]
    ExportUrl { input: Vec<String> },
}

impl TaskSpec {
    /// Node names this task consumes.
    pub fn inputs(&self) -> &[String] {
        match self {
            TaskSpec::Convert { input, .. }
            | TaskSpec::Merge { input, .. }
            | TaskSpec::PdfOcr { input, .. }
            | TaskSpec::ExportUrl { input } => input,
            TaskSpec::ImportUpload { .. } | TaskSpec::CaptureWebsite { .. } => &[],
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            TaskSpec::ImportUpload { .. } => operation::IMPORT_UPLOAD,
            TaskSpec::Convert { .. } => operation::CONVERT,
            TaskSpec::Merge { .. } => operation::MERGE,
            TaskSpec::CaptureWebsite { .. } => operation::CAPTURE_WEBSITE,
            TaskSpec::PdfOcr { .. } => operation::PDF_OCR,
            TaskSpec::ExportUrl { .. } => operation::EXPORT_URL,
        }
    }

    /// True for an upload node that still needs bytes after submission.
    pub fn awaits_upload(&self) -> bool {
        matches!(self, TaskSpec::ImportUpload { task: None })
    }
}

/// Where an import node gets its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Import {
    /// Upload after the job is submitted, via the task's own form.
    Upload,
    /// Reference an upload task created and filled beforehand.
    Staged(String),
}

impl Import {
    fn spec(&self) -> TaskSpec {
        match self {
            Import::Upload => TaskSpec::ImportUpload { task: None },
            Import::Staged(id) => TaskSpec::ImportUpload {
                task: Some(id.clone()),
            },
        }
    }
}

/// Ordered mapping of node name → task descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    nodes: Vec<(String, TaskSpec)>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Names must be unique and non-empty.
    pub fn insert(&mut self, name: impl Into<String>, spec: TaskSpec) -> Result<(), ConvertError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConvertError::InvalidGraph("task name must not be empty".into()));
        }
        if self.get(&name).is_some() {
            return Err(ConvertError::InvalidGraph(format!("duplicate task name '{name}'")));
        }
        self.nodes.push((name, spec));
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, spec: TaskSpec) -> Result<Self, ConvertError> {
        self.insert(name, spec)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.nodes.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskSpec)> {
        self.nodes.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of inline upload nodes, in graph order.
    pub fn upload_tasks(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, s)| s.awaits_upload())
            .map(|(n, _)| n)
            .collect()
    }

    /// Check every input reference resolves and an export node exists.
    pub fn validate(&self) -> Result<(), ConvertError> {
        for (name, spec) in self.iter() {
            let inputs = spec.inputs();
            let consumes = !matches!(
                spec,
                TaskSpec::ImportUpload { .. } | TaskSpec::CaptureWebsite { .. }
            );
            if consumes && inputs.is_empty() {
                return Err(ConvertError::InvalidGraph(format!(
                    "task '{name}' ({}) has no inputs",
                    spec.operation()
                )));
            }
            for input in inputs {
                if input == name {
                    return Err(ConvertError::InvalidGraph(format!(
                        "task '{name}' references itself"
                    )));
                }
                if self.get(input).is_none() {
                    return Err(ConvertError::InvalidGraph(format!(
                        "task '{name}' references unknown task '{input}'"
                    )));
                }
            }
        }
        if !self
            .iter()
            .any(|(_, s)| matches!(s, TaskSpec::ExportUrl { .. }))
        {
            return Err(ConvertError::InvalidGraph(format!(
                "graph has no '{}' task",
                operation::EXPORT_URL
            )));
        }
        Ok(())
    }

    // ── Conversion shapes ─────────────────────────────────────────────────

    /// import → convert → export.
    pub fn single_file(
        import: Import,
        input_format: impl Into<String>,
        output_format: ConversionFormat,
    ) -> Result<Self, ConvertError> {
        let import_name = match import {
            Import::Upload => "upload",
            Import::Staged(_) => "import",
        };
        let graph = Self::new()
            .with(import_name, import.spec())?
            .with(
                "convert",
                TaskSpec::Convert {
                    input: vec![import_name.to_string()],
                    input_format: input_format.into(),
                    output_format,
                },
            )?
            .with(
                "export",
                TaskSpec::ExportUrl {
                    input: vec!["convert".into()],
                },
            )?;
        graph.validate()?;
        Ok(graph)
    }

    /// Staged import → convert → export, for an upload created beforehand.
    pub fn import_convert(
        task_id: impl Into<String>,
        input_format: impl Into<String>,
        output_format: ConversionFormat,
    ) -> Result<Self, ConvertError> {
        Self::single_file(Import::Staged(task_id.into()), input_format, output_format)
    }

    /// capture-website → export.
    pub fn capture_website(
        url: impl Into<String>,
        output_format: ConversionFormat,
        wait_until: impl Into<String>,
    ) -> Result<Self, ConvertError> {
        let graph = Self::new()
            .with(
                "capture",
                TaskSpec::CaptureWebsite {
                    url: url.into(),
                    output_format,
                    wait_until: wait_until.into(),
                },
            )?
            .with(
                "export",
                TaskSpec::ExportUrl {
                    input: vec!["capture".into()],
                },
            )?;
        graph.validate()?;
        Ok(graph)
    }

    /// import-0..N → merge → export. Merge input order follows `imports`.
    pub fn merge(imports: &[Import], output_format: ConversionFormat) -> Result<Self, ConvertError> {
        if imports.is_empty() {
            return Err(ConvertError::InvalidGraph("merge needs at least one input".into()));
        }
        let mut graph = Self::new();
        let mut names = Vec::with_capacity(imports.len());
        for (i, import) in imports.iter().enumerate() {
            let name = merge_input_name(i);
            graph.insert(name.clone(), import.spec())?;
            names.push(name);
        }
        graph.insert(
            "merge",
            TaskSpec::Merge {
                input: names,
                output_format,
            },
        )?;
        graph.insert(
            "export",
            TaskSpec::ExportUrl {
                input: vec!["merge".into()],
            },
        )?;
        graph.validate()?;
        Ok(graph)
    }

    /// import → pdf/ocr → export.
    pub fn ocr(import: Import, language: impl Into<String>) -> Result<Self, ConvertError> {
        let import_name = match import {
            Import::Upload => "upload",
            Import::Staged(_) => "import",
        };
        let graph = Self::new()
            .with(import_name, import.spec())?
            .with(
                "ocr",
                TaskSpec::PdfOcr {
                    input: vec![import_name.to_string()],
                    language: language.into(),
                },
            )?
            .with(
                "export",
                TaskSpec::ExportUrl {
                    input: vec!["ocr".into()],
                },
            )?;
        graph.validate()?;
        Ok(graph)
    }
}

/// Node name of the `i`-th merge input.
pub fn merge_input_name(i: usize) -> String {
    format!("import-{i}")
}

impl Serialize for TaskGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (name, spec) in &self.nodes {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

/// Bytes bound to an inline upload node.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub task: String,
    pub file: SourceFile,
}

/// Everything the driver needs to run one job: the graph to submit and the
/// bytes for each of its inline upload nodes.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub graph: TaskGraph,
    pub uploads: Vec<PendingUpload>,
}

impl JobRequest {
    /// A request with no inline uploads (website capture, staged imports).
    pub fn without_uploads(graph: TaskGraph) -> Result<Self, ConvertError> {
        Self::new(graph, Vec::new())
    }

    /// Pair a graph with its upload payloads, checking that every inline
    /// upload node has exactly one payload and every payload has a node.
    pub fn new(graph: TaskGraph, uploads: Vec<PendingUpload>) -> Result<Self, ConvertError> {
        graph.validate()?;
        let expected = graph.upload_tasks();
        for name in &expected {
            let bound = uploads.iter().filter(|u| u.task == *name).count();
            if bound != 1 {
                return Err(ConvertError::InvalidGraph(format!(
                    "upload task '{name}' needs exactly one file, got {bound}"
                )));
            }
        }
        if let Some(stray) = uploads.iter().find(|u| !expected.contains(&u.task.as_str())) {
            return Err(ConvertError::InvalidGraph(format!(
                "file '{}' is bound to '{}', which is not an upload task",
                stray.file.filename, stray.task
            )));
        }
        Ok(Self { graph, uploads })
    }

    /// Convert one file between formats.
    pub fn convert(
        file: SourceFile,
        input_format: impl Into<String>,
        output_format: ConversionFormat,
    ) -> Result<Self, ConvertError> {
        let graph = TaskGraph::single_file(Import::Upload, input_format, output_format)?;
        Self::new(graph, vec![PendingUpload { task: "upload".into(), file }])
    }

    /// Merge files in the given order.
    pub fn merge(files: Vec<SourceFile>, output_format: ConversionFormat) -> Result<Self, ConvertError> {
        let imports = vec![Import::Upload; files.len()];
        let graph = TaskGraph::merge(&imports, output_format)?;
        let uploads = files
            .into_iter()
            .enumerate()
            .map(|(i, file)| PendingUpload {
                task: merge_input_name(i),
                file,
            })
            .collect();
        Self::new(graph, uploads)
    }

    /// OCR a PDF.
    pub fn ocr(file: SourceFile, language: impl Into<String>) -> Result<Self, ConvertError> {
        let graph = TaskGraph::ocr(Import::Upload, language)?;
        Self::new(graph, vec![PendingUpload { task: "upload".into(), file }])
    }

    /// The `POST /jobs` body: `{"tasks": {…}}`.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "tasks": &self.graph })
    }
}
