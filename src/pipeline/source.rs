//! Source payloads: the bytes and filename handed to an upload task.
//!
//! Files are read fully into memory before the job is submitted. That way a
//! missing or unreadable input fails locally, before a remote job exists that
//! would otherwise be left orphaned.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A named payload to upload.
#[derive(Clone)]
pub struct SourceFile {
    /// Filename sent in the multipart `file` part.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl SourceFile {
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a local file, keeping its final path component as the filename.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { filename, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn read_error(path: &Path, e: std::io::Error) -> ConvertError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ConvertError::FileNotFound {
            path: PathBuf::from(path),
        }
    } else {
        ConvertError::ReadFailed {
            path: PathBuf::from(path),
            source: e,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}
