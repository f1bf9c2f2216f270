//! Conversion output: the downloaded artifact.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The final converted file, as named by the remote export task.
#[derive(Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ConvertedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertedFile")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ConvertedFile {
    /// Write the bytes to `path`.
    ///
    /// Uses atomic write (temp file + rename) so a crash never leaves a
    /// truncated result behind.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConvertError> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".part");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, &self.bytes)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        debug!("Saved {} bytes to {}", self.bytes.len(), path.display());
        Ok(path.to_path_buf())
    }

    /// Save under the remote filename inside `dir`.
    pub async fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ConvertError> {
        let name = Path::new(&self.filename)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("result.bin"));
        self.save(dir.as_ref().join(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_writes_exact_bytes_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = ConvertedFile {
            filename: "out.pdf".into(),
            bytes: b"%PDF-1.7\x00\xff".to_vec(),
        };
        let target = dir.path().join("nested/deeper/result.pdf");
        let written = out.save(&target).await.unwrap();
        assert_eq!(written, target);
        assert_eq!(std::fs::read(&target).unwrap(), out.bytes);
        assert!(!dir.path().join("nested/deeper/result.pdf.part").exists());
    }

    #[tokio::test]
    async fn save_in_uses_remote_name_without_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let out = ConvertedFile {
            filename: "../escape/out.docx".into(),
            bytes: vec![1, 2, 3],
        };
        let written = out.save_in(dir.path()).await.unwrap();
        assert_eq!(written, dir.path().join("out.docx"));
    }
}
