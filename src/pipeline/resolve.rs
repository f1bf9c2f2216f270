//! Result resolver: find the export file of a finished job and fetch it.

use crate::error::ConvertError;
use crate::model::{Job, ResultFile};
use crate::output::ConvertedFile;
use crate::pipeline::transport::Transport;
use tracing::{info, warn};

/// The first file of the job's `export/url` task, with its URL.
///
/// Fails with `NoResult` when there is no export task, the task lists no
/// files, or the first file has no URL.
pub fn export_file(job: &Job) -> Result<(&ResultFile, &str), ConvertError> {
    job.export_task()
        .and_then(|t| t.result.as_ref())
        .and_then(|r| r.files.first())
        .and_then(|f| f.url.as_deref().map(|url| (f, url)))
        .ok_or_else(|| {
            warn!("No download URL found in job {}", job.id);
            ConvertError::NoResult {
                job_id: job.id.clone(),
            }
        })
}

/// Download the export file of a finished job.
pub async fn fetch_result<T: Transport + ?Sized>(
    transport: &T,
    job: &Job,
) -> Result<ConvertedFile, ConvertError> {
    let (file, url) = export_file(job)?;
    info!("Downloading: {}", file.filename);
    let bytes = transport.download(url).await?;
    info!("Downloaded result: {} bytes", bytes.len());
    Ok(ConvertedFile {
        filename: file.filename.clone(),
        bytes,
    })
}
