//! Conversion entry points.
//!
//! Every public operation is the same pipeline with a different graph:
//!
//! ```text
//! JobRequest ──▶ JobDriver::run ──▶ resolve::fetch_result ──▶ ConvertedFile
//! ```
//!
//! Each call is one suspendable unit of work: its network round-trips run
//! strictly in sequence, except the uploads of a merge, which may overlap
//! because every upload has its own pre-signed target.

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::error::ConvertError;
use crate::format::{input_format_for, ConversionFormat};
use crate::output::ConvertedFile;
use crate::pipeline::driver::JobDriver;
use crate::pipeline::graph::{JobRequest, TaskGraph};
use crate::pipeline::resolve;
use crate::pipeline::source::{is_url, SourceFile};
use crate::pipeline::transport::{HttpTransport, Transport};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Client for the remote conversion API.
///
/// # Example
/// ```rust,no_run
/// use cloudconvert_jobs::{ClientConfig, ConvertClient, ConversionFormat, SourceFile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ConvertClient::new(ClientConfig::from_env()?)?;
/// let pdf = SourceFile::from_path("contract.pdf").await?;
/// let docx = client.convert_from_pdf(pdf, ConversionFormat::Docx).await?;
/// docx.save("contract.docx").await?;
/// # Ok(())
/// # }
/// ```
pub struct ConvertClient<T: ?Sized = HttpTransport> {
    driver: JobDriver<T>,
    cancel: CancelToken,
}

impl<T: ?Sized> Clone for ConvertClient<T> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl ConvertClient<HttpTransport> {
    /// Client over the real HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self, ConvertError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }
}

impl<T: Transport + ?Sized> ConvertClient<T> {
    /// Client over any transport (tests use an in-memory one).
    pub fn with_transport(transport: Arc<T>, config: ClientConfig) -> Self {
        Self {
            driver: JobDriver::new(transport, config),
            cancel: CancelToken::never(),
        }
    }

    /// Bind a cancellation token; operations on the returned client stop
    /// polling once it fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        self.driver.config()
    }

    pub fn driver(&self) -> &JobDriver<T> {
        &self.driver
    }

    /// Replace the API key for this client and every clone of it.
    pub fn set_api_key(&self, key: impl Into<String>) {
        self.driver.config().api_key.set(key);
    }

    /// Run any job request to completion and download its result.
    pub async fn run_job(&self, request: JobRequest) -> Result<ConvertedFile, ConvertError> {
        let start = Instant::now();
        let job = self.driver.run(&request, &self.cancel).await?;
        let result = resolve::fetch_result(self.driver.transport(), &job).await?;
        if let Some(ref obs) = self.config().observer {
            obs.on_result_downloaded(&result.filename, result.bytes.len());
        }
        info!(
            "Job {} delivered {} ({} bytes) in {}ms",
            job.id,
            result.filename,
            result.bytes.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Convert any supported document or image to PDF. The input format is
    /// taken from the file extension.
    pub async fn convert_to_pdf(&self, file: SourceFile) -> Result<ConvertedFile, ConvertError> {
        self.convert_file(file, ConversionFormat::Pdf).await
    }

    /// Convert a PDF into another format.
    pub async fn convert_from_pdf(
        &self,
        pdf: SourceFile,
        format: ConversionFormat,
    ) -> Result<ConvertedFile, ConvertError> {
        info!("Converting from PDF to {}", format.display_name());
        let request = JobRequest::convert(pdf, "pdf", format)?;
        self.run_job(request).await
    }

    /// Convert `file` to `format`, inferring the input format from its name.
    pub async fn convert_file(
        &self,
        file: SourceFile,
        format: ConversionFormat,
    ) -> Result<ConvertedFile, ConvertError> {
        let input_format = input_format_for(&file.filename)?;
        info!("Converting {} ({} → {})", file.filename, input_format, format);
        let request = JobRequest::convert(file, input_format, format)?;
        self.run_job(request).await
    }

    /// Render a web page to PDF.
    pub async fn capture_website(&self, url: &str) -> Result<ConvertedFile, ConvertError> {
        if !is_url(url) || reqwest::Url::parse(url).is_err() {
            return Err(ConvertError::InvalidUrl { url: url.to_string() });
        }
        info!("Capturing website: {}", url);
        let graph = TaskGraph::capture_website(
            url,
            ConversionFormat::Pdf,
            self.config().capture_wait_until.clone(),
        )?;
        self.run_job(JobRequest::without_uploads(graph)?).await
    }

    /// Merge PDFs into one, pages in the order given.
    pub async fn merge_pdfs(&self, pdfs: Vec<SourceFile>) -> Result<ConvertedFile, ConvertError> {
        info!("Merging {} PDFs", pdfs.len());
        let request = JobRequest::merge(pdfs, ConversionFormat::Pdf)?;
        self.run_job(request).await
    }

    /// Add a text layer to a scanned PDF.
    pub async fn ocr_pdf(&self, pdf: SourceFile) -> Result<ConvertedFile, ConvertError> {
        info!("OCR processing: {}", pdf.filename);
        let request = JobRequest::ocr(pdf, self.config().ocr_language.clone())?;
        self.run_job(request).await
    }

    /// Create and fill a standalone upload task; returns its task id.
    pub async fn stage_upload(&self, file: &SourceFile) -> Result<String, ConvertError> {
        self.driver.stage_upload(file).await
    }

    /// Convert a previously staged upload.
    pub async fn convert_staged(
        &self,
        task_id: &str,
        input_format: &str,
        format: ConversionFormat,
    ) -> Result<ConvertedFile, ConvertError> {
        info!("Creating conversion job: {} → {}", input_format, format);
        let graph = TaskGraph::import_convert(task_id, input_format, format)?;
        self.run_job(JobRequest::without_uploads(graph)?).await
    }
}
