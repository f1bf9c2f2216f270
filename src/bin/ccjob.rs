//! CLI binary for cloudconvert-jobs.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, runs one conversion and writes the result to disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudconvert_jobs::{
    output_filename, CancelToken, ClientConfig, ConversionFormat, ConvertClient, ConvertedFile,
    DocumentKind, JobObserver, SourceFile, Status,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one spinner whose message tracks the job state, plus a
/// log line per completed upload (uploads may finish out of order).
struct CliObserver {
    bar: ProgressBar,
    started: Instant,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.set_message("Submitting job…");
        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }
}

impl JobObserver for CliObserver {
    fn on_job_submitted(&self, job_id: &str, task_count: usize) {
        self.bar.println(format!(
            "{} Job {} created ({} tasks)",
            cyan("◆"),
            bold(job_id),
            task_count
        ));
        self.bar.set_message("Uploading…");
    }

    fn on_upload_complete(&self, filename: &str, done: usize, total: usize) {
        self.bar.println(format!(
            "  {} Uploaded {:<32} {}",
            green("✓"),
            filename,
            dim(&format!("{done}/{total}"))
        ));
    }

    fn on_poll(&self, _job_id: &str, attempt: u32, status: &Status) {
        self.bar
            .set_message(format!("Waiting for job  {}", dim(&format!("#{attempt} {status}"))));
    }

    fn on_job_finished(&self, _job_id: &str) {
        self.bar.set_message("Downloading result…");
    }

    fn on_result_downloaded(&self, filename: &str, bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} {}",
            green("✔"),
            bold(filename),
            dim(&format!(
                "{bytes} bytes in {:.1}s",
                self.started.elapsed().as_secs_f64()
            ))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word document to PDF (writes report.pdf)
  ccjob to-pdf report.docx

  # PDF to Excel, explicit output path
  ccjob from-pdf statement.pdf --to xlsx -o statement.xlsx

  # Web page to PDF
  ccjob capture https://example.com -o example.pdf

  # Merge PDFs; page order follows argument order
  ccjob merge cover.pdf body.pdf appendix.pdf -o book.pdf

  # OCR a scanned PDF in German
  ccjob ocr scan.pdf --language deu

ENVIRONMENT VARIABLES:
  CLOUDCONVERT_API_KEY    API key (required)
  CLOUDCONVERT_BASE_URL   Override API root, e.g. https://api.sandbox.cloudconvert.com/v2
  RUST_LOG                tracing filter, overrides -v / -q
"#;

/// Convert documents through a remote job-based conversion API.
#[derive(Parser, Debug)]
#[command(
    name = "ccjob",
    version,
    about = "Convert, merge, capture and OCR documents through a remote conversion API",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key.
    #[arg(long, global = true, env = "CLOUDCONVERT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API root URL.
    #[arg(long, global = true, env = "CLOUDCONVERT_BASE_URL")]
    base_url: Option<String>,

    /// Give up waiting for the job after this many seconds.
    #[arg(long, global = true, env = "CCJOB_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Seconds between job status polls.
    #[arg(long, global = true, env = "CCJOB_POLL_INTERVAL", default_value_t = 2)]
    poll_interval: u64,

    /// Per-HTTP-request timeout in seconds.
    #[arg(long, global = true, env = "CCJOB_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Concurrent uploads when merging.
    #[arg(long, global = true, env = "CCJOB_UPLOAD_CONCURRENCY", default_value_t = 4)]
    upload_concurrency: usize,

    /// Print a JSON summary instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "CCJOB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a document or image to PDF.
    ToPdf {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert a PDF to another format.
    FromPdf {
        file: PathBuf,
        /// Target format: jpg, png, docx, xlsx, pptx, txt.
        #[arg(long, value_parser = parse_format)]
        to: ConversionFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render a web page to PDF.
    Capture {
        url: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge PDFs in the given order.
    Merge {
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add a searchable text layer to a scanned PDF.
    Ocr {
        file: PathBuf,
        /// OCR language code.
        #[arg(long, default_value = "eng")]
        language: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List supported output formats.
    Formats,
}

fn parse_format(s: &str) -> Result<ConversionFormat, String> {
    s.parse().map_err(|e: cloudconvert_jobs::ConvertError| e.to_string())
}

#[derive(Serialize)]
struct Summary<'a> {
    filename: &'a str,
    path: String,
    bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level progress, so library logs drop to
    // ERROR while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Command::Formats = cli.command {
        for f in ConversionFormat::ALL {
            println!("{}", f.extension());
        }
        return Ok(());
    }

    let config = build_config(&cli, show_progress && !cli.verbose)?;

    // ── Ctrl-C stops polling; the remote job is left to expire ───────────
    let (cancel_handle, cancel_token) = CancelToken::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let client = ConvertClient::new(config)
        .context("Failed to initialise HTTP client")?
        .with_cancel(cancel_token);

    let (result, output) = run_command(&client, &cli.command).await?;
    let path = match output {
        Some(p) => result.save(&p).await,
        None => result.save_in(".").await,
    }
    .context("Failed to save result")?;

    if cli.json {
        let summary = Summary {
            filename: &result.filename,
            path: path.display().to_string(),
            bytes: result.bytes.len(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!("   → {}", bold(&path.display().to_string()));
    }

    Ok(())
}

/// Run the selected subcommand; returns the result and the output path, if
/// one is decided before the remote filename is known.
async fn run_command(
    client: &ConvertClient,
    command: &Command,
) -> Result<(ConvertedFile, Option<PathBuf>)> {
    match command {
        Command::ToPdf { file, output } => {
            let src = read_source(file).await?;
            check_kind(&src, Route::ToPdf)?;
            let out = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(output_filename(&src.filename, ConversionFormat::Pdf)));
            let result = client.convert_to_pdf(src).await.context("Conversion failed")?;
            Ok((result, Some(out)))
        }
        Command::FromPdf { file, to, output } => {
            let src = read_source(file).await?;
            check_kind(&src, Route::FromPdf)?;
            let out = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(output_filename(&src.filename, *to)));
            let result = client
                .convert_from_pdf(src, *to)
                .await
                .context("Conversion failed")?;
            Ok((result, Some(out)))
        }
        Command::Capture { url, output } => {
            let result = client
                .capture_website(url)
                .await
                .context("Website capture failed")?;
            Ok((result, output.clone()))
        }
        Command::Merge { files, output } => {
            let mut sources = Vec::with_capacity(files.len());
            for f in files {
                let src = read_source(f).await?;
                check_kind(&src, Route::FromPdf)?;
                sources.push(src);
            }
            let result = client.merge_pdfs(sources).await.context("Merge failed")?;
            Ok((result, output.clone()))
        }
        // The language flag already went into the config.
        Command::Ocr { file, output, .. } => {
            let src = read_source(file).await?;
            check_kind(&src, Route::FromPdf)?;
            let stem = Path::new(&src.filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string();
            let out = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{stem}-ocr.pdf")));
            let result = client.ocr_pdf(src).await.context("OCR failed")?;
            Ok((result, Some(out)))
        }
        Command::Formats => anyhow::bail!("'formats' does not run a job"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Document or image in, PDF out.
    ToPdf,
    /// PDF in (from-pdf, merge, ocr).
    FromPdf,
}

/// Refuse inputs the chosen subcommand cannot handle before any job is
/// created.
fn check_kind(src: &SourceFile, route: Route) -> Result<()> {
    let kind = DocumentKind::from_filename(&src.filename);
    match route {
        Route::ToPdf if kind == DocumentKind::Pdf => {
            anyhow::bail!("{} is already a PDF; use from-pdf, merge or ocr", src.filename)
        }
        Route::ToPdf if !kind.converts_to_pdf() => {
            anyhow::bail!("Don't know how to convert {} to PDF", src.filename)
        }
        Route::FromPdf if kind != DocumentKind::Pdf => {
            anyhow::bail!("{} is not a PDF ({:?})", src.filename, kind)
        }
        _ => Ok(()),
    }
}

async fn read_source(path: &Path) -> Result<SourceFile> {
    SourceFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, spinner: bool) -> Result<ClientConfig> {
    let key = cli
        .api_key
        .clone()
        .context("No API key: pass --api-key or set CLOUDCONVERT_API_KEY")?;

    let mut builder = ClientConfig::builder()
        .api_key(key)
        .job_timeout(Duration::from_secs(cli.timeout))
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .request_timeout(Duration::from_secs(cli.request_timeout))
        .upload_concurrency(cli.upload_concurrency);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Command::Ocr { ref language, .. } = cli.command {
        builder = builder.ocr_language(language.clone());
    }
    if spinner {
        builder = builder.observer(CliObserver::new());
    }

    builder.build().context("Invalid configuration")
}
