//! CLI binary for msgraph-pdf.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `convert` runs one document through the pipeline, `drives` lists drive ids.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use msgraph_pdf::progress::percent;
use msgraph_pdf::{
    ConversionPipeline, GraphClient, ServiceConfig, StagedUpload, UploadProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Byte-level upload bar. Starts as a spinner until the size is known.
struct CliUploadProgress {
    bar: ProgressBar,
}

impl CliUploadProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving upload folder…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl UploadProgressCallback for CliUploadProgress {
    fn on_upload_start(&self, file_name: &str, total_bytes: u64) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        self.bar.set_length(total_bytes);
        self.bar.set_style(style);
        self.bar.set_prefix("Uploading");
        self.bar.reset_eta();
        self.bar
            .println(format!("{} {}", dim("◆"), bold(&format!("Uploading {file_name}"))));
    }

    fn on_chunk_uploaded(&self, bytes_sent: u64, total_bytes: u64) {
        self.bar.set_position(bytes_sent);
        self.bar
            .set_message(format!("{:.2}%", percent(bytes_sent, total_bytes)));
    }

    fn on_upload_complete(&self, _item_id: &str, total_bytes: u64) {
        self.bar.set_position(total_bytes);
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.bar.set_prefix("Converting");
        self.bar.set_message("Waiting for PDF rendition…");
    }

    fn on_upload_error(&self, bytes_sent: u64, total_bytes: u64, error: &str) {
        self.bar.abandon();
        eprintln!(
            "{} upload stopped at {}/{} bytes: {}",
            red("✗"),
            bytes_sent,
            total_bytes,
            red(error)
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service (POST /convert, GET /drives)
  msgraph-pdf serve --port 8181

  # Convert one document from the command line
  msgraph-pdf convert report.docx -o report.pdf

  # List drive ids visible to the service identity
  msgraph-pdf drives --json

ENVIRONMENT VARIABLES:
  AZURE_CLIENT_ID        Application (client) id            (required)
  AZURE_CLIENT_SECRET    Client secret                      (required)
  AZURE_TENANT_ID        Directory (tenant) id              (required)
  DRIVE_ID               Drive that receives uploads        (convert/serve)
  UPLOAD_DIRECTORY       Folder under the drive root        (convert/serve)
  SERVICE_PORT           Listening port, default 8181
  GRAPH_BASE_URL         Default https://graph.microsoft.com/v1.0
  AZURE_AUTHORITY_HOST   Default https://login.microsoftonline.com
  UPLOAD_CHUNK_SIZE      Bytes per chunk, multiple of 327680
  STAGING_DIR            Where transient files are written
  MAX_UPLOAD_BYTES       Largest accepted upload, default 256 MiB
  REQUEST_TIMEOUT_SECS   Per-request timeout for Graph calls

A .env file in the working directory is loaded if present.
"#;

/// Convert office documents to PDF through Microsoft Graph.
#[derive(Parser, Debug)]
#[command(
    name = "msgraph-pdf",
    version,
    about = "Convert office documents to PDF through Microsoft Graph",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MSGRAPH_PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MSGRAPH_PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP conversion service.
    Serve {
        /// Listening port (overrides SERVICE_PORT).
        #[arg(short, long, env = "SERVICE_PORT")]
        port: Option<u16>,
    },

    /// Convert a single local document and write the PDF.
    Convert {
        /// Document to convert.
        file: PathBuf,

        /// Write the PDF here instead of next to the input.
        #[arg(short, long, env = "MSGRAPH_PDF_OUTPUT")]
        output: Option<PathBuf>,

        /// Disable the upload progress bar.
        #[arg(long, env = "MSGRAPH_PDF_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List the ids of every drive the service identity can see.
    Drives {
        /// Print `{"drives": [...]}` instead of one id per line.
        #[arg(long, env = "MSGRAPH_PDF_JSON")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for `convert`; the service keeps them.
    let show_progress = matches!(
        cli.command,
        Command::Convert { no_progress: false, .. }
    ) && !cli.quiet;
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

    let port = match &cli.command {
        Command::Serve { port } => *port,
        _ => None,
    };
    let config = ServiceConfig::from_env_with_port(port).context("Invalid configuration")?;

    match cli.command {
        Command::Serve { .. } => {
            msgraph_pdf::server::serve(&config)
                .await
                .context("Server failed")?;
        }
        Command::Convert {
            file,
            output,
            no_progress: _,
        } => {
            let output = output.unwrap_or_else(|| default_output(&file));
            convert_file(&config, &file, &output, show_progress, cli.quiet).await?;
        }
        Command::Drives { json } => {
            let client = GraphClient::from_config(&config).context("Failed to build Graph client")?;
            let drives = client.list_drives().await.context("Failed to list drives")?;
            if json {
                let body = serde_json::json!({ "drives": drives });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&body).context("Failed to serialise drives")?
                );
            } else {
                for id in drives {
                    println!("{id}");
                }
            }
        }
    }

    Ok(())
}

async fn convert_file(
    config: &ServiceConfig,
    input: &Path,
    output: &Path,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let started = Instant::now();
    let client = Arc::new(GraphClient::from_config(config).context("Failed to build Graph client")?);
    let mut pipeline = ConversionPipeline::new(client, config).context("Invalid configuration")?;

    let progress = show_progress.then(CliUploadProgress::new);
    if let Some(ref cb) = progress {
        pipeline = pipeline.with_progress(cb.clone());
    }

    let upload = StagedUpload::local(input)
        .await
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let converted = pipeline.run(&upload).await.context("Conversion failed");

    if let Some(ref cb) = progress {
        cb.bar.finish_and_clear();
    }
    let converted = converted?;

    let bytes = converted
        .persist(output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        eprintln!(
            "{}  {} bytes  {}ms  →  {}",
            green("✔"),
            bytes,
            started.elapsed().as_millis(),
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

/// `report.docx` → `report.pdf` next to the input. A PDF input never gets
/// overwritten.
fn default_output(input: &Path) -> PathBuf {
    let candidate = input.with_extension("pdf");
    if candidate == input {
        input.with_extension("converted.pdf")
    } else {
        candidate
    }
}
