//! rowcode CLI: bulk-convert table values into barcode attachments.
//!
//! Configuration comes from the environment (and `.env`); see `rowcode_core::Config`.
//! Without ROWCODE_API_URL attachments are written under ROWCODE_OUTPUT_DIR.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use rowcode_cli::{format_report, init_tracing, print_json, source_for_path};
use rowcode_core::models::{
    ConversionConfig, ConversionEvent, EncodingKind, ImageFormat, Rgb, StyleOptions,
};
use rowcode_core::Config;
use rowcode_processing::{validate_config, BarcodeEncoder, ConversionPipeline, Encoder};
use rowcode_storage::{create_upload_client, AttachmentSlot};
use rowcode_worker::{WorkQueue, WorkQueueConfig};

#[derive(Parser)]
#[command(name = "rowcode", about = "Convert table values into barcode images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every row of a CSV or JSON file and attach the images to their records
    Convert(ConvertArgs),
    /// Encode a single value into an image file
    Encode {
        /// Value to encode
        value: String,
        /// Output file
        #[arg(long, short)]
        output: PathBuf,
        #[command(flatten)]
        style: StyleArgs,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// Input file (.csv or .json)
    input: PathBuf,
    /// CSV column holding the values to encode
    #[arg(long, default_value = "value")]
    value_column: String,
    /// CSV column holding record ids (default: row-N)
    #[arg(long)]
    id_column: Option<String>,
    /// Table receiving the attachments (remote uploads only)
    #[arg(long, env = "ROWCODE_TABLE_ID")]
    table_id: Option<String>,
    /// Attachment field (remote uploads only)
    #[arg(long, env = "ROWCODE_FIELD_ID")]
    field_id: Option<String>,
    /// Output directory for local uploads (overrides ROWCODE_OUTPUT_DIR)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Maximum concurrent uploads (overrides ROWCODE_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Minimum milliseconds between upload dispatches (overrides ROWCODE_DISPATCH_INTERVAL_MS)
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Retries per upload on transient failure (overrides ROWCODE_MAX_RETRIES)
    #[arg(long)]
    max_retries: Option<u32>,
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args)]
struct StyleArgs {
    /// Symbology: code39, ean13, ean8, qr
    #[arg(long, default_value = "code39")]
    kind: EncodingKind,
    /// Image format: png or jpeg
    #[arg(long, default_value = "png")]
    image: ImageFormat,
    /// Bar color as #rrggbb
    #[arg(long, default_value = "#000000")]
    foreground: Rgb,
    /// Background color as #rrggbb
    #[arg(long, default_value = "#ffffff")]
    background: Rgb,
    /// Width of the narrowest bar in pixels
    #[arg(long, default_value = "2")]
    module_width: u32,
    /// Bar height in pixels
    #[arg(long, default_value = "100")]
    height: u32,
    /// Quiet zone on each side, in modules
    #[arg(long, default_value = "10")]
    quiet_zone: u32,
}

impl StyleArgs {
    fn conversion_config(&self) -> ConversionConfig {
        ConversionConfig::new(self.kind)
            .with_image_format(self.image)
            .with_style(StyleOptions {
                module_width: self.module_width,
                height: self.height,
                quiet_zone: self.quiet_zone,
                foreground: self.foreground,
                background: self.background,
            })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env().context("Failed to read configuration")?;
    let cli = Cli::parse();

    init_tracing(config.log_format == "json");

    match cli.command {
        Commands::Convert(args) => convert(&mut config, args).await,
        Commands::Encode {
            value,
            output,
            style,
        } => encode(&value, &output, &style).await,
    }
}

async fn convert(config: &mut Config, args: ConvertArgs) -> anyhow::Result<()> {
    if let Some(out_dir) = args.out_dir.clone() {
        config.output_dir = out_dir;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.dispatch_interval_ms = interval_ms;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    config.validate().context("Invalid configuration")?;

    let conversion = args.style.conversion_config();
    validate_config(&conversion)?;

    let slot = match (args.table_id, args.field_id) {
        (Some(table_id), Some(field_id)) => Some(AttachmentSlot::new(table_id, field_id)),
        _ => None,
    };
    let uploader = create_upload_client(&config.upload_target(), slot)
        .await
        .context("Failed to create upload client")?;
    let source = source_for_path(&args.input, &args.value_column, args.id_column.as_deref())?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let pipeline = ConversionPipeline::new(
        WorkQueue::new(WorkQueueConfig::from(&*config)),
        Arc::new(BarcodeEncoder::new()),
    )
    .with_events(events_tx);

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling queued uploads");
            cancel.cancel();
        }
    });

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}")
                .context("Invalid progress template")?,
        );
        bar
    };
    let progress_task = {
        let progress = progress.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    ConversionEvent::Progress { percent } => progress.set_position(percent as u64),
                    ConversionEvent::Stats(stats) => progress.set_message(format!(
                        "{} ok, {} failed, {} in flight",
                        stats.success, stats.failed, stats.processing
                    )),
                    ConversionEvent::ItemFailed(_) => {}
                }
            }
        })
    };

    let report = pipeline
        .run_source(source.as_ref(), &conversion, uploader)
        .await
        .with_context(|| format!("Conversion of {} failed", args.input.display()))?;

    drop(pipeline);
    let _ = progress_task.await;
    progress.finish_and_clear();

    match args.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print!("{}", format_report(&report)),
    }

    Ok(())
}

async fn encode(value: &str, output: &Path, style: &StyleArgs) -> anyhow::Result<()> {
    let conversion = style.conversion_config();
    validate_config(&conversion)?;

    let image = BarcodeEncoder::new()
        .encode(value.trim(), &conversion)
        .with_context(|| format!("Failed to encode '{}'", value))?;

    tokio::fs::write(output, &image.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_json(&serde_json::json!({
        "file": output.display().to_string(),
        "mime_type": image.mime_type,
        "size_bytes": image.bytes.len(),
    }))
}
