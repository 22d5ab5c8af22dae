//! vidpair CLI: store pairs of videos in CouchDB and read them back.
//!
//! Connection settings come from COUCHDB_URL, COUCHDB_DATABASE, COUCHDB_USER and
//! COUCHDB_PASSWORD (a `.env` file is honoured). FFMPEG_PATH and FFPROBE_PATH override
//! the media tools.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use vidpair_cli::{
    build_pair, completion_message, init_tracing, CompressedSource, MediaTools, PairRequest, PairSummary,
    ThumbnailSource,
};
use vidpair_core::{PairSide, ProcessingConfig, StoreConfig};
use vidpair_processing::{
    CompressionPreset, FfmpegCompressor, FfmpegThumbnailer, FfprobeProber, MediaProber,
};
use vidpair_services::{export_csv, Catalog, FnReporter, UploadError, UploadReceipt, Uploader};
use vidpair_store::{create_store, DocumentStore};

#[derive(Parser)]
#[command(name = "vidpair", about = "Store and browse compared video pairs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metadata that would be stored for a video
    Probe {
        /// Path to the video
        file: PathBuf,
    },
    /// Upload a pair: document, both originals, thumbnail and compressed video
    Upload {
        /// First video of the pair
        video_a: PathBuf,
        /// Second video of the pair
        video_b: PathBuf,
        /// Which side is the edited one: a or b
        #[arg(long)]
        edited: Option<PairSide>,
        /// Use this image as the thumbnail instead of capturing a frame
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// Capture the thumbnail at this many seconds
        #[arg(long, default_value = "1.0")]
        thumbnail_at: f64,
        /// Use this file as the compressed video instead of compressing
        #[arg(long)]
        compressed: Option<PathBuf>,
        /// Side to compress and capture from (default: the edited side, else a)
        #[arg(long)]
        compress: Option<PairSide>,
        /// Compression preset: low, medium or high
        #[arg(long, default_value = "medium")]
        preset: CompressionPreset,
    },
    /// List stored pairs
    List,
    /// Export stored pairs as CSV
    Export {
        /// Output file
        #[arg(long, default_value = "VideoInfo.csv")]
        output: PathBuf,
    },
    /// Download the thumbnail of a stored pair
    Thumbnail {
        /// Document id
        doc_id: String,
        /// Output file
        #[arg(long)]
        output: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn connect() -> anyhow::Result<Arc<dyn DocumentStore>> {
    let config = StoreConfig::from_env()
        .context("Failed to load store configuration. Set COUCHDB_PASSWORD (and COUCHDB_URL)")?;
    create_store(&config).context("Failed to create document store")
}

fn print_progress(uploaded: u64, total: u64) {
    let percent = if total == 0 {
        100.0
    } else {
        uploaded as f64 * 100.0 / total as f64
    };
    eprint!("\rUploading: {:>5.1}% ({} / {} bytes)", percent, uploaded, total);
    let _ = std::io::stderr().flush();
}

fn print_completion(outcome: &Result<UploadReceipt, UploadError>) {
    eprintln!();
    if let Some(message) = completion_message(outcome) {
        eprintln!("{}", message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let processing = ProcessingConfig::from_env();

    match cli.command {
        Commands::Probe { file } => {
            let prober = FfprobeProber::from_config(&processing)?;
            let record = prober
                .probe(&file)
                .await
                .with_context(|| format!("Failed to probe {}", file.display()))?;
            print_json(&record)?;
        }
        Commands::Upload {
            video_a,
            video_b,
            edited,
            thumbnail,
            thumbnail_at,
            compressed,
            compress,
            preset,
        } => {
            let store = connect()?;
            let side = compress.or(edited).unwrap_or(PairSide::A);
            let request = PairRequest {
                video_a,
                video_b,
                edited,
                thumbnail: match thumbnail {
                    Some(path) => ThumbnailSource::File(path),
                    None => ThumbnailSource::Capture {
                        side,
                        at: thumbnail_at,
                    },
                },
                compressed: match compressed {
                    Some(path) => CompressedSource::File(path),
                    None => CompressedSource::Compress { side, preset },
                },
            };

            let prober = FfprobeProber::from_config(&processing)?;
            let thumbnailer = FfmpegThumbnailer::from_config(&processing)?;
            let compressor = FfmpegCompressor::from_config(&processing)?;
            let tools = MediaTools {
                prober: &prober,
                thumbnailer: &thumbnailer,
                compressor: &compressor,
            };
            let upload = build_pair(&tools, &request).await?;

            let reporter = Arc::new(FnReporter::new(print_progress, print_completion));
            match Uploader::new(store).upload_pair(upload, reporter).await {
                Ok(receipt) => print_json(&receipt)?,
                // Already reported by the completion callback
                Err(_) => return Ok(ExitCode::FAILURE),
            }
        }
        Commands::List => {
            let documents = Catalog::new(connect()?)
                .fetch_all()
                .await
                .context("Failed to list documents")?;
            let summaries: Vec<PairSummary> = documents.iter().map(PairSummary::from).collect();
            print_json(&summaries)?;
        }
        Commands::Export { output } => {
            let documents = Catalog::new(connect()?)
                .fetch_all()
                .await
                .context("Failed to list documents")?;
            let rendered = export_csv(&documents).context("Failed to render CSV")?;
            tokio::fs::write(&output, rendered)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&serde_json::json!({
                "exported": documents.len(),
                "output": output.display().to_string(),
            }))?;
        }
        Commands::Thumbnail { doc_id, output } => {
            let image = Catalog::new(connect()?)
                .fetch_thumbnail(&doc_id)
                .await
                .with_context(|| format!("Failed to download thumbnail of {}", doc_id))?;
            tokio::fs::write(&output, &image)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&serde_json::json!({
                "doc_id": doc_id,
                "bytes": image.len(),
                "output": output.display().to_string(),
            }))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
