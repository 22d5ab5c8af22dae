//! Shared pieces of the `vidpair` binary: tracing setup and assembling a pair upload
//! from two video files.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use vidpair_core::{PairDocument, PairSide, VideoRecord};
use vidpair_processing::{
    fit_jpeg, CompressionPreset, MediaCompressor, MediaProber, ThumbnailCapturer,
    MAX_THUMBNAIL_BYTES,
};
use vidpair_services::{PairUpload, UploadError, UploadReceipt};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// The one line shown to the user when an upload ends; `None` on success.
pub fn completion_message(outcome: &Result<UploadReceipt, UploadError>) -> Option<String> {
    outcome.as_ref().err().map(UploadError::user_message)
}

/// Where the thumbnail attachment comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailSource {
    /// An existing image file, re-encoded to fit
    File(PathBuf),
    /// A frame of the given side at `at` seconds
    Capture { side: PairSide, at: f64 },
}

/// Where the compressed video attachment comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressedSource {
    /// An already compressed MP4
    File(PathBuf),
    Compress {
        side: PairSide,
        preset: CompressionPreset,
    },
}

#[derive(Debug, Clone)]
pub struct PairRequest {
    pub video_a: PathBuf,
    pub video_b: PathBuf,
    pub edited: Option<PairSide>,
    pub thumbnail: ThumbnailSource,
    pub compressed: CompressedSource,
}

/// Media tools used to turn a [`PairRequest`] into a [`PairUpload`].
pub struct MediaTools<'a> {
    pub prober: &'a dyn MediaProber,
    pub thumbnailer: &'a dyn ThumbnailCapturer,
    pub compressor: &'a dyn MediaCompressor,
}

/// Probe both videos and produce the thumbnail and compressed payloads.
pub async fn build_pair(tools: &MediaTools<'_>, request: &PairRequest) -> Result<PairUpload> {
    let video_a = probe(tools, &request.video_a).await?;
    let video_b = probe(tools, &request.video_b).await?;

    let mut upload = PairUpload::new(video_a, video_b);
    if let Some(side) = request.edited {
        upload.mark_edited(side);
    }

    let thumbnail = thumbnail_bytes(tools, request).await?;
    let compressed = compressed_bytes(tools, request, &upload).await?;

    Ok(upload
        .with_thumbnail(thumbnail)
        .with_compressed_video(compressed))
}

async fn probe(tools: &MediaTools<'_>, path: &Path) -> Result<VideoRecord> {
    tools
        .prober
        .probe(path)
        .await
        .with_context(|| format!("Failed to probe {}", path.display()))
}

fn side_path(request: &PairRequest, side: PairSide) -> &Path {
    match side {
        PairSide::A => &request.video_a,
        PairSide::B => &request.video_b,
    }
}

async fn thumbnail_bytes(tools: &MediaTools<'_>, request: &PairRequest) -> Result<Bytes> {
    let image = match &request.thumbnail {
        ThumbnailSource::File(path) => Bytes::from(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read thumbnail {}", path.display()))?,
        ),
        ThumbnailSource::Capture { side, at } => tools
            .thumbnailer
            .capture_frame(side_path(request, *side), *at)
            .await
            .with_context(|| format!("Failed to capture thumbnail from video {}", side))?,
    };

    let fitted = tokio::task::spawn_blocking(move || fit_jpeg(&image, MAX_THUMBNAIL_BYTES))
        .await
        .context("Thumbnail encoding task panicked")?
        .context("Failed to encode thumbnail")?;
    tracing::info!(size = fitted.len(), "Thumbnail ready");
    Ok(fitted)
}

async fn compressed_bytes(
    tools: &MediaTools<'_>,
    request: &PairRequest,
    upload: &PairUpload,
) -> Result<Bytes> {
    match &request.compressed {
        CompressedSource::File(path) => Ok(Bytes::from(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read compressed video {}", path.display()))?,
        )),
        CompressedSource::Compress { side, preset } => {
            let source = upload.video(*side);
            tracing::info!(
                video = %source.file_name,
                preset = %preset,
                estimated_bytes = preset.estimated_size(source.duration),
                "Compressing video"
            );
            tools
                .compressor
                .compress(side_path(request, *side), *preset)
                .await
                .with_context(|| format!("Failed to compress video {}", side))
        }
    }
}

/// Listing entry printed by `vidpair list`.
#[derive(Debug, Serialize)]
pub struct PairSummary<'a> {
    pub id: Option<&'a str>,
    pub rev: Option<&'a str>,
    pub edited: Option<PairSide>,
    pub video_a: &'a VideoRecord,
    pub video_b: &'a VideoRecord,
    pub attachments: Vec<&'a str>,
}

impl<'a> From<&'a PairDocument> for PairSummary<'a> {
    fn from(doc: &'a PairDocument) -> Self {
        Self {
            id: doc.id.as_deref(),
            rev: doc.rev.as_deref(),
            edited: doc.edited_side(),
            video_a: &doc.video_a,
            video_b: &doc.video_b,
            attachments: doc.attachments.keys().map(String::as_str).collect(),
        }
    }
}
