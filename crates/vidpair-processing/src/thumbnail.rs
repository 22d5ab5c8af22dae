//! Thumbnail capture and JPEG fitting

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::Path;
use vidpair_core::ProcessingConfig;

use crate::command::{ensure_input, run, validate_executable};
use crate::error::ProcessingError;

/// Upper bound for a stored thumbnail
pub const MAX_THUMBNAIL_BYTES: usize = 1024 * 1024;

const START_QUALITY: u8 = 70;
const QUALITY_STEP: u8 = 10;
const MIN_QUALITY: u8 = 10;

/// Grabs a still frame from a video.
#[async_trait]
pub trait ThumbnailCapturer: Send + Sync {
    /// Capture the frame at `timestamp` seconds, returned as encoded image bytes.
    async fn capture_frame(&self, path: &Path, timestamp: f64) -> Result<Bytes, ProcessingError>;
}

pub struct FfmpegThumbnailer {
    ffmpeg_path: String,
}

impl FfmpegThumbnailer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Result<Self, ProcessingError> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_executable(&ffmpeg_path)?;
        Ok(Self { ffmpeg_path })
    }

    pub fn from_config(config: &ProcessingConfig) -> Result<Self, ProcessingError> {
        Self::new(config.ffmpeg_path.clone())
    }
}

#[async_trait]
impl ThumbnailCapturer for FfmpegThumbnailer {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        ffmpeg.operation = "thumbnail",
        path = %path.display()
    ))]
    async fn capture_frame(&self, path: &Path, timestamp: f64) -> Result<Bytes, ProcessingError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(ProcessingError::Thumbnail(format!(
                "invalid timestamp {}",
                timestamp
            )));
        }
        ensure_input(path).await?;

        let output = tempfile::Builder::new()
            .prefix("vidpair-thumbnail-")
            .suffix(".jpg")
            .tempfile()?;

        let args = vec![
            "-ss".to_string(),
            timestamp.to_string(),
            "-i".to_string(),
            path.to_string_lossy().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-y".to_string(),
            output.path().to_string_lossy().to_string(),
        ];
        run(&self.ffmpeg_path, &args, ProcessingError::Thumbnail).await?;

        let data = tokio::fs::read(output.path()).await?;
        if data.is_empty() {
            // ffmpeg exits cleanly when seeking past the end but writes nothing
            return Err(ProcessingError::Thumbnail(format!(
                "no frame at {}s",
                timestamp
            )));
        }
        Ok(Bytes::from(data))
    }
}

/// Re-encode an image as JPEG small enough to store as the thumbnail.
///
/// Starts at quality 70 and lowers it in steps of 10 until the output fits in
/// `max_bytes`. When even quality 10 is too large, the quality-10 encoding is returned.
pub fn fit_jpeg(image_bytes: &[u8], max_bytes: usize) -> Result<Bytes, ProcessingError> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| ProcessingError::Thumbnail(format!("unreadable image: {}", e)))?;
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut quality = START_QUALITY;
    loop {
        let encoded = encode_jpeg(&rgb, quality)?;
        if encoded.len() <= max_bytes || quality <= MIN_QUALITY {
            tracing::debug!(quality, size = encoded.len(), "Thumbnail encoded");
            return Ok(Bytes::from(encoded));
        }
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| ProcessingError::Thumbnail(format!("JPEG encoding failed: {}", e)))?;
    Ok(buffer)
}
