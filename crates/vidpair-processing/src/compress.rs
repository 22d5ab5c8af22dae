//! Video compression via ffmpeg

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;
use vidpair_core::ProcessingConfig;

use crate::command::{ensure_input, run, validate_executable};
use crate::error::ProcessingError;

/// Quality presets for the compressed copy of the edited video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionPreset {
    /// Target height in pixels; `None` keeps the source resolution.
    pub fn max_height(self) -> Option<u32> {
        match self {
            CompressionPreset::Low => Some(360),
            CompressionPreset::Medium => Some(720),
            CompressionPreset::High => None,
        }
    }

    /// x264 constant rate factor
    pub fn crf(self) -> u8 {
        match self {
            CompressionPreset::Low => 32,
            CompressionPreset::Medium => 28,
            CompressionPreset::High => 23,
        }
    }

    pub fn audio_bitrate_kbps(self) -> u32 {
        match self {
            CompressionPreset::Low => 64,
            CompressionPreset::Medium => 128,
            CompressionPreset::High => 192,
        }
    }

    /// Typical combined bitrate of the output, used for size estimates only.
    pub fn nominal_bitrate_kbps(self) -> u32 {
        match self {
            CompressionPreset::Low => 800,
            CompressionPreset::Medium => 2_500,
            CompressionPreset::High => 6_000,
        }
    }

    /// Approximate output size in bytes for a video of `duration` seconds.
    pub fn estimated_size(self, duration: f64) -> u64 {
        if !duration.is_finite() || duration <= 0.0 {
            return 0;
        }
        (f64::from(self.nominal_bitrate_kbps()) * 1000.0 / 8.0 * duration).round() as u64
    }

    fn ffmpeg_args(self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec!["-i".to_string(), input.to_string_lossy().to_string()];

        if let Some(height) = self.max_height() {
            // -2 keeps the width even, which libx264 requires
            args.extend_from_slice(&["-vf".to_string(), format!("scale=-2:'min({},ih)'", height)]);
        }

        args.extend_from_slice(&[
            "-c:v".to_string(),
            "libx264".to_string(),
            "-crf".to_string(),
            self.crf().to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.audio_bitrate_kbps()),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }
}

impl FromStr for CompressionPreset {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(CompressionPreset::Low),
            "medium" => Ok(CompressionPreset::Medium),
            "high" => Ok(CompressionPreset::High),
            _ => Err(ProcessingError::Compression(format!(
                "Invalid compression preset: {}",
                s
            ))),
        }
    }
}

impl Display for CompressionPreset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CompressionPreset::Low => write!(f, "low"),
            CompressionPreset::Medium => write!(f, "medium"),
            CompressionPreset::High => write!(f, "high"),
        }
    }
}

/// Produces the MP4 uploaded as the compressed attachment.
#[async_trait]
pub trait MediaCompressor: Send + Sync {
    async fn compress(
        &self,
        path: &Path,
        preset: CompressionPreset,
    ) -> Result<Bytes, ProcessingError>;
}

pub struct FfmpegCompressor {
    ffmpeg_path: String,
}

impl FfmpegCompressor {
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
impl MediaCompressor for FfmpegCompressor {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        ffmpeg.operation = "compress",
        path = %path.display(),
        preset = %preset
    ))]
    async fn compress(
        &self,
        path: &Path,
        preset: CompressionPreset,
    ) -> Result<Bytes, ProcessingError> {
        let start = std::time::Instant::now();
        let input_size = ensure_input(path).await?;

        let output = tempfile::Builder::new()
            .prefix("vidpair-compressed-")
            .suffix(".mp4")
            .tempfile()?;

        run(
            &self.ffmpeg_path,
            &preset.ffmpeg_args(path, output.path()),
            ProcessingError::Compression,
        )
        .await?;

        let data = tokio::fs::read(output.path()).await?;
        if data.is_empty() {
            return Err(ProcessingError::Compression(
                "ffmpeg produced an empty file".into(),
            ));
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            input_size,
            output_size = data.len(),
            "Video compression completed"
        );
        Ok(Bytes::from(data))
    }
}
