//! Video metadata extraction via ffprobe

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use vidpair_core::{ProcessingConfig, VideoRecord};

use crate::command::{ensure_input, run, validate_executable};
use crate::error::ProcessingError;

/// Reads the metadata stored for one side of a pair.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<VideoRecord, ProcessingError>;
}

pub struct FfprobeProber {
    ffprobe_path: String,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<String>) -> Result<Self, ProcessingError> {
        let ffprobe_path = ffprobe_path.into();
        validate_executable(&ffprobe_path)?;
        Ok(Self { ffprobe_path })
    }

    pub fn from_config(config: &ProcessingConfig) -> Result<Self, ProcessingError> {
        Self::new(config.ffprobe_path.clone())
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        path = %path.display()
    ))]
    async fn probe(&self, path: &Path) -> Result<VideoRecord, ProcessingError> {
        let start = std::time::Instant::now();
        let file_size = ensure_input(path).await?;

        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = run(&self.ffprobe_path, &args, ProcessingError::Probe).await?;
        let record = parse_probe_output(&output.stdout, path, file_size)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = record.duration,
            resolution = %record.resolution,
            codec = %record.codec,
            "Video probe completed"
        );
        Ok(record)
    }
}

/// Build a record from ffprobe's `-show_format -show_streams` JSON.
pub(crate) fn parse_probe_output(
    stdout: &[u8],
    path: &Path,
    file_size: u64,
) -> Result<VideoRecord, ProcessingError> {
    let probe: Value = serde_json::from_slice(stdout)
        .map_err(|e| ProcessingError::Probe(format!("unparseable ffprobe output: {}", e)))?;

    let streams = probe["streams"].as_array().cloned().unwrap_or_default();
    let video = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| ProcessingError::Probe("No video stream found".into()))?;

    let width = video["width"]
        .as_u64()
        .ok_or_else(|| ProcessingError::Probe("Could not parse width".into()))?;
    let height = video["height"]
        .as_u64()
        .ok_or_else(|| ProcessingError::Probe("Could not parse height".into()))?;

    let duration = probe["format"]["duration"]
        .as_str()
        .or_else(|| video["duration"].as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| ProcessingError::Probe("Could not parse duration".into()))?;

    let fps = video["r_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .or_else(|| video["avg_frame_rate"].as_str().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let mut codecs: Vec<&str> = Vec::new();
    for name in streams.iter().filter_map(|s| s["codec_name"].as_str()) {
        if !codecs.contains(&name) {
            codecs.push(name);
        }
    }

    Ok(VideoRecord::for_path(
        path,
        i64::try_from(file_size).unwrap_or(i64::MAX),
        duration,
        fps,
        format!("{} x {}", width, height),
        codecs.join(", "),
    ))
}

/// Parse a rational frame rate such as `30000/1001`.
fn parse_frame_rate(rate: &str) -> Option<f32> {
    let (num, den) = rate.split_once('/')?;
    let num: f32 = num.trim().parse().ok()?;
    let den: f32 = den.trim().parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}
