use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::RecordError;

/// Probed metadata of one video file, stored inline in a pair document.
///
/// Field names follow the document layout shared with the original desktop client
/// (`fileName`, `fileURL`, `isEdited`, ...), so documents written by either side decode
/// on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub file_name: String,
    pub file_size: i64,
    pub duration: f64,
    /// Local file reference; meaningless on other machines, so the store treats it as opaque.
    #[serde(rename = "fileURL", default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub is_edited: bool,
    pub fps: f32,
    pub resolution: String,
    pub codec: String,
}

impl VideoRecord {
    /// Build a record for a file on disk. The file name is taken from the path.
    pub fn for_path(
        path: &Path,
        file_size: i64,
        duration: f64,
        fps: f32,
        resolution: String,
        codec: String,
    ) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file_name,
            file_size,
            duration,
            file_url: Some(path.to_string_lossy().into_owned()),
            is_edited: false,
            fps,
            resolution,
            codec,
        }
    }

    /// Resolve the file reference to a local path.
    ///
    /// Accepts plain paths and `file://` URLs (percent-encoded, optionally with a
    /// `localhost` host). Returns `None` for a missing reference or a non-file URL.
    pub fn local_path(&self) -> Option<PathBuf> {
        let reference = self.file_url.as_deref()?.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(rest) = reference.strip_prefix("file://") {
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            if !rest.starts_with('/') {
                return None;
            }
            let decoded = urlencoding::decode(rest).ok()?;
            return Some(PathBuf::from(decoded.into_owned()));
        }

        if reference.contains("://") {
            return None;
        }

        Some(PathBuf::from(reference))
    }

    /// Check the record can be stored as an attachment owner.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.file_name.trim().is_empty() {
            return Err(RecordError::EmptyFileName);
        }
        if self.file_name.contains('/') || self.file_name.starts_with('_') {
            // CouchDB reserves leading underscores and treats '/' as a path separator
            return Err(RecordError::InvalidFileName(self.file_name.clone()));
        }

        let numeric = [
            ("duration", self.duration),
            ("fps", f64::from(self.fps)),
            ("fileSize", self.file_size as f64),
        ];
        for (field, value) in numeric {
            if value.is_nan() || value < 0.0 {
                return Err(RecordError::NegativeField { field, value });
            }
        }
        Ok(())
    }
}

/// One side of a compared pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairSide {
    A,
    B,
}

impl FromStr for PairSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a" | "1" | "left" => Ok(PairSide::A),
            "b" | "2" | "right" => Ok(PairSide::B),
            _ => Err(anyhow::anyhow!("Invalid pair side: {} (expected a or b)", s)),
        }
    }
}

impl Display for PairSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PairSide::A => write!(f, "a"),
            PairSide::B => write!(f, "b"),
        }
    }
}
