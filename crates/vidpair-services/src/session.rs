//! Upload input, per-upload session state and the success receipt.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use vidpair_core::{
    AttachmentBody, AttachmentSlot, PairDocument, PairSide, VideoRecord,
    COMPRESSED_VIDEO_ATTACHMENT, THUMBNAIL_ATTACHMENT,
};

use crate::error::UploadError;
use crate::reporter::{ProgressTracker, UploadReporter};

/// Everything needed to store one pair: the two probed records plus the derived payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct PairUpload {
    pub video_a: VideoRecord,
    pub video_b: VideoRecord,
    pub thumbnail: Option<Bytes>,
    pub compressed_video: Option<Bytes>,
}

impl PairUpload {
    pub fn new(video_a: VideoRecord, video_b: VideoRecord) -> Self {
        Self {
            video_a,
            video_b,
            thumbnail: None,
            compressed_video: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<Bytes>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_compressed_video(mut self, compressed: impl Into<Bytes>) -> Self {
        self.compressed_video = Some(compressed.into());
        self
    }

    /// Flag `side` as the edited video. At most one side of a pair is edited.
    pub fn mark_edited(&mut self, side: PairSide) {
        self.video_a.is_edited = side == PairSide::A;
        self.video_b.is_edited = side == PairSide::B;
    }

    pub fn video(&self, side: PairSide) -> &VideoRecord {
        match side {
            PairSide::A => &self.video_a,
            PairSide::B => &self.video_b,
        }
    }
}

/// Sequencer state. The revision travels inside `Uploading`, so each write can only
/// use the revision returned by the write before it.
#[derive(Debug)]
pub enum UploadState {
    Idle,
    CreatingDocument,
    Uploading {
        slot: AttachmentSlot,
        doc_id: String,
        rev: String,
    },
    Succeeded(UploadReceipt),
    Failed(UploadError),
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded(_) | UploadState::Failed(_))
    }
}

impl Display for UploadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadState::Idle => write!(f, "idle"),
            UploadState::CreatingDocument => write!(f, "creating_document"),
            UploadState::Uploading { slot, .. } => write!(f, "uploading({})", slot),
            UploadState::Succeeded(_) => write!(f, "succeeded"),
            UploadState::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Returned when all four attachments are stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub doc_id: String,
    /// Revision after the last attachment
    pub rev: String,
    /// Attachment names in upload order
    pub attachments: Vec<String>,
    pub bytes_uploaded: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct PlannedAttachment {
    pub slot: AttachmentSlot,
    pub name: String,
    pub body: AttachmentBody,
}

/// State of one `upload_pair` invocation.
pub struct UploadSession {
    upload: PairUpload,
    state: UploadState,
    plan: Vec<PlannedAttachment>,
    stored: Vec<String>,
    tracker: Arc<ProgressTracker>,
}

impl UploadSession {
    pub fn new(upload: PairUpload, reporter: Arc<dyn UploadReporter>) -> Self {
        Self {
            upload,
            state: UploadState::Idle,
            plan: Vec::new(),
            stored: Vec::new(),
            tracker: Arc::new(ProgressTracker::new(reporter)),
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn upload(&self) -> &PairUpload {
        &self.upload
    }

    /// Sum of all attachment sizes; zero until the upload is planned.
    pub fn total_bytes(&self) -> u64 {
        self.plan.iter().map(|p| p.body.len()).sum()
    }

    /// Names of attachments stored so far, in order.
    pub fn stored_attachments(&self) -> &[String] {
        &self.stored
    }

    pub(crate) fn tracker(&self) -> Arc<ProgressTracker> {
        self.tracker.clone()
    }

    pub(crate) fn take_state(&mut self) -> UploadState {
        std::mem::replace(&mut self.state, UploadState::Idle)
    }

    pub(crate) fn enter(&mut self, next: UploadState) {
        tracing::debug!(state = %next, "Upload state transition");
        self.state = next;
    }

    /// Check every precondition and lay out the four writes.
    ///
    /// Touches only the local filesystem; on error nothing has been sent.
    pub(crate) async fn prepare(&mut self) -> Result<(), UploadError> {
        let thumbnail = required_bytes(self.upload.thumbnail.as_ref(), "thumbnail")?;
        let compressed =
            required_bytes(self.upload.compressed_video.as_ref(), "compressed video")?;

        let mut names: HashSet<String> = HashSet::from([
            THUMBNAIL_ATTACHMENT.to_string(),
            COMPRESSED_VIDEO_ATTACHMENT.to_string(),
        ]);
        let mut plan = Vec::with_capacity(AttachmentSlot::ORDER.len());

        for (slot, record) in [
            (AttachmentSlot::VideoA, &self.upload.video_a),
            (AttachmentSlot::VideoB, &self.upload.video_b),
        ] {
            record.validate().map_err(|e| UploadError::InvalidRecord {
                file_name: record.file_name.clone(),
                reason: e.to_string(),
            })?;
            if !names.insert(record.file_name.clone()) {
                return Err(UploadError::InvalidRecord {
                    file_name: record.file_name.clone(),
                    reason: "attachment name is already used by this pair".to_string(),
                });
            }

            plan.push(PlannedAttachment {
                slot,
                name: record.file_name.clone(),
                body: original_file(record).await?,
            });
        }

        plan.push(PlannedAttachment {
            slot: AttachmentSlot::Thumbnail,
            name: THUMBNAIL_ATTACHMENT.to_string(),
            body: AttachmentBody::Bytes(thumbnail),
        });
        plan.push(PlannedAttachment {
            slot: AttachmentSlot::CompressedVideo,
            name: COMPRESSED_VIDEO_ATTACHMENT.to_string(),
            body: AttachmentBody::Bytes(compressed),
        });

        self.plan = plan;
        self.tracker.begin(self.total_bytes());
        Ok(())
    }

    /// Document body for the create call.
    pub(crate) fn document(&self) -> PairDocument {
        PairDocument::new(self.upload.video_a.clone(), self.upload.video_b.clone())
    }

    pub(crate) fn planned(&self, slot: AttachmentSlot) -> Option<&PlannedAttachment> {
        self.plan.iter().find(|p| p.slot == slot)
    }

    /// Bytes of every attachment up to and including `slot`.
    pub(crate) fn bytes_through(&self, slot: AttachmentSlot) -> u64 {
        let mut total = 0;
        for planned in &self.plan {
            total += planned.body.len();
            if planned.slot == slot {
                break;
            }
        }
        total
    }

    pub(crate) fn record_stored(&mut self, name: String) {
        self.stored.push(name);
    }
}

fn required_bytes(bytes: Option<&Bytes>, what: &str) -> Result<Bytes, UploadError> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => Ok(bytes.clone()),
        Some(_) => Err(UploadError::MissingPayload(format!("{} is empty", what))),
        None => Err(UploadError::MissingPayload(format!("no {} was provided", what))),
    }
}

async fn original_file(record: &VideoRecord) -> Result<AttachmentBody, UploadError> {
    let path = record.local_path().ok_or_else(|| {
        UploadError::MissingPayload(format!("{} has no local file", record.file_name))
    })?;

    let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
        UploadError::MissingPayload(format!("cannot read {}: {}", path.display(), e))
    })?;
    if !metadata.is_file() || metadata.len() == 0 {
        return Err(UploadError::MissingPayload(format!(
            "{} is not a non-empty file",
            path.display()
        )));
    }

    Ok(AttachmentBody::File {
        path,
        len: metadata.len(),
    })
}
