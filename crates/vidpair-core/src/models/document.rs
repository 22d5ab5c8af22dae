use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::video::{PairSide, VideoRecord};

/// Metadata of an attachment as reported back by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentStub {
    pub content_type: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// The persisted record for two compared videos.
///
/// `id` and `rev` are assigned by the store: both are `None` until the document has been
/// created, and `rev` changes on every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PairDocument {
    pub id: Option<String>,
    pub rev: Option<String>,
    pub video_a: VideoRecord,
    pub video_b: VideoRecord,
    /// Attachment stubs keyed by attachment name
    pub attachments: BTreeMap<String, AttachmentStub>,
}

impl PairDocument {
    /// A document that has not been created in the store yet.
    pub fn new(video_a: VideoRecord, video_b: VideoRecord) -> Self {
        Self {
            id: None,
            rev: None,
            video_a,
            video_b,
            attachments: BTreeMap::new(),
        }
    }

    pub fn video(&self, side: PairSide) -> &VideoRecord {
        match side {
            PairSide::A => &self.video_a,
            PairSide::B => &self.video_b,
        }
    }

    /// Which side, if any, is flagged as the edited one.
    pub fn edited_side(&self) -> Option<PairSide> {
        match (self.video_a.is_edited, self.video_b.is_edited) {
            (true, false) => Some(PairSide::A),
            (false, true) => Some(PairSide::B),
            _ => None,
        }
    }

    pub fn has_attachment(&self, name: &str) -> bool {
        self.attachments.contains_key(name)
    }
}

/// Body of a successful write (`{ok, id, rev}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    pub rev: String,
}
