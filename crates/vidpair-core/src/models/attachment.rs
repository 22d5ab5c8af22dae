use bytes::Bytes;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// Attachment name of the captured thumbnail
pub const THUMBNAIL_ATTACHMENT: &str = "thumbnail.jpg";
/// Attachment name of the compressed video
pub const COMPRESSED_VIDEO_ATTACHMENT: &str = "compressed_video.mp4";

/// The four attachments of a pair document, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    VideoA,
    VideoB,
    Thumbnail,
    CompressedVideo,
}

impl AttachmentSlot {
    pub const ORDER: [AttachmentSlot; 4] = [
        AttachmentSlot::VideoA,
        AttachmentSlot::VideoB,
        AttachmentSlot::Thumbnail,
        AttachmentSlot::CompressedVideo,
    ];

    pub fn content_type(self) -> &'static str {
        match self {
            AttachmentSlot::VideoA | AttachmentSlot::VideoB => "application/octet-stream",
            AttachmentSlot::Thumbnail => "image/jpeg",
            AttachmentSlot::CompressedVideo => "video/mp4",
        }
    }

    /// Fixed attachment name, if the slot has one. Video slots use the file name.
    pub fn fixed_name(self) -> Option<&'static str> {
        match self {
            AttachmentSlot::Thumbnail => Some(THUMBNAIL_ATTACHMENT),
            AttachmentSlot::CompressedVideo => Some(COMPRESSED_VIDEO_ATTACHMENT),
            AttachmentSlot::VideoA | AttachmentSlot::VideoB => None,
        }
    }

    pub fn next(self) -> Option<AttachmentSlot> {
        match self {
            AttachmentSlot::VideoA => Some(AttachmentSlot::VideoB),
            AttachmentSlot::VideoB => Some(AttachmentSlot::Thumbnail),
            AttachmentSlot::Thumbnail => Some(AttachmentSlot::CompressedVideo),
            AttachmentSlot::CompressedVideo => None,
        }
    }
}

impl Display for AttachmentSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AttachmentSlot::VideoA => write!(f, "video_a"),
            AttachmentSlot::VideoB => write!(f, "video_b"),
            AttachmentSlot::Thumbnail => write!(f, "thumbnail"),
            AttachmentSlot::CompressedVideo => write!(f, "compressed_video"),
        }
    }
}

/// Payload of one attachment write.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentBody {
    /// Buffered in memory
    Bytes(Bytes),
    /// Streamed from disk; `len` is taken when the upload is planned
    File { path: PathBuf, len: u64 },
}

impl AttachmentBody {
    pub fn len(&self) -> u64 {
        match self {
            AttachmentBody::Bytes(bytes) => bytes.len() as u64,
            AttachmentBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_order_follows_next() {
        let mut walked = vec![AttachmentSlot::ORDER[0]];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, AttachmentSlot::ORDER.to_vec());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            AttachmentSlot::VideoB.content_type(),
            "application/octet-stream"
        );
        assert_eq!(AttachmentSlot::Thumbnail.content_type(), "image/jpeg");
        assert_eq!(AttachmentSlot::CompressedVideo.content_type(), "video/mp4");
        assert_eq!(
            AttachmentSlot::Thumbnail.fixed_name(),
            Some("thumbnail.jpg")
        );
        assert_eq!(AttachmentSlot::VideoA.fixed_name(), None);
    }

    #[test]
    fn test_body_len() {
        let body = AttachmentBody::Bytes(Bytes::from_static(b"jpeg"));
        assert_eq!(body.len(), 4);
        let body = AttachmentBody::File {
            path: PathBuf::from("/tmp/a.mov"),
            len: 0,
        };
        assert!(body.is_empty());
    }
}
