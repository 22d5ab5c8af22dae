//! vidpair Core Library
//!
//! This crate provides the domain models, the document wire codec, error types and
//! connection configuration shared by every vidpair component.

pub mod codec;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use codec::{decode, decode_value, encode};
pub use config::{ProcessingConfig, StoreConfig};
pub use error::{CodecError, ErrorMetadata, LogLevel, RecordError};
pub use models::{
    AttachmentBody, AttachmentSlot, AttachmentStub, PairDocument, PairSide, VideoRecord, WriteResponse,
    COMPRESSED_VIDEO_ATTACHMENT, THUMBNAIL_ATTACHMENT,
};
