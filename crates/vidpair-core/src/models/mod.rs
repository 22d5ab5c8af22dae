//! Data models
//!
//! The pair document with its two inline video records, and the attachment types used
//! when uploading payloads to it.

mod attachment;
mod document;
mod video;

pub use attachment::*;
pub use document::*;
pub use video::*;
