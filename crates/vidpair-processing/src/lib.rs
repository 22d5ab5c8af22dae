//! vidpair media processing
//!
//! Thin async wrappers around the `ffprobe` and `ffmpeg` executables plus JPEG fitting for
//! thumbnails. Each capability sits behind a trait so callers can substitute a fake.

mod command;
pub mod compress;
pub mod error;
pub mod probe;
pub mod thumbnail;

pub use compress::{CompressionPreset, FfmpegCompressor, MediaCompressor};
pub use error::ProcessingError;
pub use probe::{FfprobeProber, MediaProber};
pub use thumbnail::{fit_jpeg, FfmpegThumbnailer, ThumbnailCapturer, MAX_THUMBNAIL_BYTES};
