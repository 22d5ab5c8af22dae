use thiserror::Error;

/// Media processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Thumbnail failed: {0}")]
    Thumbnail(String),

    #[error("Invalid executable path: {0}")]
    InvalidExecutable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
