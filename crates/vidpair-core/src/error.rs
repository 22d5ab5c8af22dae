//! Error types module
//!
//! Codec and record-validation errors live here, together with the `ErrorMetadata`
//! trait that the higher-level error enums implement so that front ends can decide how to
//! present and log a failure without matching on every variant.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a rejected write
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to a user.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "MISSING_PAYLOAD")
    fn error_code(&self) -> &'static str;

    /// Whether running the same operation again is safe without manual cleanup
    fn is_recoverable(&self) -> bool;

    /// Human-readable message for the end user
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Errors produced while converting a `PairDocument` to or from its wire form.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),
}

/// Reasons a `VideoRecord` is unusable as part of a pair.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("file name is empty")]
    EmptyFileName,

    #[error("file name {0:?} cannot be used as an attachment name")]
    InvalidFileName(String),

    #[error("{field} must be a non-negative number, got {value}")]
    NegativeField { field: &'static str, value: f64 },
}

impl ErrorMetadata for CodecError {
    fn error_code(&self) -> &'static str {
        match self {
            CodecError::Encoding(_) => "ENCODING_ERROR",
            CodecError::Decoding(_) => "DECODING_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn client_message(&self) -> String {
        match self {
            CodecError::Encoding(_) => "The video details could not be prepared for upload".into(),
            CodecError::Decoding(_) => "The stored document could not be read".into(),
        }
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display() {
        let err = RecordError::NegativeField {
            field: "duration",
            value: -1.5,
        };
        assert_eq!(
            err.to_string(),
            "duration must be a non-negative number, got -1.5"
        );
        assert_eq!(RecordError::EmptyFileName.to_string(), "file name is empty");
    }

    #[test]
    fn test_codec_error_metadata() {
        let err = CodecError::Decoding("missing field `video1`".into());
        assert_eq!(err.error_code(), "DECODING_ERROR");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(err.to_string().contains("video1"));
    }
}
