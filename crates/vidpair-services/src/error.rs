//! Upload and listing errors
//!
//! Every upload failure says which step it happened in and whether a document was
//! already created, so front ends can tell the user if retrying is safe.

use thiserror::Error;
use vidpair_core::{ErrorMetadata, LogLevel};
use vidpair_store::StoreError;

/// Where in the sequence an upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    /// Rejected before any write; nothing exists in the store
    Validation,
    /// Failed while talking to the store; a document may exist without all attachments
    Transfer,
}

/// Errors produced by `Uploader::upload_pair`
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Missing payload: {0}")]
    MissingPayload(String),

    #[error("Invalid video record {file_name:?}: {reason}")]
    InvalidRecord { file_name: String, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Failed to create document: {source}")]
    CreateDocument {
        #[source]
        source: StoreError,
    },

    #[error("Failed to upload {attachment} to document {doc_id}: {source}")]
    AttachmentUpload {
        doc_id: String,
        attachment: String,
        #[source]
        source: StoreError,
    },

    #[error("Revision conflict while uploading {attachment} to document {doc_id}")]
    Conflict { doc_id: String, attachment: String },

    #[error("Upload cancelled")]
    Cancelled { doc_id: Option<String> },
}

impl UploadError {
    pub fn phase(&self) -> FailurePhase {
        match self {
            UploadError::MissingPayload(_)
            | UploadError::InvalidRecord { .. }
            | UploadError::Encoding(_) => FailurePhase::Validation,
            UploadError::CreateDocument { .. }
            | UploadError::AttachmentUpload { .. }
            | UploadError::Conflict { .. }
            | UploadError::Cancelled { .. } => FailurePhase::Transfer,
        }
    }

    /// Id of the document left behind without all of its attachments, if any.
    pub fn partial_document(&self) -> Option<&str> {
        match self {
            UploadError::AttachmentUpload { doc_id, .. } | UploadError::Conflict { doc_id, .. } => {
                Some(doc_id.as_str())
            }
            UploadError::Cancelled { doc_id } => doc_id.as_deref(),
            _ => None,
        }
    }

    /// Attachment that was being written when the upload failed.
    pub fn attachment(&self) -> Option<&str> {
        match self {
            UploadError::AttachmentUpload { attachment, .. }
            | UploadError::Conflict { attachment, .. } => Some(attachment.as_str()),
            _ => None,
        }
    }

    /// Underlying store failure for transfer errors.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            UploadError::CreateDocument { source } | UploadError::AttachmentUpload { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// Whether the failure was at the transport level (timeout, refused connection).
    pub fn is_network(&self) -> bool {
        matches!(self.store_error(), Some(StoreError::Network(_)))
    }

    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match (self.phase(), self.partial_document()) {
            (FailurePhase::Validation, _) => {
                format!("Nothing was uploaded: {}. Fix the selection and try again.", self)
            }
            (FailurePhase::Transfer, None) => format!(
                "Upload failed before the document was created: {}. It is safe to try again.",
                self
            ),
            (FailurePhase::Transfer, Some(doc_id)) => format!(
                "Upload failed partway: document {} was created but is missing attachments ({}). \
                 Trying again creates a new document; the incomplete one stays in the database.",
                doc_id, self
            ),
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::MissingPayload(_) => "MISSING_PAYLOAD",
            UploadError::InvalidRecord { .. } => "INVALID_RECORD",
            UploadError::Encoding(_) => "ENCODING_ERROR",
            UploadError::CreateDocument { .. } => "CREATE_DOCUMENT_FAILED",
            UploadError::AttachmentUpload { .. } => "ATTACHMENT_UPLOAD_FAILED",
            UploadError::Conflict { .. } => "REVISION_CONFLICT",
            UploadError::Cancelled { .. } => "UPLOAD_CANCELLED",
        }
    }

    fn is_recoverable(&self) -> bool {
        self.partial_document().is_none()
    }

    fn client_message(&self) -> String {
        self.user_message()
    }

    fn log_level(&self) -> LogLevel {
        match self {
            UploadError::MissingPayload(_)
            | UploadError::InvalidRecord { .. }
            | UploadError::Cancelled { .. } => LogLevel::Debug,
            UploadError::Conflict { .. } => LogLevel::Warn,
            UploadError::Encoding(_)
            | UploadError::CreateDocument { .. }
            | UploadError::AttachmentUpload { .. } => LogLevel::Error,
        }
    }
}

/// Errors produced while reading pairs back
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ListError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Network(msg) => ListError::Network(msg),
            StoreError::Status { status, body } => ListError::Status { status, body },
            StoreError::Decoding(msg) => ListError::Decoding(msg),
            other => ListError::Store(other),
        }
    }
}
