//! Document store abstraction trait
//!
//! This module defines the `DocumentStore` trait the upload sequencer and the listing
//! are written against, plus the error type every backend reports.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use vidpair_core::{AttachmentBody, WriteResponse};

/// Document store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Revision conflict: {0}")]
    Conflict(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Receives byte counts as an attachment body is handed to the transport.
pub trait TransferObserver: Send + Sync {
    fn on_bytes_sent(&self, bytes: u64);
}

/// Observer that discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn on_bytes_sent(&self, _bytes: u64) {}
}

/// One row of an all-documents listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    pub id: Option<String>,
    /// Full document body; `None` when the store returned no body for the row
    pub doc: Option<serde_json::Value>,
}

/// Document store abstraction
///
/// Every mutating call takes the revision the caller last observed (`expected_rev`)
/// and returns the new one. Passing a stale revision must fail with
/// [`StoreError::Conflict`]; implementations never retry on the caller's behalf.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document from an encoded JSON body. The store assigns id and first revision.
    async fn create_document(&self, body: Vec<u8>) -> StoreResult<WriteResponse>;

    /// Attach a named payload to an existing document.
    ///
    /// `observer` is told about bytes as they are sent. A backend that cannot report
    /// granular progress reports the whole body once the write completes.
    async fn put_attachment(
        &self,
        doc_id: &str,
        name: &str,
        expected_rev: &str,
        content_type: &str,
        body: AttachmentBody,
        observer: Arc<dyn TransferObserver>,
    ) -> StoreResult<WriteResponse>;

    /// Fetch every document including its body.
    async fn all_documents(&self) -> StoreResult<Vec<DocumentRow>>;

    /// Download one attachment.
    async fn get_attachment(&self, doc_id: &str, name: &str) -> StoreResult<Bytes>;
}
