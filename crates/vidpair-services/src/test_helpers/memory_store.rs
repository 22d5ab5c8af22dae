//! In-memory document store for testing without a database

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use vidpair_core::{AttachmentBody, WriteResponse};
use vidpair_store::{DocumentRow, DocumentStore, StoreError, StoreResult, TransferObserver};

/// One call received by [`InMemoryStore`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    CreateDocument {
        body: Value,
    },
    PutAttachment {
        doc_id: String,
        name: String,
        rev: String,
        content_type: String,
        len: u64,
    },
    AllDocuments,
    GetAttachment {
        doc_id: String,
        name: String,
    },
}

struct StoredDocument {
    generation: u32,
    body: Map<String, Value>,
    attachments: BTreeMap<String, (String, Bytes)>,
}

impl StoredDocument {
    fn rev(&self) -> String {
        revision(self.generation)
    }
}

#[derive(Default)]
struct StoreState {
    documents: BTreeMap<String, StoredDocument>,
    extra_rows: Vec<DocumentRow>,
    calls: Vec<RecordedCall>,
    create_failure: Option<StoreError>,
    attachment_failures: HashMap<String, StoreError>,
    cancel_after: Option<(String, CancellationToken)>,
}

/// Document store double with CouchDB revision semantics.
///
/// Documents get ids `doc1`, `doc2`, ... and revisions `1-a`, `2-b`, ...; every
/// attachment write must name the current revision or fails with a conflict.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    // Documents with an attachment write in flight
    writing: Arc<Mutex<HashSet<String>>>,
    overlapped: Arc<AtomicBool>,
}

/// Revision string for the n-th write of a document (`1-a`, `2-b`, ...).
pub fn revision(generation: u32) -> String {
    let letter = char::from(b'a' + ((generation.saturating_sub(1)) % 26) as u8);
    format!("{}-{}", generation, letter)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next create call fail with `err`.
    pub fn fail_create(&self, err: StoreError) {
        self.lock().create_failure = Some(err);
    }

    /// Make the next write of attachment `name` fail with `err`.
    pub fn fail_attachment(&self, name: &str, err: StoreError) {
        self.lock()
            .attachment_failures
            .insert(name.to_string(), err);
    }

    /// Cancel `token` as soon as attachment `name` has been stored.
    pub fn cancel_after(&self, name: &str, token: CancellationToken) {
        self.lock().cancel_after = Some((name.to_string(), token));
    }

    /// Add a raw listing row, e.g. a design document or a malformed body.
    pub fn push_row(&self, id: &str, doc: Option<Value>) {
        self.lock().extra_rows.push(DocumentRow {
            id: Some(id.to_string()),
            doc,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn current_rev(&self, doc_id: &str) -> Option<String> {
        self.lock().documents.get(doc_id).map(StoredDocument::rev)
    }

    pub fn attachment(&self, doc_id: &str, name: &str) -> Option<Bytes> {
        self.lock()
            .documents
            .get(doc_id)
            .and_then(|d| d.attachments.get(name))
            .map(|(_, data)| data.clone())
    }

    /// True if two writes to the same document were ever in flight at the same time.
    pub fn saw_concurrent_writes(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn writing(&self) -> MutexGuard<'_, HashSet<String>> {
        self.writing.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_write(&self, doc_id: &str) {
        if !self.writing().insert(doc_id.to_string()) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
    }

    fn end_write(&self, doc_id: &str) {
        self.writing().remove(doc_id);
    }

    async fn read_body(body: AttachmentBody) -> StoreResult<Bytes> {
        match body {
            AttachmentBody::Bytes(bytes) => Ok(bytes),
            AttachmentBody::File { path, .. } => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }

    fn store_attachment(
        &self,
        doc_id: &str,
        name: &str,
        expected_rev: &str,
        content_type: &str,
        data: Bytes,
    ) -> StoreResult<WriteResponse> {
        let mut state = self.lock();
        let document = state.documents.get_mut(doc_id).ok_or_else(|| StoreError::Status {
            status: 404,
            body: r#"{"error":"not_found","reason":"missing"}"#.to_string(),
        })?;

        if document.rev() != expected_rev {
            return Err(StoreError::Conflict(format!(
                "expected {}, document is at {}",
                expected_rev,
                document.rev()
            )));
        }

        document.generation += 1;
        document
            .attachments
            .insert(name.to_string(), (content_type.to_string(), data));
        let rev = document.rev();

        if let Some((after, token)) = &state.cancel_after {
            if after == name {
                token.cancel();
            }
        }

        Ok(WriteResponse {
            ok: true,
            id: doc_id.to_string(),
            rev,
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(&self, body: Vec<u8>) -> StoreResult<WriteResponse> {
        let parsed: Value =
            serde_json::from_slice(&body).map_err(|e| StoreError::Encoding(e.to_string()))?;

        let mut state = self.lock();
        state.calls.push(RecordedCall::CreateDocument {
            body: parsed.clone(),
        });
        if let Some(err) = state.create_failure.take() {
            return Err(err);
        }

        let Value::Object(body) = parsed else {
            return Err(StoreError::Status {
                status: 400,
                body: r#"{"error":"bad_request","reason":"Document must be a JSON object"}"#
                    .to_string(),
            });
        };

        let id = format!("doc{}", state.documents.len() + 1);
        let document = StoredDocument {
            generation: 1,
            body,
            attachments: BTreeMap::new(),
        };
        let rev = document.rev();
        state.documents.insert(id.clone(), document);

        Ok(WriteResponse { ok: true, id, rev })
    }

    async fn put_attachment(
        &self,
        doc_id: &str,
        name: &str,
        expected_rev: &str,
        content_type: &str,
        body: AttachmentBody,
        observer: Arc<dyn TransferObserver>,
    ) -> StoreResult<WriteResponse> {
        let injected = {
            let mut state = self.lock();
            state.calls.push(RecordedCall::PutAttachment {
                doc_id: doc_id.to_string(),
                name: name.to_string(),
                rev: expected_rev.to_string(),
                content_type: content_type.to_string(),
                len: body.len(),
            });
            state.attachment_failures.remove(name)
        };
        if let Some(err) = injected {
            return Err(err);
        }

        self.begin_write(doc_id);
        let data = match Self::read_body(body).await {
            Ok(data) => data,
            Err(err) => {
                self.end_write(doc_id);
                return Err(err);
            }
        };

        // Report in two halves so callers see intermediate progress
        let half = data.len() as u64 / 2;
        observer.on_bytes_sent(half);
        tokio::task::yield_now().await;
        observer.on_bytes_sent(data.len() as u64 - half);

        let result = self.store_attachment(doc_id, name, expected_rev, content_type, data);
        self.end_write(doc_id);
        result
    }

    async fn all_documents(&self) -> StoreResult<Vec<DocumentRow>> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::AllDocuments);

        let mut rows: Vec<DocumentRow> = state
            .documents
            .iter()
            .map(|(id, document)| {
                let mut body = document.body.clone();
                body.insert("_id".into(), json!(id));
                body.insert("_rev".into(), json!(document.rev()));
                if !document.attachments.is_empty() {
                    let stubs: Map<String, Value> = document
                        .attachments
                        .iter()
                        .map(|(name, (content_type, data))| {
                            (
                                name.clone(),
                                json!({ "content_type": content_type, "length": data.len(), "stub": true }),
                            )
                        })
                        .collect();
                    body.insert("_attachments".into(), Value::Object(stubs));
                }
                DocumentRow {
                    id: Some(id.clone()),
                    doc: Some(Value::Object(body)),
                }
            })
            .collect();
        rows.extend(state.extra_rows.iter().cloned());
        Ok(rows)
    }

    async fn get_attachment(&self, doc_id: &str, name: &str) -> StoreResult<Bytes> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::GetAttachment {
            doc_id: doc_id.to_string(),
            name: name.to_string(),
        });
        state
            .documents
            .get(doc_id)
            .and_then(|d| d.attachments.get(name))
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StoreError::Status {
                status: 404,
                body: r#"{"error":"not_found","reason":"Document is missing attachment"}"#
                    .to_string(),
            })
    }
}
