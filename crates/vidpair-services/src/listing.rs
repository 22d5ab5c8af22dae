//! Reading stored pairs back

use bytes::Bytes;
use std::sync::Arc;
use vidpair_core::{decode_value, PairDocument, THUMBNAIL_ATTACHMENT};
use vidpair_store::DocumentStore;

use crate::error::ListError;

/// Read-only view over the pairs in the store.
pub struct Catalog {
    store: Arc<dyn DocumentStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Every pair document in the database.
    ///
    /// Rows that carry no body or do not decode as a pair (design documents, documents
    /// written by other tools) are logged and skipped instead of failing the listing.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<Vec<PairDocument>, ListError> {
        let rows = self.store.all_documents().await?;
        let total = rows.len();

        let mut documents = Vec::with_capacity(total);
        for row in rows {
            let row_id = row.id.unwrap_or_default();
            let Some(body) = row.doc else {
                tracing::warn!(doc_id = %row_id, "Skipping row without document body");
                continue;
            };

            match decode_value(body) {
                Ok(mut document) => {
                    if document.id.is_none() && !row_id.is_empty() {
                        document.id = Some(row_id);
                    }
                    documents.push(document);
                }
                Err(e) => {
                    tracing::warn!(doc_id = %row_id, error = %e, "Skipping undecodable document");
                }
            }
        }

        tracing::debug!(rows = total, documents = documents.len(), "Listed pair documents");
        Ok(documents)
    }

    /// Download one attachment of a pair.
    pub async fn fetch_attachment(&self, doc_id: &str, name: &str) -> Result<Bytes, ListError> {
        Ok(self.store.get_attachment(doc_id, name).await?)
    }

    pub async fn fetch_thumbnail(&self, doc_id: &str) -> Result<Bytes, ListError> {
        self.fetch_attachment(doc_id, THUMBNAIL_ATTACHMENT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{video_file, InMemoryStore, RecordedCall, RecordingReporter};
    use crate::{PairUpload, Uploader};
    use serde_json::json;
    use vidpair_store::StoreError;

    fn pair_json(a: &str, b: &str) -> serde_json::Value {
        let record = |name: &str| {
            json!({
                "fileName": name, "fileSize": 10, "duration": 1.5, "isEdited": false,
                "fps": 30.0, "resolution": "640 x 480", "codec": "avc1"
            })
        };
        json!({ "_id": format!("{}-{}", a, b), "_rev": "1-a", "video1": record(a), "video2": record(b) })
    }

    #[tokio::test]
    async fn test_fetch_all_skips_malformed_rows() {
        let store = InMemoryStore::new();
        store.push_row("p1", Some(pair_json("a.mov", "b.mov")));
        store.push_row("broken", Some(json!({ "video1": "not a record" })));
        store.push_row("p2", Some(pair_json("c.mov", "d.mov")));
        store.push_row("p3", Some(pair_json("e.mov", "f.mov")));
        store.push_row("_design/app", None);

        let catalog = Catalog::new(Arc::new(store.clone()));
        let documents = catalog.fetch_all().await.unwrap();

        let ids: Vec<_> = documents.iter().filter_map(|d| d.id.as_deref()).collect();
        assert_eq!(ids, ["a.mov-b.mov", "c.mov-d.mov", "e.mov-f.mov"]);
        assert_eq!(store.calls(), vec![RecordedCall::AllDocuments]);
    }

    #[tokio::test]
    async fn test_fetch_all_fills_missing_id_from_row() {
        let store = InMemoryStore::new();
        let mut body = pair_json("a.mov", "b.mov");
        body.as_object_mut().unwrap().remove("_id");
        store.push_row("row-id", Some(body));

        let documents = Catalog::new(Arc::new(store)).fetch_all().await.unwrap();
        assert_eq!(documents[0].id.as_deref(), Some("row-id"));
    }

    #[tokio::test]
    async fn test_uploaded_pair_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let upload = PairUpload::new(
            video_file(dir.path(), "a.mov", 5),
            video_file(dir.path(), "b.mov", 5),
        )
        .with_thumbnail(b"jpeg".to_vec())
        .with_compressed_video(b"mp4".to_vec());
        Uploader::new(store.clone())
            .upload_pair(upload, Arc::new(RecordingReporter::default()))
            .await
            .unwrap();

        let catalog = Catalog::new(store);
        let documents = catalog.fetch_all().await.unwrap();
        assert_eq!(documents.len(), 1);
        let doc = &documents[0];
        assert_eq!(doc.rev.as_deref(), Some("5-e"));
        assert_eq!(doc.attachments.len(), 4);
        assert_eq!(doc.attachments["thumbnail.jpg"].length, 4);

        let thumbnail = catalog.fetch_thumbnail("doc1").await.unwrap();
        assert_eq!(thumbnail, "jpeg");
    }

    #[tokio::test]
    async fn test_fetch_attachment_missing() {
        let catalog = Catalog::new(Arc::new(InMemoryStore::new()));
        let err = catalog.fetch_thumbnail("nope").await.unwrap_err();
        assert!(matches!(err, ListError::Status { status: 404, .. }));
    }

    #[test]
    fn test_store_errors_map_to_list_errors() {
        let err: ListError = StoreError::Decoding("bad".into()).into();
        assert!(matches!(err, ListError::Decoding(_)));
    }
}
