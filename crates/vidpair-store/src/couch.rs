//! HTTP backend for CouchDB-compatible stores.

use crate::paths::{attachment_path, ALL_DOCS_PATH};
use crate::traits::{DocumentRow, DocumentStore, StoreError, StoreResult, TransferObserver};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use vidpair_core::{AttachmentBody, StoreConfig, WriteResponse};

/// Size of the chunks handed to the transport; progress is reported per chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// HTTP client for one database of a CouchDB-compatible store.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct CouchStore {
    client: Client,
    database_url: String,
    auth_header: String,
}

impl CouchStore {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            database_url: config.database_url(),
            auth_header: config.basic_auth_header(),
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.database_url, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, self.auth_header.as_str())
    }

    /// Send a request and turn transport failures into `StoreError::Network`.
    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        self.apply_auth(request).send().await.map_err(network_error)
    }

    /// Decode a `{ok, id, rev}` write response, mapping any other status to an error.
    async fn write_response(response: Response) -> StoreResult<WriteResponse> {
        let status = response.status();
        // Only 201 counts as a committed write; 200 and 202 are reported as failures
        if status != StatusCode::CREATED {
            return Err(status_error(response).await);
        }
        json_body(response).await
    }
}

fn network_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Network(format!("request timed out: {}", err))
    } else {
        StoreError::Network(err.to_string())
    }
}

async fn status_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::CONFLICT {
        StoreError::Conflict(body)
    } else {
        StoreError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

async fn json_body<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
    let bytes = response.bytes().await.map_err(network_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Decoding(format!("Failed to parse response as JSON: {}", e)))
}

/// Turn an attachment payload into a body stream that reports each chunk to `observer`.
async fn observed_body(
    body: AttachmentBody,
    observer: Arc<dyn TransferObserver>,
) -> StoreResult<Body> {
    let chunks: BoxStream<'static, std::io::Result<Bytes>> = match body {
        AttachmentBody::Bytes(bytes) => {
            let pieces: Vec<std::io::Result<Bytes>> = (0..bytes.len())
                .step_by(CHUNK_SIZE)
                .map(|start| Ok(bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len()))))
                .collect();
            stream::iter(pieces).boxed()
        }
        AttachmentBody::File { path, .. } => {
            let file = tokio::fs::File::open(&path).await?;
            ReaderStream::with_capacity(file, CHUNK_SIZE).boxed()
        }
    };

    let observed = chunks.inspect_ok(move |chunk| observer.on_bytes_sent(chunk.len() as u64));
    Ok(Body::wrap_stream(observed))
}

#[derive(serde::Deserialize)]
struct AllDocsResponse {
    #[serde(default)]
    rows: Vec<serde_json::Value>,
}

#[async_trait]
impl DocumentStore for CouchStore {
    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    async fn create_document(&self, body: Vec<u8>) -> StoreResult<WriteResponse> {
        let request = self
            .client
            .post(&self.database_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let response = self.send(request).await?;
        let created = Self::write_response(response).await?;
        tracing::debug!(doc_id = %created.id, rev = %created.rev, "Document created");
        Ok(created)
    }

    #[tracing::instrument(skip(self, body, observer), fields(bytes = body.len()))]
    async fn put_attachment(
        &self,
        doc_id: &str,
        name: &str,
        expected_rev: &str,
        content_type: &str,
        body: AttachmentBody,
        observer: Arc<dyn TransferObserver>,
    ) -> StoreResult<WriteResponse> {
        let url = self.build_url(&attachment_path(doc_id, name));
        let length = body.len();
        let body = observed_body(body, observer).await?;

        let request = self
            .client
            .put(&url)
            .query(&[("rev", expected_rev)])
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .body(body);

        let response = self.send(request).await?;
        let written = Self::write_response(response).await?;
        tracing::debug!(rev = %written.rev, "Attachment stored");
        Ok(written)
    }

    #[tracing::instrument(skip(self))]
    async fn all_documents(&self) -> StoreResult<Vec<DocumentRow>> {
        let request = self
            .client
            .get(self.build_url(ALL_DOCS_PATH))
            .query(&[("include_docs", "true")]);

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let listing: AllDocsResponse = json_body(response).await?;
        let rows = listing
            .rows
            .into_iter()
            .map(|row| DocumentRow {
                id: row.get("id").and_then(|id| id.as_str()).map(String::from),
                doc: row.get("doc").filter(|doc| !doc.is_null()).cloned(),
            })
            .collect();
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn get_attachment(&self, doc_id: &str, name: &str) -> StoreResult<Bytes> {
        let request = self.client.get(self.build_url(&attachment_path(doc_id, name)));

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        response.bytes().await.map_err(network_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoopObserver;
    use mockito::Matcher;
    use std::sync::atomic::{AtomicU64, Ordering};

    const AUTH: &str = "Basic YWRtaW46c2VjcmV0";

    fn store_for(server: &mockito::ServerGuard) -> CouchStore {
        CouchStore::new(&StoreConfig::new(server.url(), "mydb", "admin", "secret")).unwrap()
    }

    #[derive(Default)]
    struct CountingObserver(AtomicU64);

    impl TransferObserver for CountingObserver {
        fn on_bytes_sent(&self, bytes: u64) {
            self.0.fetch_add(bytes, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_create_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/mydb")
            .match_header("authorization", AUTH)
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({ "video1": {}, "video2": {} })))
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"1-a"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        let created = store
            .create_document(br#"{"video1":{},"video2":{}}"#.to_vec())
            .await
            .unwrap();

        assert_eq!(created.id, "doc1");
        assert_eq!(created.rev, "1-a");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_document_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/mydb")
            .with_status(401)
            .with_body(r#"{"error":"unauthorized"}"#)
            .create_async()
            .await;

        let err = store_for(&server)
            .create_document(b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_create_document_undecodable_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/mydb")
            .with_status(201)
            .with_body("<html>proxy</html>")
            .create_async()
            .await;

        let err = store_for(&server)
            .create_document(b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decoding(_)));
    }

    #[tokio::test]
    async fn test_write_requires_created_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/mydb")
            .with_status(202)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"1-a"}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/mydb/doc1/b.mov")
            .match_query(Matcher::UrlEncoded("rev".into(), "2-b".into()))
            .with_status(200)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"3-c"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        let err = store.create_document(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 202, .. }));

        let err = store
            .put_attachment(
                "doc1",
                "b.mov",
                "2-b",
                "application/octet-stream",
                AttachmentBody::Bytes(Bytes::from_static(b"bb")),
                Arc::new(NoopObserver),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_put_attachment_sends_rev_and_body() {
        let mut server = mockito::Server::new_async().await;
        let payload = "v".repeat(CHUNK_SIZE * 2 + 10);
        let mock = server
            .mock("PUT", "/mydb/doc1/thumbnail.jpg")
            .match_query(Matcher::UrlEncoded("rev".into(), "3-c".into()))
            .match_header("authorization", AUTH)
            .match_header("content-type", "image/jpeg")
            .match_body(payload.as_str())
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"4-d"}"#)
            .create_async()
            .await;

        let observer = Arc::new(CountingObserver::default());
        let written = store_for(&server)
            .put_attachment(
                "doc1",
                "thumbnail.jpg",
                "3-c",
                "image/jpeg",
                AttachmentBody::Bytes(Bytes::from(payload.clone())),
                observer.clone(),
            )
            .await
            .unwrap();

        assert_eq!(written.rev, "4-d");
        assert_eq!(observer.0.load(Ordering::SeqCst), payload.len() as u64);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_put_attachment_streams_file() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mov");
        std::fs::write(&path, b"movie-bytes").unwrap();

        let mock = server
            .mock("PUT", "/mydb/doc1/a.mov")
            .match_query(Matcher::UrlEncoded("rev".into(), "1-a".into()))
            .match_header("content-type", "application/octet-stream")
            .match_body("movie-bytes")
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc1","rev":"2-b"}"#)
            .create_async()
            .await;

        let observer = Arc::new(CountingObserver::default());
        let written = store_for(&server)
            .put_attachment(
                "doc1",
                "a.mov",
                "1-a",
                "application/octet-stream",
                AttachmentBody::File { path, len: 11 },
                observer.clone(),
            )
            .await
            .unwrap();

        assert_eq!(written.rev, "2-b");
        assert_eq!(observer.0.load(Ordering::SeqCst), 11);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_put_attachment_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/mydb/doc1/a.mov")
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"error":"conflict","reason":"Document update conflict."}"#)
            .create_async()
            .await;

        let err = store_for(&server)
            .put_attachment(
                "doc1",
                "a.mov",
                "1-stale",
                "application/octet-stream",
                AttachmentBody::Bytes(Bytes::from_static(b"x")),
                Arc::new(NoopObserver),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref body) if body.contains("conflict")));
    }

    #[tokio::test]
    async fn test_put_attachment_missing_file() {
        let server = mockito::Server::new_async().await;
        let err = store_for(&server)
            .put_attachment(
                "doc1",
                "gone.mov",
                "1-a",
                "application/octet-stream",
                AttachmentBody::File {
                    path: "/nonexistent/gone.mov".into(),
                    len: 3,
                },
                Arc::new(NoopObserver),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_all_documents_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/mydb/_all_docs")
            .match_query(Matcher::UrlEncoded("include_docs".into(), "true".into()))
            .match_header("authorization", AUTH)
            .with_status(200)
            .with_body(
                r#"{"total_rows":2,"offset":0,"rows":[
                    {"id":"doc1","key":"doc1","value":{"rev":"1-a"},"doc":{"_id":"doc1"}},
                    {"id":"doc2","key":"doc2","value":{"rev":"1-b"},"doc":null}
                ]}"#,
            )
            .create_async()
            .await;

        let rows = store_for(&server).all_documents().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id.as_deref(), Some("doc1"));
        assert!(rows[0].doc.is_some());
        assert!(rows[1].doc.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_attachment() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mydb/doc1/thumbnail.jpg")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body(b"\xff\xd8jpeg")
            .create_async()
            .await;
        server
            .mock("GET", "/mydb/doc2/thumbnail.jpg")
            .with_status(404)
            .with_body(r#"{"error":"not_found"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        let bytes = store.get_attachment("doc1", "thumbnail.jpg").await.unwrap();
        assert_eq!(&bytes[..], b"\xff\xd8jpeg");

        let err = store.get_attachment("doc2", "thumbnail.jpg").await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let config = StoreConfig::new("http://127.0.0.1:1", "mydb", "admin", "secret");
        let err = CouchStore::new(&config)
            .unwrap()
            .create_document(b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
    }
}
