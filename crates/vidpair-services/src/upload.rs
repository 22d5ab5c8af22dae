//! Pair upload sequencer
//!
//! Stores a pair as one document plus four attachments. The store hands out a new
//! revision for every write and rejects writes against an old one, so the steps run
//! strictly one after another, each using the revision returned by the step before:
//!
//! ```text
//! Idle -> CreatingDocument -> Uploading(video A) -> Uploading(video B)
//!      -> Uploading(thumbnail) -> Uploading(compressed video) -> Succeeded
//! ```
//!
//! Any failure moves straight to `Failed`. Nothing is retried and a half-attached
//! document is left where it is.

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vidpair_core::{codec, AttachmentSlot, ErrorMetadata, LogLevel};
use vidpair_store::{DocumentStore, StoreError};

use crate::error::UploadError;
use crate::reporter::UploadReporter;
use crate::session::{PairUpload, UploadReceipt, UploadSession, UploadState};

pub struct Uploader {
    store: Arc<dyn DocumentStore>,
}

impl Uploader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Upload a pair. `reporter` gets progress and exactly one completion call.
    pub async fn upload_pair(
        &self,
        upload: PairUpload,
        reporter: Arc<dyn UploadReporter>,
    ) -> Result<UploadReceipt, UploadError> {
        self.upload_pair_with_cancel(upload, reporter, CancellationToken::new())
            .await
    }

    /// Like [`Uploader::upload_pair`], but checks `cancel` before every store call.
    ///
    /// A write already in flight is allowed to finish; the next one is not started.
    #[tracing::instrument(skip_all, fields(
        video_a = %upload.video_a.file_name,
        video_b = %upload.video_b.file_name
    ))]
    pub async fn upload_pair_with_cancel(
        &self,
        upload: PairUpload,
        reporter: Arc<dyn UploadReporter>,
        cancel: CancellationToken,
    ) -> Result<UploadReceipt, UploadError> {
        let mut session = UploadSession::new(upload, reporter.clone());
        let outcome = self.drive(&mut session, &cancel).await;

        match &outcome {
            Ok(receipt) => tracing::info!(
                doc_id = %receipt.doc_id,
                rev = %receipt.rev,
                bytes = receipt.bytes_uploaded,
                "Pair upload completed"
            ),
            Err(err) => log_failure(err),
        }

        reporter.on_complete(&outcome);
        outcome
    }

    async fn drive(
        &self,
        session: &mut UploadSession,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt, UploadError> {
        loop {
            match session.take_state() {
                UploadState::Succeeded(receipt) => return Ok(receipt),
                UploadState::Failed(err) => return Err(err),
                state => {
                    let next = self.step(state, session, cancel).await;
                    session.enter(next);
                }
            }
        }
    }

    /// Compute the state that follows `state`, performing at most one store call.
    async fn step(
        &self,
        state: UploadState,
        session: &mut UploadSession,
        cancel: &CancellationToken,
    ) -> UploadState {
        match state {
            UploadState::Idle => match session.prepare().await {
                Ok(()) => UploadState::CreatingDocument,
                Err(err) => UploadState::Failed(err),
            },
            UploadState::CreatingDocument => self.create_document(session, cancel).await,
            UploadState::Uploading { slot, doc_id, rev } => {
                self.upload_attachment(session, cancel, slot, doc_id, rev)
                    .await
            }
            terminal @ (UploadState::Succeeded(_) | UploadState::Failed(_)) => terminal,
        }
    }

    async fn create_document(
        &self,
        session: &UploadSession,
        cancel: &CancellationToken,
    ) -> UploadState {
        if cancel.is_cancelled() {
            return UploadState::Failed(UploadError::Cancelled { doc_id: None });
        }

        let body = match codec::encode(&session.document()) {
            Ok(body) => body,
            Err(err) => return UploadState::Failed(UploadError::Encoding(err.to_string())),
        };

        match self.store.create_document(body).await {
            Ok(created) if !created.id.is_empty() && !created.rev.is_empty() => {
                tracing::info!(doc_id = %created.id, rev = %created.rev, "Document created");
                UploadState::Uploading {
                    slot: AttachmentSlot::VideoA,
                    doc_id: created.id,
                    rev: created.rev,
                }
            }
            Ok(created) => UploadState::Failed(UploadError::CreateDocument {
                source: StoreError::Decoding(format!(
                    "create response is missing id or rev: {:?}",
                    created
                )),
            }),
            Err(source) => UploadState::Failed(UploadError::CreateDocument { source }),
        }
    }

    async fn upload_attachment(
        &self,
        session: &mut UploadSession,
        cancel: &CancellationToken,
        slot: AttachmentSlot,
        doc_id: String,
        rev: String,
    ) -> UploadState {
        if cancel.is_cancelled() {
            return UploadState::Failed(UploadError::Cancelled {
                doc_id: Some(doc_id),
            });
        }

        let Some(planned) = session.planned(slot).cloned() else {
            return UploadState::Failed(UploadError::MissingPayload(format!(
                "no {} payload was planned",
                slot
            )));
        };

        let tracker = session.tracker();
        let result = self
            .store
            .put_attachment(
                &doc_id,
                &planned.name,
                &rev,
                slot.content_type(),
                planned.body,
                tracker.clone(),
            )
            .await;

        let written = match result {
            Ok(written) if !written.rev.is_empty() => written,
            Ok(written) => {
                return UploadState::Failed(UploadError::AttachmentUpload {
                    doc_id,
                    attachment: planned.name,
                    source: StoreError::Decoding(format!(
                        "attachment response is missing rev: {:?}",
                        written
                    )),
                })
            }
            Err(StoreError::Conflict(reason)) => {
                tracing::warn!(doc_id = %doc_id, attachment = %planned.name, rev = %rev, reason = %reason, "Revision conflict");
                return UploadState::Failed(UploadError::Conflict {
                    doc_id,
                    attachment: planned.name,
                });
            }
            Err(source) => {
                return UploadState::Failed(UploadError::AttachmentUpload {
                    doc_id,
                    attachment: planned.name,
                    source,
                })
            }
        };

        tracker.settle(session.bytes_through(slot));
        tracing::info!(
            doc_id = %doc_id,
            attachment = %planned.name,
            rev = %written.rev,
            "Attachment stored"
        );
        session.record_stored(planned.name);

        match slot.next() {
            Some(next) => UploadState::Uploading {
                slot: next,
                doc_id,
                rev: written.rev,
            },
            None => UploadState::Succeeded(UploadReceipt {
                doc_id,
                rev: written.rev,
                attachments: session.stored_attachments().to_vec(),
                bytes_uploaded: session.total_bytes(),
                completed_at: Utc::now(),
            }),
        }
    }
}

fn log_failure(err: &UploadError) {
    let doc_id = err.partial_document().unwrap_or("-");
    let attachment = err.attachment().unwrap_or("-");
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(code = err.error_code(), error = %err, "Pair upload rejected"),
        LogLevel::Warn => tracing::warn!(code = err.error_code(), doc_id, attachment, error = %err, "Pair upload failed"),
        LogLevel::Error => tracing::error!(code = err.error_code(), doc_id, attachment, error = %err, "Pair upload failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::UploadOutcome;
    use crate::test_helpers::{video_file, InMemoryStore, RecordedCall, RecordingReporter};
    use std::path::Path;
    use vidpair_core::PairSide;

    fn pair(dir: &Path) -> PairUpload {
        PairUpload::new(
            video_file(dir, "a.mov", 300),
            video_file(dir, "b.mov", 200),
        )
        .with_thumbnail(vec![0xFFu8; 40])
        .with_compressed_video(vec![7u8; 60])
    }

    fn setup() -> (InMemoryStore, Uploader, Arc<RecordingReporter>) {
        let store = InMemoryStore::new();
        let uploader = Uploader::new(Arc::new(store.clone()));
        (store, uploader, Arc::new(RecordingReporter::default()))
    }

    fn puts(calls: &[RecordedCall]) -> Vec<(String, String, String)> {
        calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::PutAttachment {
                    name,
                    rev,
                    content_type,
                    ..
                } => Some((name.clone(), rev.clone(), content_type.clone())),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_upload_chains_revisions() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();

        let receipt = uploader
            .upload_pair(pair(dir.path()), reporter.clone())
            .await
            .unwrap();

        assert_eq!(receipt.doc_id, "doc1");
        assert_eq!(receipt.rev, "5-e");
        assert_eq!(
            receipt.attachments,
            ["a.mov", "b.mov", "thumbnail.jpg", "compressed_video.mp4"]
        );
        assert_eq!(receipt.bytes_uploaded, 600);

        let calls = store.calls();
        assert_eq!(calls.len(), 5);
        match &calls[0] {
            RecordedCall::CreateDocument { body } => {
                assert_eq!(body["video1"]["fileName"], "a.mov");
                assert_eq!(body["video2"]["fileName"], "b.mov");
                assert!(body.get("_id").is_none());
                assert!(body.get("_rev").is_none());
            }
            other => panic!("expected create first, got {:?}", other),
        }
        let expected = [
            ("a.mov", "1-a", "application/octet-stream"),
            ("b.mov", "2-b", "application/octet-stream"),
            ("thumbnail.jpg", "3-c", "image/jpeg"),
            ("compressed_video.mp4", "4-d", "video/mp4"),
        ];
        let actual = puts(&calls);
        assert_eq!(actual.len(), expected.len());
        for ((name, rev, content_type), (want_name, want_rev, want_type)) in
            actual.iter().zip(expected)
        {
            assert_eq!(name, want_name);
            assert_eq!(rev, want_rev);
            assert_eq!(content_type, want_type);
        }

        assert_eq!(store.current_rev("doc1").as_deref(), Some("5-e"));
        assert_eq!(store.attachment("doc1", "a.mov").unwrap().len(), 300);
        assert!(!store.saw_concurrent_writes());

        let outcomes = reporter.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0], UploadOutcome::Succeeded(receipt));
    }

    #[tokio::test]
    async fn test_missing_thumbnail_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        let mut upload = pair(dir.path());
        upload.thumbnail = None;

        let err = uploader
            .upload_pair(upload, reporter.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::MissingPayload(_)));
        assert!(store.calls().is_empty());
        assert_eq!(store.document_count(), 0);
        assert!(reporter.progress().is_empty());
        match reporter.outcomes().as_slice() {
            [UploadOutcome::Failed(report)] => assert_eq!(report.code, "MISSING_PAYLOAD"),
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_compressed_video_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        let mut upload = pair(dir.path());
        upload.compressed_video = None;

        let err = uploader.upload_pair(upload, reporter).await.unwrap_err();

        assert!(matches!(err, UploadError::MissingPayload(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_video_b_failure_stops_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        store.fail_attachment(
            "b.mov",
            StoreError::Status {
                status: 500,
                body: "internal".into(),
            },
        );

        let err = uploader
            .upload_pair(pair(dir.path()), reporter.clone())
            .await
            .unwrap_err();

        match &err {
            UploadError::AttachmentUpload {
                doc_id,
                attachment,
                source: StoreError::Status { status: 500, .. },
            } => {
                assert_eq!(doc_id, "doc1");
                assert_eq!(attachment, "b.mov");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.calls().len(), 3);
        assert_eq!(puts(&store.calls()).len(), 2);
        assert_eq!(store.current_rev("doc1").as_deref(), Some("2-b"));

        match reporter.outcomes().as_slice() {
            [UploadOutcome::Failed(report)] => {
                assert_eq!(report.attachment.as_deref(), Some("b.mov"));
                assert_eq!(report.doc_id.as_deref(), Some("doc1"));
            }
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conflict_is_reported_distinctly() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        store.fail_attachment("thumbnail.jpg", StoreError::Conflict("stale".into()));

        let err = uploader
            .upload_pair(pair(dir.path()), reporter)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Conflict { ref attachment, .. } if attachment == "thumbnail.jpg"
        ));
        assert_eq!(err.error_code(), "REVISION_CONFLICT");
        assert_eq!(store.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_create_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        store.fail_create(StoreError::Network("connection refused".into()));

        let err = uploader
            .upload_pair(pair(dir.path()), reporter.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::CreateDocument { .. }));
        assert!(err.is_network());
        assert_eq!(store.calls().len(), 1);
        assert_eq!(reporter.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        let cancel = CancellationToken::new();
        store.cancel_after("b.mov", cancel.clone());

        let err = uploader
            .upload_pair_with_cancel(pair(dir.path()), reporter.clone(), cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::Cancelled { doc_id: Some(ref id) } if id == "doc1"
        ));
        assert_eq!(store.calls().len(), 3);
        assert_eq!(reporter.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_create() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = uploader
            .upload_pair_with_cancel(pair(dir.path()), reporter, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled { doc_id: None }));
        assert!(err.is_recoverable());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, uploader, reporter) = setup();

        uploader
            .upload_pair(pair(dir.path()), reporter.clone())
            .await
            .unwrap();

        let progress = reporter.progress();
        assert_eq!(progress.first(), Some(&(0, 600)));
        assert_eq!(progress.last(), Some(&(600, 600)));
        assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(progress.iter().all(|&(uploaded, total)| uploaded <= total && total == 600));
        // Intermediate values come from the store's per-chunk reports
        assert!(progress.contains(&(150, 600)));
    }

    #[tokio::test]
    async fn test_edited_flag_is_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, reporter) = setup();
        let mut upload = pair(dir.path());
        upload.mark_edited(PairSide::B);

        uploader.upload_pair(upload, reporter).await.unwrap();

        match &store.calls()[0] {
            RecordedCall::CreateDocument { body } => {
                assert_eq!(body["video1"]["isEdited"], false);
                assert_eq!(body["video2"]["isEdited"], true);
            }
            other => panic!("expected create first, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_independent_uploads_get_separate_documents() {
        let dir = tempfile::tempdir().unwrap();
        let (store, uploader, _) = setup();

        let first = pair(dir.path());
        let second = PairUpload::new(
            video_file(dir.path(), "c.mov", 10),
            video_file(dir.path(), "d.mov", 10),
        )
        .with_thumbnail(vec![1u8])
        .with_compressed_video(vec![2u8]);

        let (a, b) = tokio::join!(
            uploader.upload_pair(first, Arc::new(crate::NoopReporter)),
            uploader.upload_pair(second, Arc::new(crate::NoopReporter)),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.doc_id, b.doc_id);
        assert_eq!(a.rev, "5-e");
        assert_eq!(b.rev, "5-e");
        assert_eq!(store.document_count(), 2);
        // Interleaving across documents is fine; each chain stays sequential
        assert!(!store.saw_concurrent_writes());
    }
}
