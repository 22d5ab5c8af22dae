//! Progress and result reporting
//!
//! The sequencer talks to its caller through [`UploadReporter`]: progress as
//! `(uploaded, total)` byte counts while attachments stream, then exactly one terminal
//! call with the outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use vidpair_core::ErrorMetadata;
use vidpair_store::TransferObserver;

use crate::error::{FailurePhase, UploadError};
use crate::session::UploadReceipt;

/// Receives upload progress and the final outcome.
pub trait UploadReporter: Send + Sync {
    /// Called zero or more times with non-decreasing `uploaded` values.
    fn on_progress(&self, uploaded: u64, total: u64);

    /// Called exactly once per upload.
    fn on_complete(&self, outcome: &Result<UploadReceipt, UploadError>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl UploadReporter for NoopReporter {
    fn on_progress(&self, _uploaded: u64, _total: u64) {}

    fn on_complete(&self, _outcome: &Result<UploadReceipt, UploadError>) {}
}

/// Reporter built from two closures.
pub struct FnReporter<P, C> {
    progress: P,
    complete: C,
}

impl<P, C> FnReporter<P, C>
where
    P: Fn(u64, u64) + Send + Sync,
    C: Fn(&Result<UploadReceipt, UploadError>) + Send + Sync,
{
    pub fn new(progress: P, complete: C) -> Self {
        Self { progress, complete }
    }
}

impl<P, C> UploadReporter for FnReporter<P, C>
where
    P: Fn(u64, u64) + Send + Sync,
    C: Fn(&Result<UploadReceipt, UploadError>) + Send + Sync,
{
    fn on_progress(&self, uploaded: u64, total: u64) {
        (self.progress)(uploaded, total)
    }

    fn on_complete(&self, outcome: &Result<UploadReceipt, UploadError>) {
        (self.complete)(outcome)
    }
}

/// Owned summary of a failed upload, for sending across tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    pub code: &'static str,
    pub phase: FailurePhase,
    pub message: String,
    pub doc_id: Option<String>,
    pub attachment: Option<String>,
}

impl From<&UploadError> for FailureReport {
    fn from(err: &UploadError) -> Self {
        Self {
            code: err.error_code(),
            phase: err.phase(),
            message: err.user_message(),
            doc_id: err.partial_document().map(str::to_string),
            attachment: err.attachment().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Succeeded(UploadReceipt),
    Failed(FailureReport),
}

impl From<&Result<UploadReceipt, UploadError>> for UploadOutcome {
    fn from(result: &Result<UploadReceipt, UploadError>) -> Self {
        match result {
            Ok(receipt) => UploadOutcome::Succeeded(receipt.clone()),
            Err(err) => UploadOutcome::Failed(err.into()),
        }
    }
}

/// Reporter that publishes progress on a `watch` channel and the outcome on a `oneshot`.
pub struct ChannelReporter {
    progress: watch::Sender<(u64, u64)>,
    outcome: Mutex<Option<oneshot::Sender<UploadOutcome>>>,
}

impl ChannelReporter {
    pub fn channel() -> (
        Self,
        watch::Receiver<(u64, u64)>,
        oneshot::Receiver<UploadOutcome>,
    ) {
        let (progress_tx, progress_rx) = watch::channel((0, 0));
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let reporter = Self {
            progress: progress_tx,
            outcome: Mutex::new(Some(outcome_tx)),
        };
        (reporter, progress_rx, outcome_rx)
    }
}

impl UploadReporter for ChannelReporter {
    fn on_progress(&self, uploaded: u64, total: u64) {
        self.progress.send_replace((uploaded, total));
    }

    fn on_complete(&self, outcome: &Result<UploadReceipt, UploadError>) {
        let sender = match self.outcome.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(sender) = sender {
            // Receiver may be gone; the outcome is still logged by the uploader
            let _ = sender.send(UploadOutcome::from(outcome));
        }
    }
}

/// Turns per-chunk byte counts from the store into cumulative progress.
///
/// Forwards only values larger than the last one reported, capped at the total, so
/// the reporter sees a non-decreasing sequence even across attachments.
pub struct ProgressTracker {
    reporter: Arc<dyn UploadReporter>,
    total: AtomicU64,
    sent: AtomicU64,
    reported: AtomicU64,
}

impl ProgressTracker {
    pub fn new(reporter: Arc<dyn UploadReporter>) -> Self {
        Self {
            reporter,
            total: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        }
    }

    /// Fix the total and report `(0, total)`.
    pub fn begin(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.reporter.on_progress(0, total);
    }

    /// Raise progress to at least `committed` bytes once a write is acknowledged.
    pub fn settle(&self, committed: u64) {
        let sent = self.sent.fetch_max(committed, Ordering::SeqCst).max(committed);
        self.report(sent);
    }

    pub fn uploaded(&self) -> u64 {
        self.reported.load(Ordering::SeqCst)
    }

    fn report(&self, sent: u64) {
        let total = self.total.load(Ordering::SeqCst);
        let value = sent.min(total);
        let previous = self.reported.fetch_max(value, Ordering::SeqCst);
        if value > previous {
            self.reporter.on_progress(value, total);
        }
    }
}

impl TransferObserver for ProgressTracker {
    fn on_bytes_sent(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.report(sent);
    }
}
