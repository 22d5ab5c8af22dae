//! vidpair Services Layer
//!
//! Orchestration on top of the document store: the revision-chained pair upload, its
//! progress reporting, and reading pairs back (listing, attachments, CSV export).

pub mod error;
pub mod export;
pub mod listing;
pub mod reporter;
pub mod session;
pub mod test_helpers;
pub mod upload;

pub use error::{FailurePhase, ListError, UploadError};
pub use export::export_csv;
pub use listing::Catalog;
pub use reporter::{
    ChannelReporter, FailureReport, FnReporter, NoopReporter, ProgressTracker, UploadOutcome,
    UploadReporter,
};
pub use session::{PairUpload, UploadReceipt, UploadSession, UploadState};
pub use upload::Uploader;
