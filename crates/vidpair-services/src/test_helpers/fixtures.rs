//! Fixtures shared by unit and integration tests

use std::path::Path;
use std::sync::Mutex;
use vidpair_core::VideoRecord;

use crate::error::UploadError;
use crate::reporter::{UploadOutcome, UploadReporter};
use crate::session::UploadReceipt;

/// Write `len` bytes to `dir/name` and return a record pointing at the file.
pub fn video_file(dir: &Path, name: &str, len: usize) -> VideoRecord {
    let path = dir.join(name);
    std::fs::write(&path, vec![b'v'; len]).unwrap_or_else(|e| {
        panic!("failed to write fixture {}: {}", path.display(), e)
    });
    VideoRecord::for_path(
        &path,
        len as i64,
        12.5,
        29.97,
        "1920 x 1080".to_string(),
        "avc1, mp4a".to_string(),
    )
}

/// Reporter that keeps every progress value and outcome for later assertions.
#[derive(Default)]
pub struct RecordingReporter {
    progress: Mutex<Vec<(u64, u64)>>,
    outcomes: Mutex<Vec<UploadOutcome>>,
}

impl RecordingReporter {
    pub fn progress(&self) -> Vec<(u64, u64)> {
        self.progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn outcomes(&self) -> Vec<UploadOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl UploadReporter for RecordingReporter {
    fn on_progress(&self, uploaded: u64, total: u64) {
        self.progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((uploaded, total));
    }

    fn on_complete(&self, outcome: &Result<UploadReceipt, UploadError>) {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome.into());
    }
}
