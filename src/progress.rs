// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

/// Events emitted during a mirror run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Source feed is being fetched from URL
    FetchingFeed { url: String },

    /// Source feed has been parsed successfully
    FeedParsed {
        channel_title: String,
        total_items: usize,
    },

    /// Partial files were cleaned up during directory scan
    PartialFilesCleanedUp { count: usize },

    /// Local files have been compared against the feed
    PlanReady {
        to_fetch: usize,
        to_keep: usize,
        to_delete: usize,
    },

    /// A download is starting
    DownloadStarting {
        filename: String,
        /// Index of this item in the download queue
        index: usize,
        /// Total number of items to download
        total: usize,
    },

    /// Download progress update
    DownloadProgress {
        filename: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted { filename: String },

    /// A download failed
    DownloadFailed { filename: String, error: String },

    /// A downloaded file was moved to its derived name
    FileRenamed { from: String, to: String },

    /// A local file no longer advertised by the feed was removed
    FileDeleted { filename: String },

    /// The output feed document was written
    FeedWritten { path: PathBuf, item_count: usize },

    /// Mirror run completed
    SyncCompleted {
        fetched_count: usize,
        kept_count: usize,
        deleted_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a mirror run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every event for later inspection
    #[derive(Default)]
    pub struct RecordingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingReporter {
        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
