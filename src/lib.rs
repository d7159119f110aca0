// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod codec;
pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod progress;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use config::SiteConfig;
pub use episode::{CommandDownloader, Downloader, HttpDownloader, derive_filename};
pub use error::{DownloadError, FeedError, StateError, SyncError};
pub use feed::{
    DEFAULT_FEED_URL_TEMPLATE, Feed, Item, ItemSet, feed_url, parse_feed, render_feed,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use state::{ReconciliationPlan, create_plan, scan_local_files};
pub use sync::{SyncOptions, SyncResult, sync_mirror};
