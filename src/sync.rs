// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use url::Url;

use crate::config::SiteConfig;
use crate::episode::{DownloadContext, Downloader};
use crate::error::{DownloadError, SyncError};
use crate::feed::{FEED_FILENAME, FeedEntry, ItemSet, fetch_feed_bytes, parse_feed, render_feed};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{
    ReconciliationPlan, create_plan, delete_local_file, local_file_size, scan_local_files,
};

/// Options for a mirror run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Keep going when a single item fails to download. Failed items are
    /// left out of the generated feed.
    pub continue_on_error: bool,
}

/// Result of applying a reconciliation plan
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    /// Number of items downloaded
    pub fetched: usize,
    /// Number of local files removed
    pub deleted: usize,
    /// Items that failed to download (filename, error message)
    pub failed_items: Vec<(String, String)>,
}

/// Result of a mirror run
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Number of items downloaded
    pub fetched: usize,
    /// Number of items already present
    pub kept: usize,
    /// Number of local files removed
    pub deleted: usize,
    /// Items that failed to download (filename, error message)
    pub failed_items: Vec<(String, String)>,
    /// Number of items in the written feed
    pub published: usize,
    /// Location of the written feed
    pub feed_path: PathBuf,
}

impl SyncResult {
    pub fn failed(&self) -> usize {
        self.failed_items.len()
    }
}

/// Download one item and move the result to its derived filename
async fn fetch_item<D: Downloader + ?Sized>(
    downloader: &D,
    link: &str,
    dir: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<(), DownloadError> {
    let downloaded = downloader.download(link, dir, context, reporter).await?;

    if downloaded != context.filename {
        let from = dir.join(&downloaded);
        let to = dir.join(&context.filename);
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| DownloadError::RenameFailed {
                from,
                to,
                source: e,
            })?;

        reporter.report(ProgressEvent::FileRenamed {
            from: downloaded,
            to: context.filename.clone(),
        });
    }

    Ok(())
}

/// Fetch missing items one at a time, then delete files the feed dropped.
///
/// Without `continue_on_error` the first failed download aborts the run and
/// nothing is deleted.
pub async fn apply_plan<D: Downloader + ?Sized>(
    plan: &ReconciliationPlan,
    items: &ItemSet,
    dir: &Path,
    downloader: &D,
    options: &SyncOptions,
    reporter: &SharedProgressReporter,
) -> Result<ApplyResult, SyncError> {
    let mut result = ApplyResult::default();
    let total = plan.to_fetch.len();

    for (index, filename) in plan.to_fetch.iter().enumerate() {
        let Some(item) = items.get(filename) else {
            continue;
        };

        let context = DownloadContext {
            filename: filename.clone(),
            index,
            total,
        };

        reporter.report(ProgressEvent::DownloadStarting {
            filename: filename.clone(),
            index,
            total,
        });

        match fetch_item(downloader, &item.link, dir, &context, reporter).await {
            Ok(()) => {
                result.fetched += 1;
                reporter.report(ProgressEvent::DownloadCompleted {
                    filename: filename.clone(),
                });
            }
            Err(e) => {
                reporter.report(ProgressEvent::DownloadFailed {
                    filename: filename.clone(),
                    error: e.to_string(),
                });

                if !options.continue_on_error {
                    return Err(SyncError::Download {
                        filename: filename.clone(),
                        source: e,
                    });
                }
                result.failed_items.push((filename.clone(), e.to_string()));
            }
        }
    }

    for filename in &plan.to_delete {
        delete_local_file(dir, filename)?;
        result.deleted += 1;
        reporter.report(ProgressEvent::FileDeleted {
            filename: filename.clone(),
        });
    }

    Ok(result)
}

/// Mirror an account's feed into a directory and publish it as `rss.xml`
///
/// This is the main entry point for the library. It:
/// 1. Fetches and parses the source feed
/// 2. Scans the directory for audio files
/// 3. Creates a reconciliation plan
/// 4. Downloads missing items and deletes dropped files, one at a time
/// 5. Writes the feed document for the files now present
pub async fn sync_mirror<C: HttpClient, D: Downloader + ?Sized>(
    client: &C,
    downloader: &D,
    feed_url: &Url,
    site: &SiteConfig,
    dir: &Path,
    options: &SyncOptions,
    reporter: SharedProgressReporter,
) -> Result<SyncResult, SyncError> {
    reporter.report(ProgressEvent::FetchingFeed {
        url: feed_url.to_string(),
    });
    let bytes = fetch_feed_bytes(client, feed_url).await?;
    let feed = parse_feed(&bytes)?;

    reporter.report(ProgressEvent::FeedParsed {
        channel_title: crate::codec::decode(&feed.channel.title),
        total_items: feed.items.len(),
    });

    // Also cleans up partial files from interrupted downloads
    let local = scan_local_files(dir)?;
    if local.partial_files_cleaned > 0 {
        reporter.report(ProgressEvent::PartialFilesCleanedUp {
            count: local.partial_files_cleaned,
        });
    }

    let plan = create_plan(&feed.items, &local);
    reporter.report(ProgressEvent::PlanReady {
        to_fetch: plan.to_fetch.len(),
        to_keep: plan.to_keep.len(),
        to_delete: plan.to_delete.len(),
    });

    let applied = apply_plan(&plan, &feed.items, dir, downloader, options, &reporter).await?;

    let failed: HashSet<&str> = applied
        .failed_items
        .iter()
        .map(|(filename, _)| filename.as_str())
        .collect();

    let mut entries = Vec::with_capacity(feed.items.len());
    for item in feed.items.in_source_order() {
        if failed.contains(item.filename.as_str()) {
            continue;
        }
        entries.push(FeedEntry {
            item,
            length: local_file_size(dir, &item.filename)?,
        });
    }

    let document = render_feed(&feed.channel, &entries, site, Utc::now())?;
    let feed_path = dir.join(FEED_FILENAME);
    tokio::fs::write(&feed_path, document)
        .await
        .map_err(|e| SyncError::WriteFeedFailed {
            path: feed_path.clone(),
            source: e,
        })?;

    reporter.report(ProgressEvent::FeedWritten {
        path: feed_path.clone(),
        item_count: entries.len(),
    });

    reporter.report(ProgressEvent::SyncCompleted {
        fetched_count: applied.fetched,
        kept_count: plan.to_keep.len(),
        deleted_count: applied.deleted,
        failed_count: applied.failed_items.len(),
    });

    Ok(SyncResult {
        fetched: applied.fetched,
        kept: plan.to_keep.len(),
        deleted: applied.deleted,
        failed_items: applied.failed_items,
        published: entries.len(),
        feed_path,
    })
}
