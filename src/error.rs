// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching or parsing the source feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse feed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Failed to write feed XML: {0}")]
    Write(#[from] std::io::Error),

    #[error("Feed uses undeclared namespace prefix '{0}'")]
    UnboundPrefix(String),

    #[error("Feed document ended before all elements were closed")]
    IncompleteDocument,

    #[error("Feed has no <channel> element")]
    MissingChannel,

    #[error("Feed channel has no <{0}> element")]
    MissingChannelField(&'static str),

    #[error("Feed item {position} has no <{field}> element")]
    MissingItemField {
        /// 1-based position of the item in the source feed
        position: usize,
        field: &'static str,
    },
}

/// Errors that can occur while fetching a single item's media
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot derive a file name from link {0}")]
    InvalidLink(String),

    #[error("Failed to start download command '{program}': {source}")]
    CommandSpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download command '{program}' exited with {status} for {url}: {stderr}")]
    CommandFailed {
        program: String,
        url: String,
        status: std::process::ExitStatus,
        /// Last lines the command wrote to standard error
        stderr: String,
    },

    #[error("Download of {url} timed out after {}s", .timeout.as_secs())]
    TimedOut { url: String, timeout: Duration },

    #[error("Download of {url} produced no new audio file")]
    NoOutputFile { url: String },

    #[error("Download of {url} produced several audio files: {}", .files.join(", "))]
    AmbiguousOutput { url: String, files: Vec<String> },

    #[error("Failed to scan {path} for downloaded files: {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when reading or pruning the working directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete {path}: {source}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read size of {path}: {source}")]
    FileSizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for a mirror run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Download of '{filename}' failed: {source}")]
    Download {
        filename: String,
        #[source]
        source: DownloadError,
    },

    #[error("Failed to write feed {path}: {source}")]
    WriteFeedFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
