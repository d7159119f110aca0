// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::episode::is_audio_file;
use crate::error::StateError;
use crate::feed::ItemSet;

/// Suffix of files a direct download is still writing
const PARTIAL_SUFFIX: &str = ".partial";

/// Audio files found in the working directory at the start of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalFileSet {
    /// Filenames (without path) of existing audio files
    pub files: BTreeSet<String>,
    /// The directory that was scanned
    pub dir: PathBuf,
    /// Number of partial files that were cleaned up during scan
    pub partial_files_cleaned: usize,
}

impl LocalFileSet {
    pub fn contains(&self, filename: &str) -> bool {
        self.files.contains(filename)
    }
}

/// What a run has to do to make the directory mirror the feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    /// Item filenames missing locally, lexicographically ordered
    pub to_fetch: Vec<String>,
    /// Item filenames already present
    pub to_keep: Vec<String>,
    /// Local files the feed no longer advertises, lexicographically ordered
    pub to_delete: Vec<String>,
}

/// Names of the audio files directly inside `dir`
pub fn list_audio_files(dir: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(filename) = entry.file_name().to_str()
            && is_audio_file(filename)
        {
            files.insert(filename.to_string());
        }
    }

    Ok(files)
}

/// Scan the working directory for mirrored audio files
///
/// Also cleans up any `.partial` files from interrupted downloads.
pub fn scan_local_files(dir: &Path) -> Result<LocalFileSet, StateError> {
    let read_failed = |e| StateError::ReadDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut partial_files_cleaned = 0;
    for entry in std::fs::read_dir(dir).map_err(read_failed)? {
        let path = entry.map_err(read_failed)?.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

        if is_partial && path.is_file() && std::fs::remove_file(&path).is_ok() {
            partial_files_cleaned += 1;
        }
    }

    let files = list_audio_files(dir).map_err(read_failed)?;

    Ok(LocalFileSet {
        files,
        dir: dir.to_path_buf(),
        partial_files_cleaned,
    })
}

/// Compare the feed's items against the local files
///
/// Every item whose derived filename is missing locally is fetched; every
/// local file that matches no item is deleted.
pub fn create_plan(items: &ItemSet, local: &LocalFileSet) -> ReconciliationPlan {
    let (to_keep, to_fetch): (Vec<String>, Vec<String>) = items
        .iter()
        .map(|item| item.filename.clone())
        .partition(|filename| local.contains(filename));

    let to_delete = local
        .files
        .iter()
        .filter(|filename| !items.contains(filename))
        .cloned()
        .collect();

    ReconciliationPlan {
        to_fetch,
        to_keep,
        to_delete,
    }
}

/// Remove a file that is no longer part of the mirror
pub fn delete_local_file(dir: &Path, filename: &str) -> Result<(), StateError> {
    let path = dir.join(filename);
    std::fs::remove_file(&path).map_err(|e| StateError::DeleteFailed { path, source: e })
}

/// Size in bytes of a mirrored file
pub fn local_file_size(dir: &Path, filename: &str) -> Result<u64, StateError> {
    let path = dir.join(filename);
    std::fs::metadata(&path)
        .map(|metadata| metadata.len())
        .map_err(|e| StateError::FileSizeFailed { path, source: e })
}
