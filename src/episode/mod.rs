// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod download;
mod filename;

pub use download::{
    CommandDownloader, DEFAULT_ARGS, DEFAULT_PROGRAM, DownloadContext, Downloader, HttpDownloader,
    URL_PLACEHOLDER,
};
pub use filename::{AUDIO_EXTENSION, derive_filename, is_audio_file};
