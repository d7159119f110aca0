// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::codec;

/// Extension of every mirrored audio file
pub const AUDIO_EXTENSION: &str = "m4a";

/// Characters that cannot appear in a path component
const FORBIDDEN_CHARS: [char; 2] = [':', '/'];

/// Derive the local filename for an item.
///
/// Both titles are expected markup-encoded, as the parser stores them. The
/// result is decoded again so the file on disk carries a readable name.
///
/// Format: "{channel_title} - {item_title}.m4a"
pub fn derive_filename(channel_title: &str, item_title: &str) -> String {
    let joined = format!("{channel_title} - {item_title}.{AUDIO_EXTENSION}");
    let sanitized = joined.replace(FORBIDDEN_CHARS, "-");
    codec::decode(&sanitized)
}

/// Returns true if `filename` names a mirrored audio file.
///
/// Hidden files are never part of the mirror.
pub fn is_audio_file(filename: &str) -> bool {
    !filename.starts_with('.')
        && filename
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext == AUDIO_EXTENSION)
}
