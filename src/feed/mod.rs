// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fetch;
mod generate;
mod parse;
mod xml;

pub use fetch::{ACCOUNT_PLACEHOLDER, DEFAULT_FEED_URL_TEMPLATE, feed_url, fetch_feed_bytes};
pub use generate::{AUDIO_MIME_TYPE, CATEGORY, FEED_FILENAME, FeedEntry, GENERATOR, render_feed};
pub use parse::{ChannelImage, ChannelMetadata, Feed, Item, ItemSet, parse_feed};
pub use xml::{ATOM_NS, ITUNES_NS};
