// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::codec;
use crate::episode::derive_filename;
use crate::error::FeedError;

use super::xml::{Element, ITUNES_NS, parse_document};

/// Channel-level metadata of the source feed
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMetadata {
    /// Channel title, markup-encoded
    pub title: String,
    /// Free text, embedded as CDATA
    pub description: String,
    pub pub_date: Option<String>,
    pub language: Option<String>,
    pub author: Option<String>,
    pub subtitle: Option<String>,
    /// Free text, embedded as CDATA
    pub summary: Option<String>,
    pub image: Option<ChannelImage>,
}

/// Artwork advertised by the channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelImage {
    pub url: String,
    pub title: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// A single upload of the source feed
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Item title, markup-encoded
    pub title: String,
    /// Derived local filename, also the key in an [`ItemSet`]
    pub filename: String,
    /// Location handed to the downloader
    pub link: String,
    /// Free text, embedded as CDATA
    pub description: String,
    pub pub_date: String,
    pub author: Option<String>,
    pub subtitle: Option<String>,
    /// Free text, embedded as CDATA
    pub summary: Option<String>,
    pub duration: Option<String>,
    pub image: Option<String>,
}

/// Items keyed by derived filename, remembering source-feed order.
///
/// Inserting an item whose filename is already present replaces the earlier
/// item; the filename keeps the position where it was first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSet {
    by_filename: BTreeMap<String, Item>,
    order: Vec<String>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, returning the item it replaced
    pub fn insert(&mut self, item: Item) -> Option<Item> {
        match self.by_filename.entry(item.filename.clone()) {
            Entry::Occupied(mut entry) => Some(entry.insert(item)),
            Entry::Vacant(entry) => {
                self.order.push(item.filename.clone());
                entry.insert(item);
                None
            }
        }
    }

    pub fn get(&self, filename: &str) -> Option<&Item> {
        self.by_filename.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.by_filename.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.by_filename.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_filename.is_empty()
    }

    /// Items ordered by filename
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.by_filename.values()
    }

    /// Items in the order the source feed listed them
    pub fn in_source_order(&self) -> impl Iterator<Item = &Item> {
        self.order
            .iter()
            .filter_map(|filename| self.by_filename.get(filename))
    }
}

impl FromIterator<Item> for ItemSet {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        let mut set = ItemSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// A parsed source feed
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub channel: ChannelMetadata,
    pub items: ItemSet,
}

/// Direct children of `<channel>` this parser knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelTag {
    Title,
    Description,
    PubDate,
    Language,
    Author,
    Subtitle,
    Summary,
    ItunesImage,
    Image,
    Item,
    /// Rebuilt from configuration when generating, or unknown
    Ignored,
}

impl ChannelTag {
    fn classify(element: &Element) -> Self {
        match (element.namespace.as_deref(), element.name.as_str()) {
            (None, "title") => Self::Title,
            (None, "description") => Self::Description,
            (None, "pubDate") => Self::PubDate,
            (None, "language") => Self::Language,
            (None, "image") => Self::Image,
            (None, "item") => Self::Item,
            (Some(ITUNES_NS), "author") => Self::Author,
            (Some(ITUNES_NS), "subtitle") => Self::Subtitle,
            (Some(ITUNES_NS), "summary") => Self::Summary,
            (Some(ITUNES_NS), "image") => Self::ItunesImage,
            // link, atom:link and itunes:owner are rebuilt from configuration
            _ => Self::Ignored,
        }
    }
}

/// Children of `<item>` this parser knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemTag {
    Title,
    Link,
    Description,
    PubDate,
    Author,
    Subtitle,
    Summary,
    Duration,
    Image,
    /// guid and enclosure are rebuilt from the local file
    Ignored,
}

impl ItemTag {
    fn classify(element: &Element) -> Self {
        match (element.namespace.as_deref(), element.name.as_str()) {
            (None, "title") => Self::Title,
            (None, "link") => Self::Link,
            (None, "description") => Self::Description,
            (None, "pubDate") => Self::PubDate,
            (Some(ITUNES_NS), "author") => Self::Author,
            (Some(ITUNES_NS), "subtitle") => Self::Subtitle,
            (Some(ITUNES_NS), "summary") => Self::Summary,
            (Some(ITUNES_NS), "duration") => Self::Duration,
            (Some(ITUNES_NS), "image") => Self::Image,
            // guid and enclosure are rebuilt from the local file
            _ => Self::Ignored,
        }
    }
}

/// Empty values count as absent
fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Item fields as read, before the filename can be derived
#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    author: Option<String>,
    subtitle: Option<String>,
    summary: Option<String>,
    duration: Option<String>,
    image: Option<String>,
}

impl ItemBuilder {
    fn from_element(item: &Element) -> Self {
        let mut builder = Self::default();

        for field in &item.children {
            let text = field.text.as_str();
            match ItemTag::classify(field) {
                // Encoded before the title becomes part of a filename
                ItemTag::Title => builder.title = Some(codec::encode(text)),
                ItemTag::Link => builder.link = Some(text.to_string()),
                ItemTag::Description => builder.description = Some(text.to_string()),
                ItemTag::PubDate => builder.pub_date = Some(text.to_string()),
                ItemTag::Author => builder.author = non_empty(text),
                ItemTag::Subtitle => builder.subtitle = non_empty(text),
                ItemTag::Summary => builder.summary = non_empty(text),
                ItemTag::Duration => builder.duration = non_empty(text),
                ItemTag::Image => {
                    builder.image = field
                        .attribute("href")
                        .and_then(non_empty)
                        .or_else(|| non_empty(text));
                }
                ItemTag::Ignored => {}
            }
        }

        builder
    }

    fn finish(self, channel_title: &str, position: usize) -> Result<Item, FeedError> {
        let missing = |field: &'static str| FeedError::MissingItemField { position, field };

        let title = self.title.ok_or_else(|| missing("title"))?;
        let link = self.link.ok_or_else(|| missing("link"))?;
        let pub_date = self.pub_date.ok_or_else(|| missing("pubDate"))?;

        Ok(Item {
            filename: derive_filename(channel_title, &title),
            title,
            link,
            description: self.description.unwrap_or_default(),
            pub_date,
            author: self.author,
            subtitle: self.subtitle,
            summary: self.summary,
            duration: self.duration,
            image: self.image,
        })
    }
}

/// Channel fields accumulated during the single pass over `<channel>`
#[derive(Debug, Default)]
struct ChannelBuilder {
    title: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    language: Option<String>,
    author: Option<String>,
    subtitle: Option<String>,
    summary: Option<String>,
    image_url: Option<String>,
    image_title: Option<String>,
    image_width: Option<String>,
    image_height: Option<String>,
    items: Vec<ItemBuilder>,
}

impl ChannelBuilder {
    fn apply(&mut self, element: &Element) {
        let text = element.text.as_str();

        match ChannelTag::classify(element) {
            ChannelTag::Title => self.title = Some(codec::encode(text)),
            ChannelTag::Description => self.description = Some(text.to_string()),
            ChannelTag::PubDate => self.pub_date = non_empty(text),
            ChannelTag::Language => self.language = non_empty(text),
            ChannelTag::Author => self.author = non_empty(text),
            ChannelTag::Subtitle => self.subtitle = non_empty(text),
            ChannelTag::Summary => self.summary = non_empty(text),
            ChannelTag::ItunesImage => {
                if let Some(url) = element.attribute("href").and_then(non_empty) {
                    self.image_url = Some(url);
                }
            }
            ChannelTag::Image => self.apply_image(element),
            ChannelTag::Item => self.items.push(ItemBuilder::from_element(element)),
            ChannelTag::Ignored => {}
        }
    }

    fn apply_image(&mut self, image: &Element) {
        for field in &image.children {
            if field.namespace.is_some() {
                continue;
            }
            let text = field.text.as_str();
            match field.name.as_str() {
                "url" => {
                    if self.image_url.is_none() {
                        self.image_url = non_empty(text);
                    }
                }
                "title" => self.image_title = non_empty(text),
                "width" => self.image_width = non_empty(text),
                "height" => self.image_height = non_empty(text),
                // link is rebuilt from the configured hostname
                _ => {}
            }
        }
    }

    fn finish(self) -> Result<Feed, FeedError> {
        let title = self.title.ok_or(FeedError::MissingChannelField("title"))?;
        let description = self
            .description
            .ok_or(FeedError::MissingChannelField("description"))?;

        let mut items = ItemSet::new();
        for (index, builder) in self.items.into_iter().enumerate() {
            items.insert(builder.finish(&title, index + 1)?);
        }

        let image = self.image_url.map(|url| ChannelImage {
            url,
            title: self.image_title,
            width: self.image_width,
            height: self.image_height,
        });

        Ok(Feed {
            channel: ChannelMetadata {
                title,
                description,
                pub_date: self.pub_date,
                language: self.language,
                author: self.author,
                subtitle: self.subtitle,
                summary: self.summary,
                image,
            },
            items,
        })
    }
}

/// Parse RSS feed XML bytes into channel metadata and items
pub fn parse_feed(xml_bytes: &[u8]) -> Result<Feed, FeedError> {
    let root = parse_document(xml_bytes)?;

    let channel = if root.namespace.is_none() && root.name == "channel" {
        &root
    } else {
        root.child("channel").ok_or(FeedError::MissingChannel)?
    };

    let mut builder = ChannelBuilder::default();
    for element in &channel.children {
        builder.apply(element);
    }

    builder.finish()
}
