// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::codec;
use crate::config::SiteConfig;
use crate::error::FeedError;

use super::parse::{ChannelMetadata, Item};
use super::xml::{ATOM_NS, ITUNES_NS};

/// Name of the generated feed document
pub const FEED_FILENAME: &str = "rss.xml";

/// Value of the `<generator>` element
pub const GENERATOR: &str = concat!("podmirror/", env!("CARGO_PKG_VERSION"));

/// Single iTunes category every mirror is filed under
pub const CATEGORY: &str = "Music";

/// MIME type announced for every enclosure
pub const AUDIO_MIME_TYPE: &str = "audio/x-m4a";

const BUILD_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const INDENT_SIZE: usize = 4;

type XmlWriter = Writer<Vec<u8>>;

/// An item to publish together with the size of its local file
#[derive(Debug, Clone, Copy)]
pub struct FeedEntry<'a> {
    pub item: &'a Item,
    /// Length of the local file in bytes
    pub length: u64,
}

/// Start tag whose attribute values are encoded with [`codec::encode`]
fn start_tag<'a>(name: &'a str, attributes: &[(&str, &str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        let value = codec::encode(value);
        // Raw byte pairs are pushed without quick-xml's own escaping
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }
    start
}

fn open(w: &mut XmlWriter, name: &str) -> Result<(), FeedError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn close(w: &mut XmlWriter, name: &str) -> Result<(), FeedError> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<(), FeedError> {
    w.write_event(Event::Empty(start_tag(name, attributes)))?;
    Ok(())
}

fn text(w: &mut XmlWriter, name: &str, value: &str) -> Result<(), FeedError> {
    open(w, name)?;
    w.write_event(Event::Text(BytesText::from_escaped(codec::encode(value))))?;
    close(w, name)
}

fn cdata(w: &mut XmlWriter, name: &str, value: &str) -> Result<(), FeedError> {
    open(w, name)?;
    for section in codec::cdata_sections(value) {
        w.write_event(Event::CData(BytesCData::new(section)))?;
    }
    close(w, name)
}

fn optional_text(w: &mut XmlWriter, name: &str, value: Option<&str>) -> Result<(), FeedError> {
    match value {
        Some(value) => text(w, name, value),
        None => Ok(()),
    }
}

fn optional_cdata(w: &mut XmlWriter, name: &str, value: Option<&str>) -> Result<(), FeedError> {
    match value {
        Some(value) => cdata(w, name, value),
        None => Ok(()),
    }
}

/// Serialize channel metadata and items into a complete RSS 2.0 document.
///
/// Entries are written in the order given. Every non-CDATA value passes
/// through [`codec::encode`]; descriptions and summaries are written as
/// CDATA without escaping.
pub fn render_feed(
    channel: &ChannelMetadata,
    entries: &[FeedEntry<'_>],
    site: &SiteConfig,
    built_at: DateTime<Utc>,
) -> Result<String, FeedError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE);
    let email = site.email();
    let website = site.website();
    let self_url = site.public_url(FEED_FILENAME);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(start_tag(
        "rss",
        &[
            ("version", "2.0"),
            ("xmlns:atom", ATOM_NS),
            ("xmlns:itunes", ITUNES_NS),
        ],
    )))?;
    open(&mut w, "channel")?;

    text(&mut w, "title", &channel.title)?;
    empty(
        &mut w,
        "atom:link",
        &[
            ("href", self_url.as_str()),
            ("rel", "self"),
            ("type", "application/rss+xml"),
        ],
    )?;
    text(&mut w, "link", &website)?;
    cdata(&mut w, "description", &channel.description)?;
    text(
        &mut w,
        "lastBuildDate",
        &built_at.format(BUILD_DATE_FORMAT).to_string(),
    )?;
    optional_text(&mut w, "pubDate", channel.pub_date.as_deref())?;
    text(&mut w, "generator", GENERATOR)?;
    optional_text(&mut w, "language", channel.language.as_deref())?;
    optional_text(&mut w, "itunes:author", channel.author.as_deref())?;
    optional_text(&mut w, "itunes:subtitle", channel.subtitle.as_deref())?;
    optional_cdata(&mut w, "itunes:summary", channel.summary.as_deref())?;

    open(&mut w, "itunes:owner")?;
    text(&mut w, "itunes:name", &channel.title)?;
    text(&mut w, "itunes:email", &email)?;
    close(&mut w, "itunes:owner")?;
    text(&mut w, "webMaster", &email)?;
    text(&mut w, "managingEditor", &email)?;
    text(&mut w, "copyright", &channel.title)?;

    if let Some(image) = &channel.image {
        empty(&mut w, "itunes:image", &[("href", image.url.as_str())])?;
        open(&mut w, "image")?;
        text(&mut w, "url", &image.url)?;
        text(
            &mut w,
            "title",
            image.title.as_deref().unwrap_or(&channel.title),
        )?;
        text(&mut w, "link", &website)?;
        optional_text(&mut w, "width", image.width.as_deref())?;
        optional_text(&mut w, "height", image.height.as_deref())?;
        close(&mut w, "image")?;
    }

    empty(&mut w, "itunes:category", &[("text", CATEGORY)])?;

    for entry in entries {
        write_item(&mut w, entry, site)?;
    }

    close(&mut w, "channel")?;
    close(&mut w, "rss")?;

    let mut document = String::from_utf8_lossy(&w.into_inner()).into_owned();
    document.push('\n');
    Ok(document)
}

fn write_item(w: &mut XmlWriter, entry: &FeedEntry<'_>, site: &SiteConfig) -> Result<(), FeedError> {
    let item = entry.item;
    let url = codec::encode(&site.public_url(&codec::encode(&item.filename)));
    let length = entry.length.to_string();

    open(w, "item")?;
    text(w, "title", &item.title)?;
    text(w, "link", &url)?;
    cdata(w, "description", &item.description)?;
    text(w, "pubDate", &item.pub_date)?;
    empty(
        w,
        "enclosure",
        &[
            ("url", url.as_str()),
            ("length", length.as_str()),
            ("type", AUDIO_MIME_TYPE),
        ],
    )?;
    optional_text(w, "itunes:author", item.author.as_deref())?;
    optional_text(w, "itunes:subtitle", item.subtitle.as_deref())?;
    optional_cdata(w, "itunes:summary", item.summary.as_deref())?;
    optional_text(w, "itunes:duration", item.duration.as_deref())?;
    w.write_event(Event::Start(start_tag("guid", &[("isPermaLink", "true")])))?;
    w.write_event(Event::Text(BytesText::from_escaped(url.as_str())))?;
    close(w, "guid")?;
    if let Some(image) = &item.image {
        empty(w, "itunes:image", &[("href", image.as_str())])?;
    }
    close(w, "item")
}
