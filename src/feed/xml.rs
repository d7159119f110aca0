// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Namespace-resolved element tree for feed documents.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use crate::error::FeedError;

/// Namespace of the iTunes podcast extension elements
pub const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// Namespace of the Atom self-link element
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// An element with its resolved namespace, attributes, text and children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Namespace URI, `None` for elements outside any namespace
    pub namespace: Option<String>,
    /// Local name without prefix
    pub name: String,
    /// Attributes by local name, with namespace declarations removed
    pub attributes: Vec<(String, String)>,
    /// Concatenated text and CDATA content, whitespace included
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Look up an attribute by local name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child element outside any namespace with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|child| child.namespace.is_none() && child.name == name)
    }
}

/// Read a complete document into an element tree, returning its root
pub fn parse_document(xml: &[u8]) -> Result<Element, FeedError> {
    let mut reader = NsReader::from_reader(xml);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = resolve_namespace(resolved)?;

        match event {
            Event::Start(start) => {
                let element = open_element(&reader, &start, namespace)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, &start, namespace)?;
                if let Some(root) = close_element(&mut stack, element) {
                    return Ok(root);
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(FeedError::IncompleteDocument)?;
                if let Some(root) = close_element(&mut stack, element) {
                    return Ok(root);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => return Err(FeedError::IncompleteDocument),
            _ => {}
        }
    }
}

fn resolve_namespace(resolved: ResolveResult) -> Result<Option<String>, FeedError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(FeedError::UnboundPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    namespace: Option<String>,
) -> Result<Element, FeedError> {
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(reader.decoder())?;
        attributes.push((key, value.into_owned()));
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        ..Element::default()
    })
}

/// Attach a finished element to its parent, or hand it back if it is the root
fn close_element(stack: &mut [Element], element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_prefixed_namespaces() {
        let doc = br#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
            <itunes:author>Someone</itunes:author>
            <author>Plain</author>
        </rss>"#;

        let root = parse_document(doc).unwrap();
        assert_eq!(root.name, "rss");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].namespace.as_deref(), Some(ITUNES_NS));
        assert_eq!(root.children[0].name, "author");
        assert_eq!(root.children[0].text, "Someone");
        assert_eq!(root.children[1].namespace, None);
    }

    #[test]
    fn collects_text_and_cdata() {
        let doc = b"<d>\n  <![CDATA[<p>Hi</p>]]> &amp; more\n</d>";
        let root = parse_document(doc).unwrap();
        assert_eq!(root.text, "\n  <p>Hi</p> & more\n");
    }

    #[test]
    fn keeps_whitespace_around_text() {
        let root = parse_document(b"<r><title> Ep 1 </title></r>").unwrap();
        assert_eq!(root.child("title").unwrap().text, " Ep 1 ");
    }

    #[test]
    fn reads_attributes_without_namespace_declarations() {
        let doc = br#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" version="2.0"><itunes:image href="a?x=1&amp;y=2"/></rss>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.attributes, vec![("version".to_string(), "2.0".to_string())]);
        assert_eq!(root.children[0].attribute("href"), Some("a?x=1&y=2"));
    }

    #[test]
    fn rejects_undeclared_prefix() {
        let result = parse_document(b"<rss><itunes:author>x</itunes:author></rss>");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_truncated_document() {
        let result = parse_document(b"<rss><channel><title>x</title>");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mismatched_tags() {
        assert!(parse_document(b"<rss><channel></rss>").is_err());
    }

    #[test]
    fn child_ignores_namespaced_elements() {
        let doc = br#"<c xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><itunes:title>ns</itunes:title><title>plain</title></c>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.child("title").map(|e| e.text.as_str()), Some("plain"));
    }
}
