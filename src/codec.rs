// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Escaping of the five reserved markup characters.
//!
//! Feed titles travel through this module twice: once when they are read
//! from the source feed (so they can be embedded in the generated document
//! as-is) and once in reverse when they become on-disk filenames.

/// The five named references produced by [`encode`], paired with the
/// character each one stands for.
const REFERENCES: [(&str, char); 5] = [
    ("&#39;", '\''),
    ("&quot;", '"'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&amp;", '&'),
];

/// Returns true if `text` contains any of the five named references
fn contains_reference(text: &str) -> bool {
    REFERENCES.iter().any(|(reference, _)| text.contains(reference))
}

/// Escape `&`, `'`, `"`, `<` and `>` for use in element text or attributes.
///
/// Input that already contains one of the five references is treated as
/// encoded and returned unchanged, so encoding twice never produces
/// `&amp;amp;`. A string that mixes a literal reference with unescaped
/// reserved characters is therefore left under-encoded.
pub fn encode(text: &str) -> String {
    if contains_reference(text) {
        return text.to_string();
    }

    let mut encoded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => encoded.push_str("&amp;"),
            '\'' => encoded.push_str("&#39;"),
            '"' => encoded.push_str("&quot;"),
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Replace the five named references with the characters they stand for.
///
/// Other entities (numeric or named) are left untouched.
pub fn decode(text: &str) -> String {
    if !contains_reference(text) {
        return text.to_string();
    }

    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        decoded.push_str(&rest[..pos]);
        let candidate = &rest[pos..];

        match REFERENCES
            .iter()
            .find(|(reference, _)| candidate.starts_with(reference))
        {
            Some((reference, c)) => {
                decoded.push(*c);
                rest = &candidate[reference.len()..];
            }
            None => {
                decoded.push('&');
                rest = &candidate[1..];
            }
        }
    }

    decoded.push_str(rest);
    decoded
}

/// Split raw text into pieces that can each be wrapped in a CDATA section.
///
/// A literal `]]>` would end a section early, so it is split after `]]`
/// and the `>` opens the next piece.
pub fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;

    while let Some(pos) = rest.find("]]>") {
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}

/// Wrap raw text in adjacent CDATA sections
pub fn cdata(text: &str) -> String {
    cdata_sections(text)
        .into_iter()
        .map(|section| format!("<![CDATA[{section}]]>"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_escapes_all_reserved_characters() {
        assert_eq!(
            encode(r#"Tom & Jerry's "<live>""#),
            "Tom &amp; Jerry&#39;s &quot;&lt;live&gt;&quot;"
        );
    }

    #[test]
    fn encode_leaves_plain_text_alone() {
        assert_eq!(encode("Episode 12 - Deep Cuts"), "Episode 12 - Deep Cuts");
        assert_eq!(encode(""), "");
    }

    #[test]
    fn encode_treats_referenced_input_as_already_encoded() {
        assert_eq!(encode("Rock &amp; Roll"), "Rock &amp; Roll");
        // Under-encoding of mixed input is accepted behavior
        assert_eq!(encode("a &lt; b & c"), "a &lt; b & c");
    }

    #[test]
    fn encode_is_idempotent() {
        for input in ["a & b", "<tag>", "it's", "plain", r#""q""#] {
            let once = encode(input);
            assert_eq!(encode(&once), once, "input: {input}");
        }
    }

    #[test]
    fn encode_keeps_non_ascii_characters() {
        assert_eq!(encode("Café & Crème"), "Café &amp; Crème");
    }

    #[test]
    fn decode_reverses_encode() {
        for input in [
            "Tom & Jerry",
            "it's \"quoted\"",
            "<<>>",
            "&&&",
            "Ep 1: Live",
            "ünïcödé & more",
            "&amp without semicolon",
        ] {
            assert_eq!(decode(&encode(input)), input, "input: {input}");
        }
    }

    #[test]
    fn decode_is_noop_without_references() {
        assert_eq!(decode("a & b < c"), "a & b < c");
    }

    #[test]
    fn decode_leaves_unknown_entities() {
        assert_eq!(decode("&eacute; &amp; &#169;"), "&eacute; & &#169;");
    }

    #[test]
    fn decode_does_not_chain_replacements() {
        assert_eq!(decode("&amp;lt;"), "&lt;");
        assert_eq!(decode("&amp;amp;"), "&amp;");
    }

    #[test]
    fn cdata_wraps_text() {
        assert_eq!(cdata("<b>bold</b>"), "<![CDATA[<b>bold</b>]]>");
    }

    #[test]
    fn cdata_splits_terminator() {
        assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
    }

    #[test]
    fn cdata_sections_split_every_terminator() {
        assert_eq!(cdata_sections(""), [""]);
        assert_eq!(cdata_sections("plain"), ["plain"]);
        assert_eq!(cdata_sections("]]>x]]>"), ["]]", ">x]]", ">"]);
    }
}
