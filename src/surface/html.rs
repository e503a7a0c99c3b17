//! HTML fragment parsing and serialization
//!
//! Block content is carried as HTML strings. Surfaces that do not have a
//! browser parser (the in-memory surface) and the attribute renderer share
//! this small fragment model. Parsing is lenient: unclosed tags are closed at
//! the end of the fragment, stray end tags are ignored, void tags never nest.

use quick_xml::escape::{escape, partial_escape, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const FRAGMENT_ROOT: &str = "desk-fragment-root";

/// Tags that never have children
pub const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

/// Tags laid out as vertical boxes rather than inline runs
pub const BLOCK_TAGS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre",
];

pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// A parsed (or rendered) piece of markup
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<Fragment>,
    },
    Text(String),
}

impl Fragment {
    pub fn element(tag: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
        Fragment::Element {
            tag: tag.into(),
            attrs,
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Text(text.into())
    }
}

fn decode(raw: &str) -> String {
    unescape_with(raw, |entity| match entity {
        "nbsp" => Some("\u{a0}"),
        _ => None,
    })
    .map(|s| s.into_owned())
    .unwrap_or_else(|_| raw.to_string())
}

fn start_parts(e: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
    let attrs = e
        .attributes()
        .with_checks(false)
        .filter_map(|a| a.ok())
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            (key, decode(&raw))
        })
        .collect();
    (tag, attrs)
}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Fragment>,
}

impl OpenElement {
    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if let Some(Fragment::Text(prev)) = self.children.last_mut() {
            prev.push_str(&text);
        } else {
            self.children.push(Fragment::Text(text));
        }
    }

    fn close(self) -> Fragment {
        Fragment::Element {
            tag: self.tag,
            attrs: self.attrs,
            children: self.children,
        }
    }
}

/// Parse an HTML fragment into a forest of [`Fragment`]s
pub fn parse_fragment(html: &str) -> Vec<Fragment> {
    let wrapped = format!("<{FRAGMENT_ROOT}>{html}</{FRAGMENT_ROOT}>");
    let mut reader = Reader::from_str(&wrapped);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let (tag, attrs) = start_parts(&e);
                if tag == FRAGMENT_ROOT && stack.is_empty() {
                    stack.push(OpenElement { tag, attrs, children: Vec::new() });
                } else if is_void(&tag) {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(Fragment::element(tag, attrs));
                    }
                } else {
                    stack.push(OpenElement { tag, attrs, children: Vec::new() });
                }
            }
            Ok(Event::Empty(e)) => {
                let (tag, attrs) = start_parts(&e);
                if let Some(top) = stack.last_mut() {
                    top.children.push(Fragment::element(tag, attrs));
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                if tag == FRAGMENT_ROOT {
                    break;
                }
                // close up to the matching open element, ignoring strays
                if let Some(pos) = stack.iter().skip(1).rposition(|o| o.tag == tag) {
                    let pos = pos + 1;
                    while stack.len() > pos {
                        if let Some(open) = stack.pop() {
                            let closed = open.close();
                            if let Some(top) = stack.last_mut() {
                                top.children.push(closed);
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.push_text(decode(&raw));
                }
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.push_text(raw);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                log::warn!("HTML fragment parse stopped early: {}", err);
                break;
            }
            _ => {}
        }
    }

    while stack.len() > 1 {
        if let Some(open) = stack.pop() {
            let closed = open.close();
            if let Some(top) = stack.last_mut() {
                top.children.push(closed);
            }
        }
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn write_fragment(out: &mut String, node: &Fragment) {
    match node {
        Fragment::Text(text) => out.push_str(&partial_escape(text.as_str())),
        Fragment::Element { tag, attrs, children } => {
            out.push('<');
            out.push_str(tag);
            for (key, value) in attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value.as_str()));
                out.push('"');
            }
            out.push('>');
            if is_void(tag) {
                return;
            }
            for child in children {
                write_fragment(out, child);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

/// Serialize a forest back to markup
pub fn to_html(nodes: &[Fragment]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_fragment(&mut out, node);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(parse_fragment("hello"), vec![Fragment::text("hello")]);
        assert!(parse_fragment("").is_empty());
    }

    #[test]
    fn test_parse_nested_and_attrs() {
        let nodes = parse_fragment(r#"a<b>b<span style="color: red">c</span></b>"#);
        assert_eq!(nodes.len(), 2);
        assert_eq!(to_html(&nodes), r#"a<b>b<span style="color: red">c</span></b>"#);
    }

    #[test]
    fn test_void_and_unclosed_tags() {
        let nodes = parse_fragment("one<br>two<i>three");
        assert_eq!(to_html(&nodes), "one<br>two<i>three</i>");
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let nodes = parse_fragment("x</b>y");
        assert_eq!(to_html(&nodes), "xy");
    }

    #[test]
    fn test_entities() {
        let nodes = parse_fragment("a &amp; b&nbsp;c &lt;d&gt;");
        assert_eq!(nodes, vec![Fragment::text("a & b\u{a0}c <d>")]);
        assert_eq!(to_html(&[Fragment::text("a & <b>")]), "a &amp; &lt;b&gt;");
    }
}
