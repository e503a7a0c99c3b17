//! Recover text attributes from a rendered tree
//!
//! Formatting of a piece of text is implied by its ancestor chain up to the
//! block container. When two ancestors encode the same attribute, the nearest
//! one wins.

use super::attributes::{tag_contribution, Attributes, TextRun};
use crate::surface::html::Fragment;
use crate::surface::{strip_placeholder, NodeId, VisualSurface};

/// Attributes implied by one element on a surface
pub fn element_attributes<S: VisualSurface>(surface: &S, node: NodeId) -> Attributes {
    match surface.tag_name(node) {
        Some(tag) => tag_contribution(&tag, |name| surface.attribute(node, name)),
        None => Attributes::new(),
    }
}

/// Walk from `leaf` up to the nearest element carrying `block_class` and merge
/// the attributes of every ancestor on the way (nearest ancestor wins)
pub fn parse_attributes<S: VisualSurface>(surface: &S, leaf: NodeId, block_class: &str) -> Attributes {
    let mut out = Attributes::new();
    let mut current = if surface.is_text(leaf) { surface.parent(leaf) } else { Some(leaf) };
    while let Some(node) = current {
        if surface.has_class(node, block_class) {
            break;
        }
        for (name, value) in element_attributes(surface, node) {
            out.entry(name).or_insert(value);
        }
        current = surface.parent(node);
    }
    out
}

/// Text nodes and line breaks below `root`, in document order
pub fn leaves<S: VisualSurface>(surface: &S, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if surface.is_text(n) {
            out.push(n);
            continue;
        }
        if n != root && surface.tag_name(n).as_deref() == Some("br") {
            out.push(n);
            continue;
        }
        for child in surface.children(n).into_iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// Text a leaf contributes to a run (`\n` for a line break)
pub fn leaf_text<S: VisualSurface>(surface: &S, leaf: NodeId) -> String {
    if surface.is_text(leaf) {
        strip_placeholder(&surface.text(leaf))
    } else {
        "\n".to_string()
    }
}

/// Runs for a list of leaves; adjacent leaves with equal attributes merge
pub fn runs_for_leaves<S: VisualSurface>(surface: &S, leaves: &[NodeId], block_class: &str) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    for leaf in leaves {
        let text = leaf_text(surface, *leaf);
        if text.is_empty() {
            continue;
        }
        let attributes = parse_attributes(surface, *leaf, block_class);
        push_run(&mut runs, text, attributes);
    }
    runs
}

fn push_run(runs: &mut Vec<TextRun>, text: String, attributes: Attributes) {
    if let Some(last) = runs.last_mut() {
        if last.attributes == attributes {
            last.text.push_str(&text);
            return;
        }
    }
    runs.push(TextRun { text, attributes });
}

/// Runs of a parsed markup forest, without a surface
pub fn parse_fragments(nodes: &[Fragment]) -> Vec<TextRun> {
    let mut runs = Vec::new();
    // (node, inherited attributes)
    let mut stack: Vec<(&Fragment, Attributes)> = nodes.iter().rev().map(|n| (n, Attributes::new())).collect();
    while let Some((node, inherited)) = stack.pop() {
        match node {
            Fragment::Text(text) => {
                let text = strip_placeholder(text);
                if !text.is_empty() {
                    push_run(&mut runs, text, inherited);
                }
            }
            Fragment::Element { tag, children, .. } if tag == "br" && children.is_empty() => {
                push_run(&mut runs, "\n".to_string(), inherited);
            }
            Fragment::Element { tag, attrs, children } => {
                let mut own = tag_contribution(tag, |name| {
                    attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
                });
                // nearer element overrides what it inherits
                for (k, v) in inherited {
                    own.entry(k).or_insert(v);
                }
                for child in children.iter().rev() {
                    stack.push((child, own.clone()));
                }
            }
        }
    }
    runs
}

/// Runs of an HTML string
pub fn parse_html(html: &str) -> Vec<TextRun> {
    parse_fragments(&crate::surface::html::parse_fragment(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderers::render_html;
    use crate::surface::{MemoryLayout, MemorySurface, SurfaceExt};
    use serde_json::{json, Value};

    fn block_with(html: &str) -> (MemorySurface, NodeId) {
        let mut s = MemorySurface::new(MemoryLayout::default());
        let block = s.create_element("div");
        s.add_class(block, "desk-block");
        let body = s.body();
        s.append_child(body, block);
        s.set_inner_html(block, html);
        (s, block)
    }

    #[test]
    fn test_walk_stops_at_block_boundary() {
        let mut s = MemorySurface::new(MemoryLayout::default());
        let outer = s.create_element("b");
        let block = s.create_element("div");
        s.add_class(block, "desk-block");
        s.append_child(outer, block);
        s.set_inner_html(block, "<i>x</i>");
        let text = s.text_nodes(block)[0];

        let attrs = parse_attributes(&s, text, "desk-block");
        assert_eq!(attrs.get("italic"), Some(&Value::Bool(true)));
        assert!(attrs.get("bold").is_none());
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let (s, block) = block_with(r#"<span style="color: red"><span style="color: blue">x</span></span>"#);
        let text = s.text_nodes(block)[0];
        let attrs = parse_attributes(&s, text, "desk-block");
        assert_eq!(attrs.get("color"), Some(&json!("blue")));

        let runs = parse_html(r#"<span style="color: red"><span style="color: blue">x</span></span>"#);
        assert_eq!(runs[0].attributes.get("color"), Some(&json!("blue")));
    }

    #[test]
    fn test_runs_merge_equal_neighbours() {
        let (s, block) = block_with("a<b>b</b><strong>c</strong>d<br>e");
        let runs = runs_for_leaves(&s, &leaves(&s, block), "desk-block");
        let texts: Vec<_> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "bc", "d\ne"]);
    }

    #[test]
    fn test_render_then_parse_recovers_runs() {
        let runs = vec![
            TextRun::plain("plain "),
            TextRun::with("bold ", &[("bold", json!(true))]),
            TextRun::with("both", &[("bold", json!(true)), ("italic", json!(true))]),
            TextRun::with(" red", &[("color", json!("red"))]),
        ];
        let html = render_html(&runs).unwrap();
        assert_eq!(parse_html(&html), runs);
    }

    #[test]
    fn test_placeholder_ignored() {
        let runs = parse_html("\u{200B}");
        assert!(runs.is_empty());
    }
}
