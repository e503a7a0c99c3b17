//! Block tree repair
//!
//! Live editing can leave the editable surface in shapes the model does not
//! expect: loose text or inline elements at the top level, paragraphs without
//! the block class, or block elements nested inside other blocks. `clean`
//! puts every top-level child back into a proper block. Running it again on a
//! clean tree changes nothing.

use log::trace;

use super::Page;
use crate::models::DeskConfig;
use crate::surface::html::is_block_tag;
use crate::surface::{strip_placeholder, NodeId, SurfaceExt, VisualSurface};

impl Page {
    /// Normalize the editable surface. Returns true when anything changed.
    pub fn clean<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig) -> bool {
        let Some(editable) = self.editable else { return false };
        let class = config.block_class.as_str();
        let mut changed = false;
        let mut loose: Vec<NodeId> = Vec::new();

        for child in surface.children(editable) {
            let tag = surface.tag_name(child);
            match tag.as_deref() {
                None => {
                    if loose.is_empty() && surface.text(child).trim().is_empty() {
                        surface.remove(child);
                        changed = true;
                    } else {
                        loose.push(child);
                    }
                }
                Some(tag) if !is_block_tag(tag) => loose.push(child),
                Some(_) if surface.has_class(child, class) => {
                    changed |= wrap(surface, editable, &mut loose, class);
                }
                Some("div") | Some("p") => {
                    changed |= wrap(surface, editable, &mut loose, class);
                    surface.add_class(child, class);
                    changed = true;
                }
                Some(_) => {
                    changed |= wrap(surface, editable, &mut loose, class);
                    let mut single = vec![child];
                    wrap(surface, editable, &mut single, class);
                    changed = true;
                }
            }
        }
        changed |= wrap(surface, editable, &mut loose, class);

        for block in surface.children(editable) {
            changed |= unnest(surface, block, class);
        }

        if changed {
            trace!("Cleaned page {}", self.uid);
        }
        changed
    }
}

/// Wrap a run of top-level nodes into one new block element
fn wrap<S: VisualSurface>(surface: &mut S, editable: NodeId, nodes: &mut Vec<NodeId>, class: &str) -> bool {
    let Some(first) = nodes.first().copied() else {
        return false;
    };
    let block = surface.create_element("div");
    surface.add_class(block, class);
    surface.insert_before(editable, block, Some(first));
    for node in nodes.drain(..) {
        surface.append_child(block, node);
    }
    true
}

/// Remove or unwrap block elements nested inside `block`
fn unnest<S: VisualSurface>(surface: &mut S, block: NodeId, class: &str) -> bool {
    let mut nested = Vec::new();
    let mut stack = surface.children(block);
    while let Some(n) = stack.pop() {
        if surface.is_text(n) {
            continue;
        }
        if surface.has_class(n, class) {
            nested.push(n);
        }
        stack.extend(surface.children(n));
    }
    if nested.is_empty() {
        return false;
    }
    // innermost first
    nested.sort_by_key(|n| std::cmp::Reverse(depth(surface, *n)));
    for n in nested {
        let has_break = has_descendant_tag(surface, n, "br");
        if strip_placeholder(&surface.text(n)).is_empty() && !has_break {
            surface.remove(n);
        } else {
            surface.unwrap_node(n);
        }
    }
    true
}

fn depth<S: VisualSurface>(surface: &S, node: NodeId) -> usize {
    let mut depth = 0;
    let mut current = surface.parent(node);
    while let Some(n) = current {
        depth += 1;
        current = surface.parent(n);
    }
    depth
}

fn has_descendant_tag<S: VisualSurface>(surface: &S, root: NodeId, tag: &str) -> bool {
    let mut stack = surface.children(root);
    while let Some(n) = stack.pop() {
        if surface.tag_name(n).as_deref() == Some(tag) {
            return true;
        }
        stack.extend(surface.children(n));
    }
    false
}
