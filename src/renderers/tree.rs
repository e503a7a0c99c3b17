//! Run merge tree
//!
//! Runs are inserted one after another as chains of wrapping elements. A chain
//! shares ancestors with the previous run for as long as their elements match.
//! Only the most recent child of a node is open for extension; the moment a
//! run diverges from it, it is sealed for good, even if a later run would
//! match it again. Sealing keeps output order equal to run order.
//!
//! Known limitation: merging is greedy and order-sensitive. Runs that share an
//! attribute which does not sort first (e.g. `{bold, italic}` followed by
//! `{italic}`) produce separate wrappers, since chains are compared from the
//! outermost element inwards.

use super::attributes::ElementSpec;
use crate::surface::html::Fragment;

#[derive(Debug)]
struct TrieNode {
    spec: Option<ElementSpec>,
    text: Option<String>,
    children: Vec<TrieNode>,
    sealed: bool,
}

impl TrieNode {
    fn root() -> Self {
        Self {
            spec: None,
            text: None,
            children: Vec::new(),
            sealed: false,
        }
    }

    fn element(spec: ElementSpec) -> Self {
        Self {
            spec: Some(spec),
            ..Self::root()
        }
    }

    fn leaf(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::root()
        }
    }

    fn is_open_for(&self, spec: &ElementSpec) -> bool {
        !self.sealed && self.spec.as_ref() == Some(spec)
    }

    fn seal_children(&mut self) {
        for child in &mut self.children {
            child.sealed = true;
        }
    }

    fn collapse(self) -> Vec<Fragment> {
        if let Some(text) = self.text {
            return text_fragments(&text);
        }
        let mut children: Vec<Fragment> = Vec::new();
        for child in self.children {
            for fragment in child.collapse() {
                if let Fragment::Text(next) = &fragment {
                    if let Some(Fragment::Text(prev)) = children.last_mut() {
                        prev.push_str(next);
                        continue;
                    }
                }
                children.push(fragment);
            }
        }
        match self.spec {
            Some(spec) => vec![Fragment::Element {
                tag: spec.tag,
                attrs: spec.attrs,
                children,
            }],
            None => children,
        }
    }
}

/// Split on line breaks, which render as `<br>`
fn text_fragments(text: &str) -> Vec<Fragment> {
    let mut out = Vec::new();
    for (i, part) in text.split('\n').enumerate() {
        if i > 0 {
            out.push(Fragment::element("br", Vec::new()));
        }
        if !part.is_empty() {
            out.push(Fragment::text(part));
        }
    }
    out
}

/// Accumulates run chains and collapses them into a minimal element forest
#[derive(Debug)]
pub struct RenderTree {
    root: TrieNode,
}

impl Default for RenderTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTree {
    pub fn new() -> Self {
        Self { root: TrieNode::root() }
    }

    /// Insert one run: its wrapping chain (outermost first) and its text
    pub fn insert(&mut self, chain: Vec<ElementSpec>, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for spec in chain {
            let reuse = node.children.last().map(|c| c.is_open_for(&spec)).unwrap_or(false);
            if !reuse {
                node.seal_children();
                node.children.push(TrieNode::element(spec));
            }
            node = match node.children.last_mut() {
                Some(child) => child,
                None => return,
            };
        }
        node.seal_children();
        node.children.push(TrieNode::leaf(text));
    }

    /// Collapse bottom-up into real nodes
    pub fn collapse(self) -> Vec<Fragment> {
        self.root.collapse()
    }
}
