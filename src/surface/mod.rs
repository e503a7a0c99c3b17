//! Visual surface abstraction
//!
//! The editor never talks to the browser DOM directly. Everything it needs from
//! the live, user-editable styled-text surface goes through the [`VisualSurface`]
//! trait: element creation, tree navigation, text and markup access, box
//! measurement, caret placement and scrolling.
//!
//! ## Modules
//!
//! - `mutation`: structured mutation records fed to the engine
//! - `memory`: in-memory surface with a deterministic line layout
//! - `html`: HTML fragment parsing/serialization shared by surfaces

pub mod html;
pub mod memory;
pub mod mutation;

pub use memory::{MemoryLayout, MemorySurface};
pub use mutation::{MutationKind, MutationRecord};

use serde::{Deserialize, Serialize};

/// Zero-width space used as a caret holder inside otherwise empty blocks.
///
/// It only ever lives on the surface; serialized block content never contains it.
pub const CARET_PLACEHOLDER: char = '\u{200B}';

/// Opaque handle to a node on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Axis-aligned bounding box, in surface pixels relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self { top, bottom, left, right }
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Capability interface over the host's styled-text surface
///
/// Text offsets are in `char`s. Detached nodes report no parent.
pub trait VisualSurface {
    /// Create a detached element with the given tag name
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Create a detached text node
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Look up an element by its `id` attribute (attached or not)
    fn find_by_id(&self, id: &str) -> Option<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name, `None` for text nodes
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn is_text(&self, node: NodeId) -> bool {
        self.tag_name(node).is_none()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn add_class(&mut self, node: NodeId, class: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    /// Set one inline style property (e.g. `height`, `padding-top`)
    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    /// Concatenated text of the node and all its descendants
    fn text(&self, node: NodeId) -> String;

    /// For a text node, replace its data. For an element, replace all children
    /// with a single text node.
    fn set_text(&mut self, node: NodeId, text: &str);

    /// Serialized markup of the node's children
    fn inner_html(&self, node: NodeId) -> String;

    fn set_inner_html(&mut self, node: NodeId, html: &str);

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. A child that is already attached is moved.
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>);

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Detach a node from its parent. Detaching a detached node is a no-op.
    fn remove(&mut self, node: NodeId);

    fn bounds(&self, node: NodeId) -> Rect;

    /// Put the caret inside `node` at the given character offset
    fn place_caret(&mut self, node: NodeId, offset: usize);

    /// Node currently holding the caret
    fn caret_node(&self) -> Option<NodeId>;

    /// Current caret rectangle, if the caret is on this surface
    fn caret_bounds(&self) -> Option<Rect>;

    fn viewport_height(&self) -> f64;

    /// Scroll the viewport by `dy` pixels (positive scrolls down)
    fn scroll_by(&mut self, dy: f64);
}

/// Helpers shared by every surface implementation
pub trait SurfaceExt: VisualSurface {
    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|n| *n == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Walk from `node` up through its ancestors (inclusive) until `stop`
    /// returns true, yielding that ancestor
    fn closest(&self, node: NodeId, mut stop: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if stop(n) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// True if `ancestor` is `node` or one of its ancestors
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.closest(node, |n| n == ancestor).is_some()
    }

    /// All text nodes below `root` in document order
    fn text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            if self.is_text(n) {
                out.push(n);
                continue;
            }
            for child in self.children(n).into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Replace `node` by its own children, in place
    fn unwrap_node(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        for child in self.children(node) {
            self.insert_before(parent, child, Some(node));
        }
        self.remove(node);
    }

    /// Remove every element below `root` that has become empty (no text at all)
    fn prune_empty(&mut self, root: NodeId) {
        for t in self.text_nodes(root) {
            if self.text(t).is_empty() {
                self.remove(t);
            }
        }
        let mut stack = self.children(root);
        let mut candidates = Vec::new();
        while let Some(n) = stack.pop() {
            if self.is_text(n) {
                continue;
            }
            candidates.push(n);
            stack.extend(self.children(n));
        }
        // deepest first so parents see their children already gone
        for n in candidates.into_iter().rev() {
            let keeps_caret = matches!(self.tag_name(n).as_deref(), Some("br"));
            if !keeps_caret && self.children(n).is_empty() {
                self.remove(n);
            }
        }
    }
}

impl<S: VisualSurface + ?Sized> SurfaceExt for S {}

/// Strip caret placeholders from text read back off a surface
pub fn strip_placeholder(text: &str) -> String {
    text.chars().filter(|c| *c != CARET_PLACEHOLDER).collect()
}
