//! In-memory visual surface
//!
//! An arena-backed node tree with a deterministic layout model, used by the
//! test-suite and by hosts without a browser. Layout rules:
//!
//! - block-level tags (see [`BLOCK_TAGS`]) stack vertically inside their parent
//! - runs of inline content form an anonymous line box of
//!   `ceil(chars / chars_per_line)` lines (`<br>` forces a new line)
//! - `height`, `padding-top`, `padding-bottom` and `margin-bottom` inline
//!   styles in `px` are honoured
//!
//! Programmatic edits are silent, the `user_*` helpers record mutation records
//! the way a live observer would.

use std::collections::HashMap;

use super::html::{self, Fragment, BLOCK_TAGS};
use super::{MutationRecord, NodeId, Rect, VisualSurface};

/// Layout parameters of the in-memory surface
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLayout {
    pub line_height: f64,
    pub chars_per_line: usize,
    pub viewport_height: f64,
    pub width: f64,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            line_height: 20.0,
            chars_per_line: 60,
            viewport_height: 800.0,
            width: 815.0,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed [`VisualSurface`]
#[derive(Debug, Clone)]
pub struct MemorySurface {
    nodes: Vec<Node>,
    body: NodeId,
    layout: MemoryLayout,
    scroll_y: f64,
    caret: Option<(NodeId, usize)>,
    records: Vec<MutationRecord>,
}

fn px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px").unwrap_or(value.trim()).trim().parse().ok()
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_lowercase(), v.trim().to_string()))
        })
        .collect()
}

fn format_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(k, v)| format!("{}: {};", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pending anonymous line box while laying out inline children
#[derive(Default)]
struct LineBox {
    nodes: Vec<NodeId>,
    segments: Vec<usize>,
    has_content: bool,
}

impl LineBox {
    fn lines(&self, chars_per_line: usize) -> usize {
        if !self.has_content {
            return 0;
        }
        let per_line = chars_per_line.max(1);
        let mut lines = 0;
        let last = self.segments.len().saturating_sub(1);
        for (i, len) in self.segments.iter().enumerate() {
            // a trailing <br> does not open a visible line
            if i == last && *len == 0 && i > 0 {
                continue;
            }
            lines += len.div_ceil(per_line).max(1);
        }
        lines
    }
}

impl MemorySurface {
    pub fn new(layout: MemoryLayout) -> Self {
        let body = Node {
            data: NodeData::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            layout,
            scroll_y: 0.0,
            caret: None,
            records: Vec::new(),
        }
    }

    /// The document root every attached node descends from
    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    /// Node and char offset currently holding the caret
    pub fn caret(&self) -> Option<(NodeId, usize)> {
        self.caret
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.body {
                return true;
            }
            current = self.node(n).and_then(|n| n.parent);
        }
        false
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn attrs(&self, node: NodeId) -> Option<&Vec<(String, String)>> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => Some(attrs),
            _ => None,
        }
    }

    fn style_of(&self, node: NodeId, property: &str) -> Option<f64> {
        let style = self.attribute(node, "style")?;
        parse_style(&style)
            .into_iter()
            .find(|(k, _)| k == property)
            .and_then(|(_, v)| px(&v))
    }

    fn build(&mut self, fragment: &Fragment) -> NodeId {
        match fragment {
            Fragment::Text(text) => self.create_text(text),
            Fragment::Element { tag, attrs, children } => {
                let id = self.push(NodeData::Element {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                });
                for child in children {
                    let c = self.build(child);
                    self.insert_before(id, c, None);
                }
                id
            }
        }
    }

    fn to_fragment(&self, node: NodeId) -> Option<Fragment> {
        let n = self.node(node)?;
        Some(match &n.data {
            NodeData::Text(t) => Fragment::Text(t.clone()),
            NodeData::Element { tag, attrs } => Fragment::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: n.children.iter().filter_map(|c| self.to_fragment(*c)).collect(),
            },
        })
    }

    fn is_block_element(&self, node: NodeId) -> bool {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => BLOCK_TAGS.contains(&tag.as_str()),
            _ => false,
        }
    }

    /// Add one inline node (and its subtree) to a pending line box
    fn collect_inline(&self, node: NodeId, line: &mut LineBox) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            line.nodes.push(n);
            let Some(data) = self.node(n) else { continue };
            match &data.data {
                NodeData::Text(t) => {
                    let len = t.chars().count();
                    if line.segments.is_empty() {
                        line.segments.push(0);
                    }
                    if let Some(last) = line.segments.last_mut() {
                        *last += len;
                    }
                    line.has_content = true;
                }
                NodeData::Element { tag, .. } if tag == "br" => {
                    if line.segments.is_empty() {
                        line.segments.push(0);
                    }
                    line.segments.push(0);
                    line.has_content = true;
                }
                NodeData::Element { .. } => {
                    stack.extend(data.children.iter().rev());
                }
            }
        }
    }

    fn flush_line(&self, line: &mut LineBox, y: &mut f64, out: &mut HashMap<NodeId, Rect>) {
        let lines = line.lines(self.layout.chars_per_line);
        let height = lines as f64 * self.layout.line_height;
        for n in line.nodes.drain(..) {
            out.insert(n, Rect::new(*y, *y + height, 0.0, self.layout.width));
        }
        line.segments.clear();
        line.has_content = false;
        *y += height;
    }

    /// Lay out `node` with its top edge at `top`, returning its height
    fn place(&self, node: NodeId, top: f64, out: &mut HashMap<NodeId, Rect>) -> f64 {
        let pad_top = self.style_of(node, "padding-top").unwrap_or(0.0);
        let pad_bottom = self.style_of(node, "padding-bottom").unwrap_or(0.0);
        let mut y = top + pad_top;
        let mut line = LineBox::default();

        let children = self.node(node).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            if self.is_block_element(child) {
                self.flush_line(&mut line, &mut y, out);
                let h = self.place(child, y, out);
                y += h + self.style_of(child, "margin-bottom").unwrap_or(0.0);
            } else {
                self.collect_inline(child, &mut line);
            }
        }
        self.flush_line(&mut line, &mut y, out);

        let natural = y - top + pad_bottom;
        let height = self.style_of(node, "height").unwrap_or(natural);
        out.insert(node, Rect::new(top, top + height, 0.0, self.layout.width));
        height
    }

    fn compute_layout(&self) -> HashMap<NodeId, Rect> {
        let mut out = HashMap::new();
        self.place(self.body, -self.scroll_y, &mut out);
        out
    }

    // ------------------------------------------------------------------
    // User edit simulation (records mutations)
    // ------------------------------------------------------------------

    /// Insert text into a text node as if typed, recording a character-data record
    pub fn user_insert_text(&mut self, node: NodeId, offset: usize, text: &str) {
        let old = self.text(node);
        let at = old
            .char_indices()
            .nth(offset)
            .map(|(i, _)| i)
            .unwrap_or(old.len());
        let mut new = old.clone();
        new.insert_str(at, text);
        self.set_text(node, &new);
        self.caret = Some((node, offset + text.chars().count()));
        self.records.push(MutationRecord::character_data(node, old));
    }

    /// Replace a text node's data as if edited, recording a character-data record
    pub fn user_set_text(&mut self, node: NodeId, text: &str) {
        let old = self.text(node);
        self.set_text(node, text);
        self.records.push(MutationRecord::character_data(node, old));
    }

    /// Insert a node as if by a native edit, recording a child-list record
    pub fn user_insert(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.insert_before(parent, child, reference);
        self.records.push(MutationRecord::child_list(parent, vec![child], Vec::new()));
    }

    /// Remove a node as if by a native edit, recording a child-list record
    pub fn user_remove(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.remove(node);
            self.records.push(MutationRecord::child_list(parent, Vec::new(), vec![node]));
        }
    }

    /// Drain the mutation records collected since the last call
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

impl VisualSurface for MemorySurface {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_lowercase(),
            attrs: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let matches: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId)
            .filter(|n| self.attribute(*n, "id").as_deref() == Some(id))
            .collect();
        matches
            .iter()
            .copied()
            .find(|n| self.is_attached(*n))
            .or_else(|| matches.first().copied())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.clone()),
            _ => None,
        }
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if self.is_text(node) || self.has_class(node, class) {
            return;
        }
        let classes = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes);
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.attrs(node)?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(Node {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.node_mut(node)
        {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let mut decls = self
            .attribute(node, "style")
            .map(|s| parse_style(&s))
            .unwrap_or_default();
        let property = property.to_lowercase();
        match decls.iter_mut().find(|(k, _)| *k == property) {
            Some((_, v)) => *v = value.to_string(),
            None => decls.push((property, value.to_string())),
        }
        let style = format_style(&decls);
        self.set_attribute(node, "style", &style);
    }

    fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let Some(data) = self.node(n) else { continue };
            match &data.data {
                NodeData::Text(t) => out.push_str(t),
                NodeData::Element { .. } => stack.extend(data.children.iter().rev()),
            }
        }
        out
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        let is_text = matches!(self.node(node).map(|n| &n.data), Some(NodeData::Text(_)));
        if is_text {
            if let Some(n) = self.node_mut(node) {
                n.data = NodeData::Text(text.to_string());
            }
            return;
        }
        for child in self.children(node) {
            self.remove(child);
        }
        let t = self.create_text(text);
        self.insert_before(node, t, None);
    }

    fn inner_html(&self, node: NodeId) -> String {
        let fragments: Vec<Fragment> = self
            .children(node)
            .into_iter()
            .filter_map(|c| self.to_fragment(c))
            .collect();
        html::to_html(&fragments)
    }

    fn set_inner_html(&mut self, node: NodeId, markup: &str) {
        for child in self.children(node) {
            self.remove(child);
        }
        for fragment in html::parse_fragment(markup) {
            let c = self.build(&fragment);
            self.insert_before(node, c, None);
        }
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        self.remove(child);
        let Some(p) = self.node_mut(parent) else { return };
        let index = reference
            .and_then(|r| p.children.iter().position(|c| *c == r))
            .unwrap_or(p.children.len());
        p.children.insert(index, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else { return };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
    }

    fn bounds(&self, node: NodeId) -> Rect {
        if !self.is_attached(node) {
            return Rect::default();
        }
        self.compute_layout().get(&node).copied().unwrap_or_default()
    }

    fn place_caret(&mut self, node: NodeId, offset: usize) {
        self.caret = Some((node, offset));
    }

    fn caret_node(&self) -> Option<NodeId> {
        self.caret.map(|(node, _)| node)
    }

    fn caret_bounds(&self) -> Option<Rect> {
        let (node, offset) = self.caret?;
        if !self.is_attached(node) {
            return None;
        }
        let rect = self.bounds(node);
        let lh = self.layout.line_height;
        let lines = (rect.height() / lh).round().max(1.0) as usize;
        let row = (offset / self.layout.chars_per_line.max(1)).min(lines - 1);
        let top = rect.top + row as f64 * lh;
        Some(Rect::new(top, top + lh, rect.left, rect.right))
    }

    fn viewport_height(&self) -> f64 {
        self.layout.viewport_height
    }

    fn scroll_by(&mut self, dy: f64) {
        self.scroll_y = (self.scroll_y + dy).max(0.0);
    }
}
