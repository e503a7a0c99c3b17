//! Browser DOM surface
//!
//! [`DomSurface`] implements [`VisualSurface`] over `web_sys`. Nodes get a
//! stable [`NodeId`] the first time the editor sees them; the id is stored on
//! the JS node object itself so that looking a node up again is O(1).
//!
//! Nodes leave the registry when the editor detaches them or replaces their
//! children. Ids are never reused, so a stale id resolves to nothing.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use js_sys::Reflect;
use log::{error, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, Node, Window};

use crate::surface::{MutationKind, MutationRecord, NodeId, Rect, VisualSurface};

const NODE_ID_PROPERTY: &str = "__deskNodeId";

/// Editors sharing a document tag nodes under distinct properties
static INSTANCES: AtomicUsize = AtomicUsize::new(0);

pub struct DomSurface {
    window: Window,
    document: Document,
    key: JsValue,
    nodes: RefCell<HashMap<usize, Node>>,
    next: Cell<usize>,
}

impl DomSurface {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window available"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document available"))?;
        let instance = INSTANCES.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            window,
            document,
            key: JsValue::from_str(&format!("{}{}", NODE_ID_PROPERTY, instance)),
            nodes: RefCell::new(HashMap::new()),
            next: Cell::new(0),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Id of a node, registering it on first sight
    pub fn id_of(&self, node: &Node) -> NodeId {
        if let Some(id) = self.tagged_id(node) {
            if self.nodes.borrow().contains_key(&id.0) {
                return id;
            }
        }
        let id = self.next.get();
        self.next.set(id + 1);
        if let Err(e) = Reflect::set(node, &self.key, &JsValue::from_f64(id as f64)) {
            warn!("Could not tag node {}: {:?}", id, e);
        }
        self.nodes.borrow_mut().insert(id, node.clone());
        NodeId(id)
    }

    /// Id a node was tagged with, without registering it
    fn tagged_id(&self, node: &Node) -> Option<NodeId> {
        Reflect::get(node, &self.key)
            .ok()
            .and_then(|v| v.as_f64())
            .map(|id| NodeId(id as usize))
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.borrow().get(&id.0).cloned()
    }

    /// Number of nodes currently registered
    pub fn tracked(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Drop a node and its descendants from the registry
    fn release(&self, node: &Node) {
        let mut stack = vec![node.clone()];
        while let Some(node) = stack.pop() {
            if let Some(id) = self.tagged_id(&node) {
                self.nodes.borrow_mut().remove(&id.0);
                let _ = Reflect::delete_property::<JsValue>(node.unchecked_ref(), &self.key);
            }
            let list = node.child_nodes();
            stack.extend((0..list.length()).filter_map(|i| list.get(i)));
        }
    }

    fn release_children(&self, node: &Node) {
        let list = node.child_nodes();
        for child in (0..list.length()).filter_map(|i| list.get(i)) {
            self.release(&child);
        }
    }

    fn element(&self, id: NodeId) -> Option<Element> {
        self.node(id)?.dyn_into::<Element>().ok()
    }

    /// Convert a batch from a live `MutationObserver`
    pub fn convert_records(&self, records: &js_sys::Array) -> Vec<MutationRecord> {
        records
            .iter()
            .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
            .filter_map(|record| {
                let kind = MutationKind::from_observer_type(&record.type_())?;
                let target = self.id_of(&record.target()?);
                let added = record.added_nodes();
                let added = (0..added.length())
                    .filter_map(|i| added.get(i))
                    .map(|n| self.id_of(&n))
                    .collect();
                // removed nodes are only reported if they are still known
                let removed = record.removed_nodes();
                let removed = (0..removed.length())
                    .filter_map(|i| removed.get(i))
                    .filter_map(|n| self.tagged_id(&n))
                    .filter(|id| self.nodes.borrow().contains_key(&id.0))
                    .collect();
                Some(MutationRecord {
                    kind,
                    target,
                    old_value: record.old_value(),
                    added,
                    removed,
                })
            })
            .collect()
    }
}

fn to_rect(rect: web_sys::DomRect) -> Rect {
    Rect::new(rect.top(), rect.bottom(), rect.left(), rect.right())
}

impl VisualSurface for DomSurface {
    fn create_element(&mut self, tag: &str) -> NodeId {
        let node: Node = match self.document.create_element(tag) {
            Ok(elem) => elem.into(),
            Err(e) => {
                error!("Cannot create <{}>: {:?}", tag, e);
                self.document.create_document_fragment().into()
            }
        };
        self.id_of(&node)
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let node: Node = self.document.create_text_node(text).into();
        self.id_of(&node)
    }

    fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let elem = self.document.get_element_by_id(id)?;
        Some(self.id_of(&elem))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node)?.parent_node()?;
        Some(self.id_of(&parent))
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(node) else {
            return Vec::new();
        };
        let list = node.child_nodes();
        (0..list.length())
            .filter_map(|i| list.get(i))
            .map(|n| self.id_of(&n))
            .collect()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|e| e.tag_name().to_lowercase())
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.node(node)
            .map(|n| n.node_type() == Node::TEXT_NODE)
            .unwrap_or(false)
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .map(|e| e.class_list().contains(class))
            .unwrap_or(false)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(elem) = self.element(node) {
            if let Err(e) = elem.class_list().add_1(class) {
                error!("Cannot add class {}: {:?}", class, e);
            }
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(elem) = self.element(node) {
            if let Err(e) = elem.set_attribute(name, value) {
                error!("Cannot set attribute {}: {:?}", name, e);
            }
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let Some(elem) = self.node(node).and_then(|n| n.dyn_into::<HtmlElement>().ok()) else {
            return;
        };
        if let Err(e) = elem.style().set_property(property, value) {
            error!("Cannot set style {}: {:?}", property, e);
        }
    }

    fn text(&self, node: NodeId) -> String {
        self.node(node).and_then(|n| n.text_content()).unwrap_or_default()
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(node) = self.node(node) {
            self.release_children(&node);
            node.set_text_content(Some(text));
        }
    }

    fn inner_html(&self, node: NodeId) -> String {
        self.element(node).map(|e| e.inner_html()).unwrap_or_default()
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        if let Some(elem) = self.element(node) {
            self.release_children(&elem);
            elem.set_inner_html(html);
        }
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let (Some(parent), Some(child)) = (self.node(parent), self.node(child)) else {
            return;
        };
        let reference = reference.and_then(|r| self.node(r));
        if let Err(e) = parent.insert_before(&child, reference.as_ref()) {
            error!("Cannot insert node: {:?}", e);
        }
    }

    fn remove(&mut self, node: NodeId) {
        let Some(node) = self.node(node) else { return };
        if let Some(parent) = node.parent_node() {
            if let Err(e) = parent.remove_child(&node) {
                error!("Cannot remove node: {:?}", e);
            }
        }
        self.release(&node);
    }

    fn bounds(&self, node: NodeId) -> Rect {
        let Some(node) = self.node(node) else {
            return Rect::default();
        };
        if let Some(elem) = node.dyn_ref::<Element>() {
            return to_rect(elem.get_bounding_client_rect());
        }
        match self.document.create_range() {
            Ok(range) => match range.select_node_contents(&node) {
                Ok(()) => to_rect(range.get_bounding_client_rect()),
                Err(_) => Rect::default(),
            },
            Err(_) => Rect::default(),
        }
    }

    fn place_caret(&mut self, node: NodeId, offset: usize) {
        let Some(node) = self.node(node) else { return };
        let placed = (|| -> Result<(), JsValue> {
            let selection = self
                .window
                .get_selection()?
                .ok_or_else(|| JsValue::from_str("No selection"))?;
            let range = self.document.create_range()?;
            range.set_start(&node, offset as u32)?;
            range.collapse_with_to_start(true);
            selection.remove_all_ranges()?;
            selection.add_range(&range)?;
            Ok(())
        })();
        if let Err(e) = placed {
            error!("Cannot place caret: {:?}", e);
        }
    }

    fn caret_node(&self) -> Option<NodeId> {
        let selection = self.window.get_selection().ok()??;
        let anchor = selection.anchor_node()?;
        Some(self.id_of(&anchor))
    }

    fn caret_bounds(&self) -> Option<Rect> {
        let selection = self.window.get_selection().ok()??;
        if selection.range_count() == 0 {
            return None;
        }
        let range = selection.get_range_at(0).ok()?;
        let rect = to_rect(range.get_bounding_client_rect());
        if rect.height() > 0.0 {
            return Some(rect);
        }
        // collapsed ranges in empty elements report a zero rect
        let anchor = selection.anchor_node()?;
        Some(self.bounds(self.id_of(&anchor)))
    }

    fn viewport_height(&self) -> f64 {
        self.window
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or_default()
    }

    fn scroll_by(&mut self, dy: f64) {
        self.window.scroll_by_with_x_and_y(0.0, dy);
    }
}
