//! Block: one paragraph, heading or blank line on a page

use serde_json::{Map, Value};

use super::config::DeskConfig;
use super::snapshot::{BlockData, BlockType};
use crate::renderers::parse_html;
use crate::renderers::parser::{leaf_text, leaves};
use crate::surface::{strip_placeholder, NodeId, VisualSurface, CARET_PLACEHOLDER};

/// A single unit of content with a stable identity
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub uid: String,
    pub block_type: Option<BlockType>,
    pub level: Option<u8>,
    content: String,
    pub data: Map<String, Value>,
    /// Rendered element, once rendered
    elem: Option<NodeId>,
}

impl Block {
    /// Build a block from optional data; missing fields default deterministically
    pub fn new(data: Option<BlockData>, config: &DeskConfig) -> Self {
        let data = data.unwrap_or_default();
        Self {
            uid: data.uid.unwrap_or_else(|| config.new_uid()),
            block_type: data.block_type,
            level: data.level,
            content: strip_placeholder(&data.content),
            data: data.data,
            elem: None,
        }
    }

    /// Wrap an element that already lives on the surface (e.g. created by a
    /// native edit) as a block
    pub fn adopt<S: VisualSurface>(surface: &mut S, elem: NodeId, config: &DeskConfig) -> Self {
        let mut block = Self::new(None, config);
        block.elem = Some(elem);
        surface.add_class(elem, &config.block_class);
        surface.set_attribute(elem, "id", &block.dom_id());
        block.content = strip_placeholder(&surface.inner_html(elem));
        block
    }

    pub fn serialize(&self) -> BlockData {
        BlockData {
            uid: Some(self.uid.clone()),
            block_type: self.block_type,
            content: self.content.clone(),
            level: self.level,
            data: self.data.clone(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn elem(&self) -> Option<NodeId> {
        self.elem
    }

    /// Id rendered on the surface, `block-{uid}`
    pub fn dom_id(&self) -> String {
        format!("block-{}", self.uid)
    }

    fn render_content<S: VisualSurface>(&self, surface: &mut S) {
        let Some(elem) = self.elem else { return };
        if self.content.is_empty() {
            // keep a caret target; never persisted
            surface.set_text(elem, &CARET_PLACEHOLDER.to_string());
        } else {
            surface.set_inner_html(elem, &self.content);
        }
    }

    /// Render once, then hand back the cached element
    pub fn render<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig) -> NodeId {
        if let Some(elem) = self.elem {
            return elem;
        }
        let elem = surface.create_element("div");
        surface.add_class(elem, &config.block_class);
        surface.set_attribute(elem, "id", &self.dom_id());
        if let Some(kind) = self.block_type {
            let tag = serde_json::to_value(kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            surface.set_attribute(elem, "data-type", &tag);
        }
        self.elem = Some(elem);
        self.render_content(surface);
        elem
    }

    pub fn set_content<S: VisualSurface>(&mut self, surface: &mut S, content: &str) {
        self.content = strip_placeholder(content);
        self.render_content(surface);
    }

    /// Pull content back from the surface after the user edited it
    pub fn sync_from_surface<S: VisualSurface>(&mut self, surface: &S) {
        if let Some(elem) = self.elem {
            self.content = strip_placeholder(&surface.inner_html(elem));
        }
    }

    /// Plain text currently on the surface (placeholders removed)
    pub fn text<S: VisualSurface>(&self, surface: &S) -> String {
        match self.elem {
            Some(elem) => strip_placeholder(&surface.text(elem)),
            None => String::new(),
        }
    }

    /// Nothing visible: no text, and at most the single line break an
    /// editable leaves behind once it has been cleared
    pub fn is_blank<S: VisualSurface>(&self, surface: &S) -> bool {
        let visible: String = match self.elem {
            Some(elem) => leaves(surface, elem)
                .into_iter()
                .map(|leaf| leaf_text(surface, leaf))
                .collect(),
            None => parse_html(&self.content).into_iter().map(|run| run.text).collect(),
        };
        visible.trim().is_empty() && visible.matches('\n').count() <= 1
    }

    /// Forget the rendered element (after it was detached from the surface)
    pub fn detach<S: VisualSurface>(&mut self, surface: &mut S) {
        if let Some(elem) = self.elem.take() {
            surface.remove(elem);
        }
    }
}
