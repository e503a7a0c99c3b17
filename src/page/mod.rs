//! Page: a fixed-size sheet holding an ordered list of blocks
//!
//! A page renders as
//!
//! ```text
//! wrapper (page wrapper class)
//!   page element (page class, fixed height, margins as padding)
//!     editable surface (contenteditable)
//!       block, block, ...
//! ```
//!
//! The overflow invariant is measured live off the surface after every
//! structural change: the last block's bottom must stay above the page bottom
//! minus the bottom margin.
//!
//! ## Modules
//!
//! - `clean`: repairs the block tree after uncontrolled edits
//! - `overflow`: extracts the content that no longer fits

pub mod clean;
pub mod overflow;

pub use overflow::{find_split_point, truncate_text};

use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{Block, BlockData, DeskConfig, PageData, PageSnapshot};
use crate::surface::{strip_placeholder, NodeId, SurfaceExt, VisualSurface, CARET_PLACEHOLDER};

/// Attribute marking the editable surface of a page
pub const EDITABLE_ATTRIBUTE: &str = "contenteditable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageState {
    /// Constructed, nothing on the surface yet
    Empty,
    /// Blocks are being attached
    Initializing,
    /// Content fits
    Steady,
    /// Usable height exceeded, extraction pending
    Overflowing,
    /// Tail extracted, waiting to be relocated
    Breaking,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub uid: String,
    blocks: Vec<Block>,
    /// Index of the block holding the caret
    current: usize,
    words: usize,
    state: PageState,
    wrapper: Option<NodeId>,
    page_elem: Option<NodeId>,
    editable: Option<NodeId>,
}

impl Page {
    /// Build a page from optional data. A page always has at least one block.
    pub fn new(data: Option<PageData>, config: &DeskConfig) -> Self {
        let data = data.unwrap_or_default();
        let mut blocks: Vec<Block> = data
            .blocks
            .into_iter()
            .map(|b| Block::new(Some(b), config))
            .collect();
        if blocks.is_empty() {
            blocks.push(Block::new(None, config));
        }
        Self {
            uid: data.uid.unwrap_or_else(|| config.new_uid()),
            blocks,
            current: 0,
            words: 0,
            state: PageState::Empty,
            wrapper: None,
            page_elem: None,
            editable: None,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, index: usize) {
        self.current = index.min(self.blocks.len().saturating_sub(1));
    }

    /// Outermost element, once rendered
    pub fn wrapper(&self) -> Option<NodeId> {
        self.wrapper
    }

    pub fn editable(&self) -> Option<NodeId> {
        self.editable
    }

    /// Word count as of the last recount
    pub fn words(&self) -> usize {
        self.words
    }

    /// Create the page on the surface and attach every block. Returns the
    /// wrapper; the caller decides where it goes.
    pub fn render<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig) -> NodeId {
        if let Some(wrapper) = self.wrapper {
            return wrapper;
        }
        self.state = PageState::Initializing;

        let wrapper = surface.create_element("div");
        surface.add_class(wrapper, &config.page_wrapper_class);
        surface.set_attribute(wrapper, "id", &format!("page-{}", self.uid));
        surface.set_style(wrapper, "margin-bottom", &config.spacing);

        let page = surface.create_element("div");
        surface.add_class(page, &config.page_class);
        surface.set_style(page, "box-sizing", "border-box");
        surface.set_style(page, "height", &config.height);
        surface.set_style(page, "width", &config.width);
        let m = config.margins;
        surface.set_style(page, "padding-top", &format!("{}px", m.top));
        surface.set_style(page, "padding-right", &format!("{}px", m.right));
        surface.set_style(page, "padding-bottom", &format!("{}px", m.bottom));
        surface.set_style(page, "padding-left", &format!("{}px", m.left));

        let editable = surface.create_element("div");
        surface.set_attribute(editable, EDITABLE_ATTRIBUTE, "true");

        surface.append_child(wrapper, page);
        surface.append_child(page, editable);
        for block in &mut self.blocks {
            let elem = block.render(surface, config);
            surface.append_child(editable, elem);
        }

        self.wrapper = Some(wrapper);
        self.page_elem = Some(page);
        self.editable = Some(editable);
        self.state = PageState::Steady;
        debug!("Rendered page {} with {} blocks", self.uid, self.blocks.len());
        wrapper
    }

    /// Detach the page from the surface
    pub fn detach<S: VisualSurface>(&mut self, surface: &mut S) {
        if let Some(wrapper) = self.wrapper.take() {
            surface.remove(wrapper);
        }
        self.page_elem = None;
        self.editable = None;
        self.state = PageState::Empty;
    }

    /// Page bottom minus the bottom margin, measured live
    pub fn usable_bottom<S: VisualSurface>(&self, surface: &S, config: &DeskConfig) -> Option<f64> {
        let page = self.page_elem?;
        Some(surface.bounds(page).bottom - config.margins.bottom)
    }

    /// True iff the last block's bottom reaches the usable bottom
    pub fn is_overflowing<S: VisualSurface>(&self, surface: &S, config: &DeskConfig) -> bool {
        let Some(usable) = self.usable_bottom(surface, config) else {
            return false;
        };
        match self.blocks.last().and_then(Block::elem) {
            Some(last) => surface.bounds(last).bottom >= usable,
            None => false,
        }
    }

    /// Re-measure and move between `Steady` and `Overflowing`
    pub fn refresh_state<S: VisualSurface>(&mut self, surface: &S, config: &DeskConfig) -> PageState {
        if self.wrapper.is_some() {
            self.state = if self.is_overflowing(surface, config) {
                PageState::Overflowing
            } else {
                PageState::Steady
            };
        }
        self.state
    }

    fn attach_block<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig, index: usize, data: Option<BlockData>) {
        let mut block = Block::new(data, config);
        if let Some(editable) = self.editable {
            let reference = self.blocks.get(index).and_then(Block::elem);
            let elem = block.render(surface, config);
            surface.insert_before(editable, elem, reference);
        }
        self.blocks.insert(index, block);
    }

    /// Insert a block at `index`. Beyond the end the page is padded with blank
    /// blocks first; if padding alone would overflow, the padding is rolled
    /// back and the insert is dropped.
    pub fn insert_block<S: VisualSurface>(
        &mut self,
        surface: &mut S,
        config: &DeskConfig,
        index: usize,
        data: Option<BlockData>,
    ) -> bool {
        let original_len = self.blocks.len();
        while self.blocks.len() < index {
            let at = self.blocks.len();
            self.attach_block(surface, config, at, None);
            if self.is_overflowing(surface, config) {
                error!(
                    "Cannot pad page {} up to block {}: padding overflows the page; insert dropped",
                    self.uid, index
                );
                for mut pad in self.blocks.drain(original_len..) {
                    pad.detach(surface);
                }
                return false;
            }
        }
        self.attach_block(surface, config, index, data);
        if original_len > 0 && index <= self.current {
            // keep pointing at the same block
            self.current += 1;
        }
        trace!("Inserted block {} on page {}", index, self.uid);
        true
    }

    /// Insert a block right after the current one and move the caret into it
    pub fn new_line<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig, data: Option<BlockData>) -> Option<usize> {
        let index = (self.current + 1).min(self.blocks.len());
        if !self.insert_block(surface, config, index, data) {
            return None;
        }
        self.current = index;
        self.focus(surface);
        Some(index)
    }

    /// Remove one block, handing back its data. The last remaining block is
    /// never removed.
    pub fn remove_block<S: VisualSurface>(&mut self, surface: &mut S, index: usize) -> Option<BlockData> {
        if self.blocks.len() <= 1 || index >= self.blocks.len() {
            return None;
        }
        let mut block = self.blocks.remove(index);
        block.sync_from_surface(surface);
        block.detach(surface);
        if index < self.current || self.current >= self.blocks.len() {
            self.current = self.current.saturating_sub(1);
        }
        Some(block.serialize())
    }

    /// Put relocated blocks at the top of the page, in order
    pub fn prepend_blocks<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig, blocks: Vec<BlockData>) {
        for (i, data) in blocks.into_iter().enumerate() {
            self.attach_block(surface, config, i, Some(data));
        }
        self.current = 0;
    }

    /// Append a block at the end
    pub fn push_block<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig, data: BlockData) {
        let at = self.blocks.len();
        self.attach_block(surface, config, at, Some(data));
    }

    /// Index of the block whose element is, or contains, `node`
    pub fn block_index_of<S: VisualSurface>(&self, surface: &S, node: NodeId) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.elem().map(|e| surface.contains(e, node)).unwrap_or(false))
    }

    /// Follow the caret to the block holding it
    pub fn track_caret<S: VisualSurface>(&mut self, surface: &S) {
        if let Some(index) = surface.caret_node().and_then(|n| self.block_index_of(surface, n)) {
            self.current = index;
        }
    }

    /// Rebuild the block list from what is actually on the surface
    ///
    /// Known elements keep their block (and uid). Unknown elements, including
    /// copies that carry an id already seen in this pass, become new blocks.
    pub fn reconcile<S: VisualSurface>(&mut self, surface: &mut S, config: &DeskConfig) {
        let Some(editable) = self.editable else { return };
        let mut old: Vec<Option<Block>> = std::mem::take(&mut self.blocks).into_iter().map(Some).collect();
        let mut seen_ids = BTreeSet::new();
        let mut blocks = Vec::new();

        for child in surface.children(editable) {
            if surface.is_text(child) {
                continue;
            }
            let id = surface.attribute(child, "id");
            let duplicate = id.as_ref().map(|id| !seen_ids.insert(id.clone())).unwrap_or(false);
            let known = old
                .iter_mut()
                .find(|slot| slot.as_ref().and_then(Block::elem) == Some(child))
                .and_then(Option::take);
            match known {
                Some(mut block) if !duplicate => {
                    block.sync_from_surface(surface);
                    blocks.push(block);
                }
                _ => {
                    let block = Block::adopt(surface, child, config);
                    trace!("Adopted element as block {} on page {}", block.uid, self.uid);
                    seen_ids.insert(block.dom_id());
                    blocks.push(block);
                }
            }
        }

        let dropped = old.iter().flatten().count();
        if dropped > 0 {
            trace!("{} blocks left page {} during an edit", dropped, self.uid);
        }
        if blocks.is_empty() {
            let mut block = Block::new(None, config);
            let elem = block.render(surface, config);
            surface.append_child(editable, elem);
            blocks.push(block);
        }
        self.blocks = blocks;
        self.current = self.current.min(self.blocks.len() - 1);
    }

    /// True when the page holds one block with nothing in it
    pub fn is_single_empty<S: VisualSurface>(&self, surface: &S) -> bool {
        self.blocks.len() == 1 && self.blocks[0].is_blank(surface)
    }

    /// Recount words over every block's text
    pub fn word_count<S: VisualSurface>(&mut self, surface: &S) -> usize {
        self.words = self.blocks.iter().map(|b| count_words(&b.text(surface))).sum();
        self.words
    }

    /// Place the caret in the current block
    pub fn focus<S: VisualSurface>(&self, surface: &mut S) {
        self.focus_block(surface, self.current);
    }

    /// Place the caret at the end of the last non-empty text inside the block
    /// (or the block itself when it has none), then scroll it into view
    pub fn focus_block<S: VisualSurface>(&self, surface: &mut S, index: usize) {
        let Some(elem) = self.blocks.get(index).and_then(Block::elem) else {
            return;
        };
        let target = surface
            .text_nodes(elem)
            .into_iter()
            .rev()
            .find(|t| !strip_placeholder(&surface.text(*t)).is_empty());
        match target {
            Some(text) => {
                let offset = surface.text(text).chars().count();
                surface.place_caret(text, offset);
            }
            None => surface.place_caret(elem, 0),
        }
        scroll_caret_into_view(surface);
    }

    /// Pull the model's content from the surface
    pub fn sync<S: VisualSurface>(&mut self, surface: &S) {
        for block in &mut self.blocks {
            block.sync_from_surface(surface);
        }
    }

    pub fn serialize(&self) -> PageData {
        PageData {
            uid: Some(self.uid.clone()),
            blocks: self.blocks.iter().map(Block::serialize).collect(),
        }
    }

    /// Snapshot with 1-based block numbers; `only` restricts it to the given
    /// 0-based block indices
    pub fn snapshot(&self, only: Option<&BTreeSet<usize>>) -> PageSnapshot {
        let blocks = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| only.map(|set| set.contains(i)).unwrap_or(true))
            .map(|(i, b)| (i + 1, b.serialize()))
            .collect();
        PageSnapshot {
            uid: self.uid.clone(),
            blocks,
        }
    }
}

/// Words are whitespace-separated tokens; caret placeholders do not count
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(|c| c != CARET_PLACEHOLDER))
        .count()
}

/// Scroll so that the caret is inside the viewport
pub fn scroll_caret_into_view<S: VisualSurface>(surface: &mut S) {
    let Some(caret) = surface.caret_bounds() else { return };
    let viewport = surface.viewport_height();
    if caret.top < 0.0 {
        surface.scroll_by(caret.top);
    } else if caret.bottom > viewport {
        surface.scroll_by(caret.bottom - viewport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Margins;
    use crate::surface::{MemoryLayout, MemorySurface};

    /// Page whose usable height fits `lines` lines of 20px with slack
    pub(crate) fn small_config(lines: usize) -> DeskConfig {
        DeskConfig {
            height: format!("{}px", 30 + lines * 20 + 10),
            margins: Margins {
                left: 15.0,
                right: 15.0,
                top: 15.0,
                bottom: 15.0,
            },
            ..DeskConfig::default()
        }
    }

    fn page_with(surface: &mut MemorySurface, config: &DeskConfig, contents: &[&str]) -> Page {
        let data = PageData {
            uid: Some("p1".to_string()),
            blocks: contents.iter().map(|c| BlockData::with_content(*c)).collect(),
        };
        let mut page = Page::new(Some(data), config);
        let wrapper = page.render(surface, config);
        let body = surface.body();
        surface.append_child(body, wrapper);
        page
    }

    #[test]
    fn test_new_page_has_one_block() {
        let config = DeskConfig::default();
        let page = Page::new(None, &config);
        assert_eq!(page.block_count(), 1);
        assert_eq!(page.state(), PageState::Empty);
    }

    #[test]
    fn test_render_structure() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let page = page_with(&mut s, &config, &["a", "b"]);
        let wrapper = page.wrapper().unwrap();
        assert!(s.has_class(wrapper, "desk-page-wrapper"));
        let page_elem = s.children(wrapper)[0];
        assert!(s.has_class(page_elem, "desk-page"));
        let editable = page.editable().unwrap();
        assert_eq!(s.attribute(editable, "contenteditable").as_deref(), Some("true"));
        assert_eq!(s.children(editable).len(), 2);
        assert_eq!(page.state(), PageState::Steady);
    }

    #[test]
    fn test_overflow_threshold() {
        let config = small_config(2);
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["one", "two"]);
        assert!(!page.is_overflowing(&s, &config));
        assert!(page.insert_block(&mut s, &config, 2, Some(BlockData::with_content("three"))));
        assert!(page.is_overflowing(&s, &config));
        assert_eq!(page.refresh_state(&s, &config), PageState::Overflowing);
    }

    #[test]
    fn test_exact_fit_counts_as_overflow() {
        // usable height of exactly two lines
        let config = DeskConfig {
            height: "70px".to_string(),
            ..DeskConfig::default()
        };
        let mut s = MemorySurface::new(MemoryLayout::default());
        let page = page_with(&mut s, &config, &["one", "two"]);
        assert!(page.is_overflowing(&s, &config));
    }

    #[test]
    fn test_insert_block_pads_with_blanks() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["a"]);
        assert!(page.insert_block(&mut s, &config, 3, Some(BlockData::with_content("d"))));
        let contents: Vec<_> = page.blocks().iter().map(|b| b.content().to_string()).collect();
        assert_eq!(contents, vec!["a", "", "", "d"]);
        assert_eq!(s.children(page.editable().unwrap()).len(), 4);
    }

    #[test]
    fn test_padding_that_overflows_is_rolled_back() {
        let config = small_config(2);
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["a"]);
        assert!(!page.insert_block(&mut s, &config, 5, Some(BlockData::with_content("far"))));
        assert_eq!(page.block_count(), 1);
        assert_eq!(s.children(page.editable().unwrap()).len(), 1);
        assert!(!page.is_overflowing(&s, &config));
    }

    #[test]
    fn test_new_line_goes_after_current_and_focuses() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["a", "c"]);
        page.set_current(0);
        assert_eq!(page.new_line(&mut s, &config, None), Some(1));
        assert_eq!(page.current(), 1);
        let elem = page.blocks()[1].elem().unwrap();
        assert_eq!(s.text(elem), "\u{200B}");
        assert_eq!(s.caret(), Some((elem, 0)));
    }

    #[test]
    fn test_reconcile_adopts_foreign_and_duplicate_elements() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["a"]);
        let editable = page.editable().unwrap();
        let original = page.blocks()[0].elem().unwrap();
        let original_uid = page.blocks()[0].uid.clone();

        // a copy of the first block, as a browser split would make
        let copy = s.create_element("div");
        s.add_class(copy, "desk-block");
        s.set_attribute(copy, "id", &page.blocks()[0].dom_id());
        s.set_text(copy, "b");
        s.append_child(editable, copy);

        page.reconcile(&mut s, &config);
        assert_eq!(page.block_count(), 2);
        assert_eq!(page.blocks()[0].uid, original_uid);
        assert_eq!(page.blocks()[0].elem(), Some(original));
        assert_ne!(page.blocks()[1].uid, original_uid);
        assert_eq!(page.blocks()[1].content(), "b");
    }

    #[test]
    fn test_reconcile_never_leaves_page_empty() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["a"]);
        let elem = page.blocks()[0].elem().unwrap();
        s.remove(elem);
        page.reconcile(&mut s, &config);
        assert_eq!(page.block_count(), 1);
        assert!(page.is_single_empty(&s));
    }

    #[test]
    fn test_word_count_skips_placeholder() {
        assert_eq!(count_words("  two  words "), 2);
        assert_eq!(count_words("\u{200B}"), 0);
        assert_eq!(count_words("\u{200B}word"), 1);

        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let mut page = page_with(&mut s, &config, &["one two", "", "<b>three</b>"]);
        assert_eq!(page.word_count(&s), 3);
        assert_eq!(page.words(), 3);
    }

    #[test]
    fn test_focus_targets_last_non_empty_text() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let page = page_with(&mut s, &config, &["ab<b>cd</b>"]);
        page.focus(&mut s);
        let elem = page.blocks()[0].elem().unwrap();
        let last = *s.text_nodes(elem).last().unwrap();
        assert_eq!(s.caret(), Some((last, 2)));
    }

    #[test]
    fn test_focus_scrolls_caret_into_view() {
        let config = DeskConfig::default();
        let layout = MemoryLayout {
            viewport_height: 100.0,
            ..MemoryLayout::default()
        };
        let mut s = MemorySurface::new(layout);
        let contents: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        let page = page_with(&mut s, &config, &refs);
        page.focus_block(&mut s, 9);
        let caret = s.caret_bounds().unwrap();
        assert!(caret.bottom <= 100.0);
        assert!(s.scroll_y() > 0.0);
    }

    #[test]
    fn test_partial_snapshot_is_one_based_and_sparse() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let page = page_with(&mut s, &config, &["a", "b", "c"]);
        let only: BTreeSet<usize> = [0, 2].into_iter().collect();
        let snap = page.snapshot(Some(&only));
        let keys: Vec<_> = snap.blocks.keys().copied().collect();
        assert_eq!(keys, vec![1, 3]);
        assert_eq!(snap.blocks[&3].content, "c");
    }

    #[test]
    fn test_serialize_round_trip_keeps_order_and_ids() {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let page = page_with(&mut s, &config, &["a", "<i>b</i>", ""]);
        let again = Page::new(Some(page.serialize()), &config);
        assert_eq!(again.uid, page.uid);
        for (x, y) in page.blocks().iter().zip(again.blocks()) {
            assert_eq!(x.uid, y.uid);
            assert_eq!(x.content(), y.content());
        }
    }
}
