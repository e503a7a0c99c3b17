//! Desk: the document of pages
//!
//! The desk owns the surface, the engine and the ordered page list. It routes
//! keystrokes and mutation batches to the right page, and acts on the events
//! the engine hands back: relocating overflow to the following page (creating
//! it when needed), deleting pages, pulling content back when a page has room
//! again, and delivering change notifications to the host.

use log::{debug, error, info, trace, warn};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

use crate::engine::{Engine, EngineEvent, InputTypeGroup, KeyInput, KeyOutcome, PageChange, RichTextCommands};
use crate::models::{Action, BlockData, ChangeEvent, ConfigError, DeskConfig, DeskSnapshot, PageData};
use crate::page::{Page, PageState};
use crate::surface::{MutationRecord, NodeId, SurfaceExt, VisualSurface};

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Holder element '{0}' not found")]
    MissingHolder(String),

    #[error("Page number {0} is out of range")]
    InvalidPageNumber(usize),

    #[error("No page with uid '{0}'")]
    UnknownPage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ChangeCallback = Box<dyn FnMut(ChangeEvent)>;
pub type PasteCallback = Box<dyn FnMut(&str, &str)>;

pub struct Desk<S: VisualSurface, C: RichTextCommands> {
    surface: S,
    engine: Engine<C>,
    config: DeskConfig,
    pages: Vec<Page>,
    holder: NodeId,
    /// Page holding the caret (0-based)
    on_page: usize,
    session_key: String,
    on_change: Option<ChangeCallback>,
    on_paste: Option<PasteCallback>,
}

impl<S: VisualSurface, C: RichTextCommands> Desk<S, C> {
    /// Build the document inside the holder element and lay out the initial
    /// pages, moving overflow forward until every page fits
    pub fn new(mut surface: S, mut config: DeskConfig, commands: C) -> Result<Self, DeskError> {
        config.validate()?;
        let holder = surface.find_by_id(&config.holder).ok_or_else(|| {
            error!("Holder element '{}' not found", config.holder);
            DeskError::MissingHolder(config.holder.clone())
        })?;

        let initial = std::mem::take(&mut config.pages);
        let session_key = config.session_key.clone().unwrap_or_else(|| config.new_uid());
        let engine = Engine::new(&config, commands);

        let mut pages = Vec::new();
        let datas: Vec<Option<PageData>> = if initial.is_empty() {
            vec![None]
        } else {
            initial.into_iter().map(Some).collect()
        };
        for data in datas {
            let mut page = Page::new(data, &config);
            let wrapper = page.render(&mut surface, &config);
            surface.append_child(holder, wrapper);
            pages.push(page);
        }

        let on_page = if config.on_page == 0 || config.on_page > pages.len() {
            warn!("Page number {} is out of range; focusing page 1", config.on_page);
            0
        } else {
            config.on_page - 1
        };

        let mut desk = Self {
            surface,
            engine,
            config,
            pages,
            holder,
            on_page,
            session_key,
            on_change: None,
            on_paste: None,
        };

        let mut i = 0;
        while i < desk.pages.len() {
            desk.settle(i, None);
            i += 1;
        }
        if let Some(page) = desk.pages.get(desk.on_page) {
            page.focus(&mut desk.surface);
        }
        info!("Desk ready with {} pages (session {})", desk.pages.len(), desk.session_key);
        Ok(desk)
    }

    pub fn set_on_change(&mut self, callback: ChangeCallback) {
        self.on_change = Some(callback);
    }

    pub fn set_on_paste(&mut self, callback: PasteCallback) {
        self.on_paste = Some(callback);
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<C> {
        &mut self.engine
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Page holding the caret (0-based)
    pub fn on_page(&self) -> usize {
        self.on_page
    }

    pub fn find_page_index_by_uid(&self, uid: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.uid == uid)
    }

    /// Index of the page with this uid, or an error naming it
    pub fn page_index(&self, uid: &str) -> Result<usize, DeskError> {
        self.find_page_index_by_uid(uid)
            .ok_or_else(|| DeskError::UnknownPage(uid.to_string()))
    }

    /// Page whose wrapper contains `node`
    pub fn page_index_of(&self, node: NodeId) -> Option<usize> {
        self.pages.iter().position(|p| {
            p.wrapper()
                .map(|w| self.surface.contains(w, node))
                .unwrap_or(false)
        })
    }

    pub fn word_count(&mut self) -> usize {
        let surface = &self.surface;
        self.pages.iter_mut().map(|p| p.word_count(surface)).sum()
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Handle a keystroke on the page holding the caret
    pub fn keydown(&mut self, input: &KeyInput, now: f64) -> KeyOutcome {
        if let Some(index) = self.surface.caret_node().and_then(|n| self.page_index_of(n)) {
            self.on_page = index;
        }
        let Some(page) = self.pages.get_mut(self.on_page) else {
            return KeyOutcome::default();
        };
        let outcome = self.engine.on_keydown(page, &mut self.surface, &self.config, input, now);
        self.process(outcome.events.clone(), Some(now));
        outcome
    }

    /// Handle a batch of mutation records. Records are routed to the page
    /// they happened on; records from detached nodes are dropped.
    pub fn mutations(&mut self, records: Vec<MutationRecord>, now: f64) {
        let mut routed: Vec<(usize, Vec<MutationRecord>)> = Vec::new();
        for record in records {
            let Some(index) = self.page_index_of(record.target) else {
                trace!("Dropping mutation on detached node {:?}", record.target);
                continue;
            };
            match routed.iter_mut().find(|(i, _)| *i == index) {
                Some((_, batch)) => batch.push(record),
                None => routed.push((index, vec![record])),
            }
        }
        // uids, since pages may move while earlier batches are handled
        let batches: Vec<(String, Vec<MutationRecord>)> = routed
            .into_iter()
            .map(|(i, batch)| (self.pages[i].uid.clone(), batch))
            .collect();
        for (uid, batch) in batches {
            self.page_mutations(&uid, &batch, now);
        }
    }

    /// Handle a batch of mutation records known to belong to one page
    pub fn page_mutations(&mut self, uid: &str, records: &[MutationRecord], now: f64) {
        let index = match self.page_index(uid) {
            Ok(index) => index,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };
        let events = self
            .engine
            .handle_mutation(&mut self.pages[index], &mut self.surface, &self.config, records, now);
        let overflowed = events.iter().any(|e| matches!(e, EngineEvent::Overflow { .. }));
        self.process(events, Some(now));
        if !overflowed {
            self.pull_back(index, now);
        }
    }

    /// Classify a `beforeinput`; paste is handed to the paste callback
    pub fn before_input(&mut self, page_index: usize, input_type: &str, data: Option<String>) -> InputTypeGroup {
        let Some(page) = self.pages.get(page_index) else {
            error!("{}", DeskError::InvalidPageNumber(page_index + 1));
            return InputTypeGroup::Unknown;
        };
        let outcome = self.engine.before_input(page, input_type, data);
        if let Some(event) = outcome.event {
            self.process(vec![event], None);
        }
        outcome.group
    }

    /// Run an action on behalf of the host
    pub fn execute_action(&mut self, action: Action, value: Option<&str>) {
        if let Some(event) = self.engine.execute_action(action, value) {
            self.process(vec![event], None);
        }
    }

    /// Deliver debounced changes whose deadline has passed
    pub fn tick(&mut self, now: f64) {
        let events = self.engine.tick(now);
        self.process(events, Some(now));
    }

    /// Deliver every pending change now
    pub fn flush(&mut self) {
        let events = self.engine.flush();
        self.process(events, None);
    }

    /// When the next debounced notification is due
    pub fn next_deadline(&self) -> Option<f64> {
        self.engine.debouncer().deadline()
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    fn attach_page(&mut self, index: usize, data: Option<PageData>) -> usize {
        let index = index.min(self.pages.len());
        let mut page = Page::new(data, &self.config);
        let wrapper = page.render(&mut self.surface, &self.config);
        let reference = self.pages.get(index).and_then(Page::wrapper);
        self.surface.insert_before(self.holder, wrapper, reference);
        info!("Inserted page {} at {}", page.uid, index + 1);
        self.pages.insert(index, page);
        if index <= self.on_page && self.pages.len() > 1 {
            self.on_page += 1;
        }
        index
    }

    /// Insert a page at a 0-based position (at most the page count)
    pub fn insert_page_at(&mut self, index: usize, data: Option<PageData>) -> Option<usize> {
        if index > self.pages.len() {
            error!("Page number {} is out of range", index + 1);
            return None;
        }
        let index = self.attach_page(index, data);
        self.settle(index, None);
        Some(index)
    }

    /// Append an empty page and move the caret onto it
    pub fn new_page(&mut self) -> usize {
        let index = self.attach_page(self.pages.len(), None);
        self.focus_page(index);
        index
    }

    pub fn focus_page(&mut self, index: usize) {
        if let Some(page) = self.pages.get(index) {
            page.focus(&mut self.surface);
            self.on_page = index;
        }
    }

    /// Put the caret at the end of one block
    pub fn focus_block(&mut self, page: usize, block: usize) {
        if let Some(target) = self.pages.get_mut(page) {
            if block < target.block_count() {
                target.set_current(block);
                target.focus(&mut self.surface);
                self.on_page = page;
            }
        }
    }

    /// Remove a page; the first page is never removed
    pub fn remove_page(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.pages.len() {
            debug!("Not removing page {}", index + 1);
            return false;
        }
        let mut page = self.pages.remove(index);
        page.detach(&mut self.surface);
        self.engine.forget_page(&page.uid);
        info!("Removed page {}", page.uid);
        if self.on_page >= index {
            self.on_page = self.on_page.saturating_sub(1);
        }
        true
    }

    /// Extract overflow of a page and relocate it, cascading forward
    fn settle(&mut self, index: usize, now: Option<f64>) {
        let Some(page) = self.pages.get_mut(index) else { return };
        if page.refresh_state(&self.surface, &self.config) != PageState::Overflowing {
            return;
        }
        let blocks = page.extract_overflow(&mut self.surface, &self.config, &[]);
        if !blocks.is_empty() {
            let event = EngineEvent::Overflow {
                page: page.uid.clone(),
                blocks,
            };
            self.process(vec![event], now);
        }
    }

    fn process(&mut self, events: Vec<EngineEvent>, now: Option<f64>) {
        let mut queue: VecDeque<EngineEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            match event {
                EngineEvent::Overflow { page, blocks } => {
                    if let Some(index) = self.find_page_index_by_uid(&page) {
                        self.relocate(index, blocks, now, &mut queue);
                    }
                }
                EngineEvent::Delete { page } => {
                    if let Some(index) = self.find_page_index_by_uid(&page) {
                        if self.remove_page(index) {
                            let previous = index - 1;
                            let last = self.pages[previous].block_count() - 1;
                            self.pages[previous].set_current(last);
                            self.focus_page(previous);
                        }
                    }
                }
                EngineEvent::Change(change) => self.emit_change(change),
                EngineEvent::Paste { page, payload } => {
                    debug!("Paste of {} chars on page {}", payload.len(), page);
                    if let Some(callback) = self.on_paste.as_mut() {
                        callback(&page, &payload);
                    }
                }
                EngineEvent::Save => {
                    let snapshot = self.save(None);
                    self.deliver(snapshot.clone(), snapshot);
                }
            }
        }
    }

    /// Put overflow of page `index` at the top of the following page
    fn relocate(&mut self, index: usize, blocks: Vec<BlockData>, now: Option<f64>, queue: &mut VecDeque<EngineEvent>) {
        let moved = blocks.len();
        let follow = self.caret_follows(index);
        let target = index + 1;
        if target < self.pages.len() {
            self.pages[target].prepend_blocks(&mut self.surface, &self.config, blocks);
        } else {
            self.attach_page(
                target,
                Some(PageData {
                    uid: None,
                    blocks,
                }),
            );
        }
        debug!("Moved {} blocks from page {} to page {}", moved, index + 1, target + 1);
        self.pages[index].refresh_state(&self.surface, &self.config);

        if follow {
            self.pages[target].set_current(moved.saturating_sub(1));
            self.focus_page(target);
        }

        if let Some(now) = now {
            let source_last = self.pages[index].block_count() - 1;
            let target_count = self.pages[target].block_count();
            let mut events = self.engine.note_change(&self.pages[index], [source_last], now);
            events.extend(self.engine.note_change(&self.pages[target], 0..target_count, now));
            queue.extend(events);
        }

        let page = &mut self.pages[target];
        if page.refresh_state(&self.surface, &self.config) == PageState::Overflowing {
            let tail = page.extract_overflow(&mut self.surface, &self.config, &[]);
            if !tail.is_empty() {
                queue.push_back(EngineEvent::Overflow {
                    page: page.uid.clone(),
                    blocks: tail,
                });
            }
        }
    }

    /// True when the caret should move along with relocated content: it sat
    /// in the last block of the page, or its node left every page
    fn caret_follows(&self, index: usize) -> bool {
        let Some(caret) = self.surface.caret_node() else {
            return false;
        };
        let page = &self.pages[index];
        match page.block_index_of(&self.surface, caret) {
            Some(block) => block + 1 == page.block_count(),
            None => !self.pages.iter().any(|p| p.block_index_of(&self.surface, caret).is_some()),
        }
    }

    /// Pull non-blank blocks back onto page `index` while they fit, then let
    /// the page that gave them up do the same, down the document. Pages
    /// emptied this way are removed.
    fn pull_back(&mut self, index: usize, now: f64) {
        let mut at = index;
        while at + 1 < self.pages.len() {
            let (pulled, next_gave) = self.pull_into(at);
            if pulled == 0 {
                break;
            }
            debug!("Pulled {} blocks back onto page {}", pulled, at + 1);
            let count = self.pages[at].block_count();
            let mut events = self.engine.note_change(&self.pages[at], count - pulled..count, now);
            if next_gave {
                let next = &self.pages[at + 1];
                events.extend(self.engine.note_change(next, 0..next.block_count(), now));
            }
            self.process(events, Some(now));
            if !next_gave {
                break;
            }
            at += 1;
        }
    }

    /// Move blocks from the following pages onto page `at` while they fit.
    /// Returns how many moved, and whether the page now following `at` lost
    /// blocks and so has room of its own.
    fn pull_into(&mut self, at: usize) -> (usize, bool) {
        let mut pulled = 0;
        let mut next_gave = false;
        while at + 1 < self.pages.len() {
            let next = &self.pages[at + 1];
            match next.blocks().first() {
                Some(first) if !first.is_blank(&self.surface) => {}
                _ => break,
            }
            let single = next.block_count() == 1;
            let data = if single {
                let next = &mut self.pages[at + 1];
                next.sync(&self.surface);
                next.serialize().blocks.into_iter().next()
            } else {
                self.pages[at + 1].remove_block(&mut self.surface, 0)
            };
            let Some(data) = data else { break };

            self.pages[at].push_block(&mut self.surface, &self.config, data);
            if self.pages[at].is_overflowing(&self.surface, &self.config) {
                let last = self.pages[at].block_count() - 1;
                let back = self.pages[at].remove_block(&mut self.surface, last);
                if let (false, Some(back)) = (single, back) {
                    self.pages[at + 1].prepend_blocks(&mut self.surface, &self.config, vec![back]);
                }
                break;
            }
            pulled += 1;
            if single {
                // the page after the removed one is untouched so far
                self.remove_page(at + 1);
                next_gave = false;
            } else {
                next_gave = true;
            }
        }
        (pulled, next_gave)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Snapshot of one page (1-based number) or of the whole document.
    /// An invalid page number logs and yields an empty snapshot.
    pub fn save(&mut self, page_number: Option<usize>) -> DeskSnapshot {
        let surface = &self.surface;
        for page in &mut self.pages {
            page.sync(surface);
        }
        let mut pages = BTreeMap::new();
        match page_number {
            None => {
                for (i, page) in self.pages.iter().enumerate() {
                    pages.insert(i + 1, page.snapshot(None));
                }
            }
            Some(n) if n >= 1 && n <= self.pages.len() => {
                pages.insert(n, self.pages[n - 1].snapshot(None));
            }
            Some(n) => {
                error!("{}", DeskError::InvalidPageNumber(n));
            }
        }
        DeskSnapshot { pages }
    }

    /// Snapshot restricted to some blocks (0-based indices) of one page
    pub fn save_blocks(&mut self, index: usize, blocks: &BTreeSet<usize>) -> DeskSnapshot {
        let mut pages = BTreeMap::new();
        if let Some(page) = self.pages.get_mut(index) {
            page.sync(&self.surface);
            pages.insert(index + 1, page.snapshot(Some(blocks)));
        }
        DeskSnapshot { pages }
    }

    fn emit_change(&mut self, change: PageChange) {
        let Some(index) = self.find_page_index_by_uid(&change.page) else {
            trace!("Dropping change for removed page {}", change.page);
            return;
        };
        // blocks that left the page are reported by the page they went to
        let blocks: BTreeSet<usize> = self.pages[index]
            .blocks()
            .iter()
            .enumerate()
            .filter(|(_, b)| change.blocks.contains(&b.uid))
            .map(|(i, _)| i)
            .collect();
        if blocks.is_empty() {
            return;
        }
        let partial = self.save_blocks(index, &blocks);
        let snapshot = if self.config.save_on_change {
            self.save(None)
        } else {
            partial.clone()
        };
        self.deliver(partial, snapshot);
    }

    /// Send a change notification; `changed` names the pages and blocks
    fn deliver(&mut self, changed: DeskSnapshot, snapshot: DeskSnapshot) {
        let event = ChangeEvent {
            session_key: self.session_key.clone(),
            changed: changed
                .pages
                .iter()
                .map(|(n, page)| (*n, page.blocks.keys().copied().collect()))
                .collect(),
            snapshot,
        };
        match self.on_change.as_mut() {
            Some(callback) => callback(event),
            None => trace!("No change callback registered"),
        }
    }
}
