//! Engine: turns keystrokes and surface mutations into editor events
//!
//! The engine never owns pages. Every entry point borrows the page the input
//! belongs to, together with the surface and the configuration, and returns
//! the events the desk has to act on.
//!
//! ## Modules
//!
//! - `shortcuts`: compiled shortcut table and keystroke matching
//! - `debounce`: coalescing of changed blocks into notifications
//! - `commands`: mapping of actions to host rich-text commands
//! - `input`: `beforeinput` classification
//! - `events`: events handed to the desk

pub mod commands;
pub mod debounce;
pub mod events;
pub mod input;
pub mod shortcuts;

pub use commands::{CommandPlan, RecordingCommands, RichTextCommands};
pub use debounce::{ChangeDebouncer, PageChange};
pub use events::EngineEvent;
pub use input::InputTypeGroup;
pub use shortcuts::{compile, KeyInput, ShortcutTable};

use log::{debug, trace, warn};
use std::collections::BTreeSet;

use crate::models::{Action, DeskConfig, Shortcut};
use crate::page::{Page, PageState};
use crate::surface::{MutationKind, MutationRecord, NodeId, SurfaceExt, VisualSurface};

/// Shown once when the host does not report key names
pub const INCOMPATIBLE_NOTICE: &str =
    "This browser does not report key names. Keyboard shortcuts and page handling of Enter and Backspace are disabled.";

/// Result of handling one keystroke
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyOutcome {
    /// Suppress the host's default handling
    pub prevent_default: bool,
    pub events: Vec<EngineEvent>,
    /// User-visible message
    pub notice: Option<String>,
}

impl KeyOutcome {
    fn handled(events: Vec<EngineEvent>) -> Self {
        Self {
            prevent_default: true,
            events,
            notice: None,
        }
    }
}

/// Result of classifying one `beforeinput`
#[derive(Debug, Clone, PartialEq)]
pub struct InputOutcome {
    pub group: InputTypeGroup,
    pub event: Option<EngineEvent>,
}

pub struct Engine<C: RichTextCommands> {
    table: ShortcutTable,
    commands: C,
    debouncer: ChangeDebouncer,
    /// Cleared for good on the first keystroke without a key name
    key_names: bool,
}

impl<C: RichTextCommands> Engine<C> {
    pub fn new(config: &DeskConfig, commands: C) -> Self {
        Self {
            table: compile(config.shortcuts()),
            commands,
            debouncer: ChangeDebouncer::new(config.debounce_changes),
            key_names: true,
        }
    }

    pub fn shortcuts(&self) -> &ShortcutTable {
        &self.table
    }

    pub fn commands(&self) -> &C {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut C {
        &mut self.commands
    }

    pub fn debouncer(&self) -> &ChangeDebouncer {
        &self.debouncer
    }

    pub fn match_shortcut(&self, input: &KeyInput) -> Option<&Shortcut> {
        self.table.find(input)
    }

    /// Run an action. Host commands produce no event; `save` does.
    pub fn execute_action(&mut self, action: Action, value: Option<&str>) -> Option<EngineEvent> {
        match commands::plan(action) {
            CommandPlan::Save => Some(EngineEvent::Save),
            _ => {
                commands::run(&mut self.commands, action, value);
                None
            }
        }
    }

    pub fn on_keydown<S: VisualSurface>(
        &mut self,
        page: &mut Page,
        surface: &mut S,
        config: &DeskConfig,
        input: &KeyInput,
        now: f64,
    ) -> KeyOutcome {
        if !self.key_names {
            return KeyOutcome::default();
        }
        let Some(key) = input.key.as_deref() else {
            self.key_names = false;
            warn!("Keydown without a key name; falling back to default key handling");
            return KeyOutcome {
                notice: Some(INCOMPATIBLE_NOTICE.to_string()),
                ..KeyOutcome::default()
            };
        };

        if let Some(shortcut) = self.table.find(input) {
            let action = shortcut.action;
            debug!("Shortcut {} -> {:?}", shortcut.name, action);
            return KeyOutcome::handled(self.execute_action(action, None).into_iter().collect());
        }

        match key {
            "Enter" if !input.shift => {
                page.track_caret(surface);
                let Some(index) = page.new_line(surface, config, None) else {
                    return KeyOutcome::handled(Vec::new());
                };
                if page.refresh_state(surface, config) == PageState::Overflowing {
                    let blocks = page.extract_overflow(surface, config, &[]);
                    if !blocks.is_empty() {
                        let event = EngineEvent::Overflow {
                            page: page.uid.clone(),
                            blocks,
                        };
                        return KeyOutcome::handled(vec![event]);
                    }
                }
                let count = page.block_count();
                KeyOutcome::handled(self.note_change(page, index..count, now))
            }
            "Backspace" if page.is_single_empty(surface) => KeyOutcome::handled(vec![EngineEvent::Delete {
                page: page.uid.clone(),
            }]),
            _ => KeyOutcome::default(),
        }
    }

    /// Repair the page, then either extract its overflow or record which
    /// blocks changed
    pub fn handle_mutation<S: VisualSurface>(
        &mut self,
        page: &mut Page,
        surface: &mut S,
        config: &DeskConfig,
        records: &[MutationRecord],
        now: f64,
    ) -> Vec<EngineEvent> {
        page.clean(surface, config);
        page.reconcile(surface, config);

        if page.refresh_state(surface, config) == PageState::Overflowing {
            let blocks = page.extract_overflow(surface, config, records);
            if !blocks.is_empty() {
                return vec![EngineEvent::Overflow {
                    page: page.uid.clone(),
                    blocks,
                }];
            }
            page.refresh_state(surface, config);
        }

        let changed = classify_mutations(page, surface, config, records);
        trace!("Page {}: {} blocks changed", page.uid, changed.len());
        self.note_change(page, changed, now)
    }

    /// Classify a `beforeinput`. A paste is reported; the group goes back to
    /// the host, which keeps the default handling of every input type.
    pub fn before_input(&self, page: &Page, input_type: &str, data: Option<String>) -> InputOutcome {
        let group = input::classify(input_type);
        let event = match group {
            InputTypeGroup::Insert if input::is_paste(input_type) => Some(EngineEvent::Paste {
                page: page.uid.clone(),
                payload: data.unwrap_or_default(),
            }),
            InputTypeGroup::Unknown => {
                debug!("Unclassified input type {}", input_type);
                None
            }
            _ => None,
        };
        InputOutcome { group, event }
    }

    /// Record changed blocks of a page, given by 0-based index
    pub fn note_change(
        &mut self,
        page: &Page,
        blocks: impl IntoIterator<Item = usize>,
        now: f64,
    ) -> Vec<EngineEvent> {
        let uids = blocks
            .into_iter()
            .filter_map(|i| page.blocks().get(i))
            .map(|b| b.uid.clone())
            .collect();
        self.debouncer.push(&page.uid, uids, now).into_iter().map(EngineEvent::Change).collect()
    }

    /// Release pending changes whose deadline has passed
    pub fn tick(&mut self, now: f64) -> Vec<EngineEvent> {
        self.debouncer.poll(now).into_iter().map(EngineEvent::Change).collect()
    }

    /// Release pending changes now
    pub fn flush(&mut self) -> Vec<EngineEvent> {
        self.debouncer.flush().into_iter().map(EngineEvent::Change).collect()
    }

    pub fn forget_page(&mut self, page: &str) {
        self.debouncer.forget(page);
    }
}

/// Indices of the page's blocks touched by a batch of records
///
/// Each target is walked up to the nearest block element, stopping at the
/// page wrapper. Targets that were detached in the meantime are ignored.
pub fn classify_mutations<S: VisualSurface>(
    page: &Page,
    surface: &S,
    config: &DeskConfig,
    records: &[MutationRecord],
) -> BTreeSet<usize> {
    let mut changed = BTreeSet::new();
    let mut visit = |node: NodeId| {
        if surface.parent(node).is_none() {
            return;
        }
        let found = surface.closest(node, |n| {
            surface.has_class(n, &config.block_class) || surface.has_class(n, &config.page_wrapper_class)
        });
        if let Some(block) = found.filter(|n| surface.has_class(*n, &config.block_class)) {
            if let Some(index) = page.block_index_of(surface, block) {
                changed.insert(index);
            }
        }
    };
    for record in records {
        visit(record.target);
        if record.kind == MutationKind::ChildList {
            for added in &record.added {
                visit(*added);
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockData, PageData};
    use crate::surface::{MemoryLayout, MemorySurface};

    fn setup(contents: &[&str]) -> (MemorySurface, Page, DeskConfig) {
        let config = DeskConfig::default();
        let mut s = MemorySurface::new(MemoryLayout::default());
        let data = PageData {
            uid: Some("p1".to_string()),
            blocks: contents.iter().map(|c| BlockData::with_content(*c)).collect(),
        };
        let mut page = Page::new(Some(data), &config);
        let wrapper = page.render(&mut s, &config);
        let body = s.body();
        s.append_child(body, wrapper);
        (s, page, config)
    }

    #[test]
    fn test_shortcut_runs_command_and_prevents_default() {
        let (mut s, mut page, config) = setup(&["a"]);
        let mut engine = Engine::new(&config, RecordingCommands::default());
        let out = engine.on_keydown(&mut page, &mut s, &config, &KeyInput::new("b", "KeyB").with_ctrl(), 0.0);
        assert!(out.prevent_default);
        assert!(out.events.is_empty());
        assert_eq!(engine.commands().calls, vec![("bold".to_string(), None)]);
    }

    #[test]
    fn test_save_shortcut_emits_save() {
        let (mut s, mut page, config) = setup(&["a"]);
        let mut engine = Engine::new(&config, RecordingCommands::default());
        let out = engine.on_keydown(&mut page, &mut s, &config, &KeyInput::new("s", "KeyS").with_meta(), 0.0);
        assert_eq!(out.events, vec![EngineEvent::Save]);
        assert!(engine.commands().calls.is_empty());
    }

    #[test]
    fn test_missing_key_name_notices_once() {
        let (mut s, mut page, config) = setup(&["a"]);
        let mut engine = Engine::new(&config, RecordingCommands::default());
        let nameless = KeyInput {
            key: None,
            code: "KeyB".to_string(),
            ctrl: true,
            ..KeyInput::default()
        };
        let first = engine.on_keydown(&mut page, &mut s, &config, &nameless, 0.0);
        assert!(first.notice.is_some());
        assert!(!first.prevent_default);

        let second = engine.on_keydown(&mut page, &mut s, &config, &KeyInput::new("b", "KeyB").with_ctrl(), 0.0);
        assert_eq!(second, KeyOutcome::default());
        assert!(engine.commands().calls.is_empty());
    }

    #[test]
    fn test_enter_adds_block_after_caret() {
        let (mut s, mut page, config) = setup(&["a", "b"]);
        let mut engine = Engine::new(&config, RecordingCommands::default());
        let first = page.blocks()[0].elem().unwrap();
        let text = s.text_nodes(first)[0];
        s.place_caret(text, 1);

        let out = engine.on_keydown(&mut page, &mut s, &config, &KeyInput::new("Enter", "Enter"), 0.0);
        assert!(out.prevent_default);
        assert_eq!(page.block_count(), 3);
        assert_eq!(page.current(), 1);
        assert_eq!(page.blocks()[2].content(), "b");
    }

    #[test]
    fn test_backspace_on_single_empty_block_requests_delete() {
        let (mut s, mut page, config) = setup(&[""]);
        let mut engine = Engine::new(&config, RecordingCommands::default());
        let out = engine.on_keydown(&mut page, &mut s, &config, &KeyInput::new("Backspace", "Backspace"), 0.0);
        assert!(out.prevent_default);
        assert_eq!(out.events, vec![EngineEvent::Delete { page: "p1".to_string() }]);

        let (mut s, mut page, _) = setup(&["text"]);
        let out = engine.on_keydown(&mut page, &mut s, &config, &KeyInput::new("Backspace", "Backspace"), 0.0);
        assert_eq!(out, KeyOutcome::default());
    }

    #[test]
    fn test_classification_finds_blocks_and_skips_detached() {
        let (mut s, page, config) = setup(&["a", "b", "c"]);
        let second = page.blocks()[1].elem().unwrap();
        let third = page.blocks()[2].elem().unwrap();
        let t2 = s.text_nodes(second)[0];
        let t3 = s.text_nodes(third)[0];
        let stray = s.create_text("gone");

        let wrapper = page.wrapper().unwrap();
        let records = vec![
            MutationRecord::character_data(t2, "b"),
            MutationRecord::character_data(t3, "c"),
            MutationRecord::character_data(stray, ""),
            MutationRecord::child_list(wrapper, Vec::new(), Vec::new()),
        ];
        let changed = classify_mutations(&page, &s, &config, &records);
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_mutations_debounce_into_one_change() {
        let (mut s, mut page, config) = setup(&["a", "b", "c", "d"]);
        let mut engine = Engine::new(&config, RecordingCommands::default());
        let texts: Vec<_> = page
            .blocks()
            .iter()
            .map(|b| s.text_nodes(b.elem().unwrap())[0])
            .collect();

        s.user_insert_text(texts[1], 1, "x");
        s.user_insert_text(texts[2], 1, "x");
        let records = s.take_records();
        assert!(engine.handle_mutation(&mut page, &mut s, &config, &records, 0.0).is_empty());

        s.user_insert_text(texts[2], 1, "y");
        s.user_insert_text(texts[3], 1, "y");
        let records = s.take_records();
        assert!(engine.handle_mutation(&mut page, &mut s, &config, &records, 200.0).is_empty());

        assert!(engine.tick(600.0).is_empty());
        let events = engine.tick(700.0);
        assert_eq!(events.len(), 1);
        match &events[0] {
            EngineEvent::Change(change) => {
                assert_eq!(change.page, "p1");
                let expected: BTreeSet<String> = page.blocks()[1..].iter().map(|b| b.uid.clone()).collect();
                assert_eq!(change.blocks, expected);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(page.blocks()[2].content(), "cyx");
        assert!(engine.tick(5000.0).is_empty());
    }

    #[test]
    fn test_before_input_reports_paste_and_group() {
        let (_, page, config) = setup(&["a"]);
        let engine = Engine::new(&config, RecordingCommands::default());
        let outcome = engine.before_input(&page, "insertFromPaste", Some("clip".to_string()));
        assert_eq!(outcome.group, InputTypeGroup::Insert);
        assert_eq!(
            outcome.event,
            Some(EngineEvent::Paste {
                page: "p1".to_string(),
                payload: "clip".to_string()
            })
        );

        let typed = engine.before_input(&page, "insertText", Some("x".to_string()));
        assert_eq!(typed, InputOutcome { group: InputTypeGroup::Insert, event: None });
        assert_eq!(engine.before_input(&page, "deleteByCut", None).group, InputTypeGroup::DeleteSelection);
        assert_eq!(engine.before_input(&page, "historyUndo", None).event, None);
    }
}
