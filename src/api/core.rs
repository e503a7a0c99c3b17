//! JavaScript-facing editor
//!
//! `DeskEditor` mounts a [`Desk`] into the holder element, listens for
//! keystrokes and `beforeinput` on it, observes its mutations and runs the
//! change debounce on a `setTimeout` timer. Host callbacks are queued while
//! the desk is busy and invoked afterwards, so they may call back into the
//! editor.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{InputEvent, KeyboardEvent, MutationObserver, MutationObserverInit};

use super::commands::ExecCommand;
use super::dom::DomSurface;
use log::{info, warn};

use super::helpers::{deserialize, js_error, page_index, serialize};
use crate::desk::{Desk, DeskError};
use crate::engine::{compile, InputTypeGroup, KeyInput};
use crate::models::{Action, ChangeEvent, DeskConfig, PageData, Shortcut};
use crate::renderers::{render_html, TextRun};

type DomDesk = Desk<DomSurface, ExecCommand>;

/// Host notifications produced while the desk was borrowed
enum Outgoing {
    Change(ChangeEvent),
    Paste { page: String, payload: String },
    Notice(String),
}

struct Shared {
    desk: RefCell<DomDesk>,
    outbox: Rc<RefCell<Vec<Outgoing>>>,
    on_change: RefCell<Option<js_sys::Function>>,
    on_paste: RefCell<Option<js_sys::Function>>,
    timer: Cell<Option<i32>>,
    tick: RefCell<Option<Closure<dyn FnMut()>>>,
    observer: RefCell<Option<MutationObserver>>,
}

fn now() -> f64 {
    js_sys::Date::now()
}

impl Shared {
    /// Deliver queued notifications to the host
    fn dispatch(&self) {
        let pending: Vec<Outgoing> = self.outbox.borrow_mut().drain(..).collect();
        for outgoing in pending {
            let result = match outgoing {
                Outgoing::Change(event) => {
                    let callback = self.on_change.borrow().clone();
                    match callback {
                        Some(callback) => serialize(&event, "Change event")
                            .and_then(|value| callback.call1(&JsValue::NULL, &value))
                            .map(|_| ()),
                        None => Ok(()),
                    }
                }
                Outgoing::Paste { page, payload } => {
                    let callback = self.on_paste.borrow().clone();
                    match callback {
                        Some(callback) => callback
                            .call2(&JsValue::NULL, &JsValue::from_str(&page), &JsValue::from_str(&payload))
                            .map(|_| ()),
                        None => Ok(()),
                    }
                }
                Outgoing::Notice(text) => match web_sys::window() {
                    Some(window) => window.alert_with_message(&text),
                    None => Ok(()),
                },
            };
            if let Err(e) = result {
                warn!("Host callback failed: {:?}", e);
            }
        }
    }

    /// Drop the records our own edits produced
    fn discard_own_mutations(&self) {
        if let Some(observer) = self.observer.borrow().as_ref() {
            observer.take_records();
        }
    }

    /// Re-arm the debounce timer for the desk's next deadline
    fn reschedule(&self) {
        let Some(window) = web_sys::window() else { return };
        if let Some(handle) = self.timer.take() {
            window.clear_timeout_with_handle(handle);
        }
        let Some(deadline) = self.desk.borrow().next_deadline() else {
            return;
        };
        let delay = (deadline - now()).max(0.0).ceil() as i32;
        if let Some(tick) = self.tick.borrow().as_ref() {
            match window.set_timeout_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), delay) {
                Ok(handle) => self.timer.set(Some(handle)),
                Err(e) => warn!("Cannot schedule change notification: {:?}", e),
            }
        }
    }

    /// Returns true when the browser's default action must be suppressed
    fn keydown(&self, event: &KeyboardEvent) -> bool {
        let outcome = self.desk.borrow_mut().keydown(&key_input(event), now());
        if let Some(notice) = outcome.notice {
            self.outbox.borrow_mut().push(Outgoing::Notice(notice));
        }
        outcome.prevent_default
    }

    fn before_input(&self, input_type: &str, data: Option<String>) -> InputTypeGroup {
        let mut desk = self.desk.borrow_mut();
        let page = desk.on_page();
        desk.before_input(page, input_type, data)
    }

    fn mutations(&self, records: &js_sys::Array) {
        let mut desk = self.desk.borrow_mut();
        let records = desk.surface().convert_records(records);
        desk.mutations(records, now());
    }

    /// Common tail of every entry point
    fn settle(&self) {
        self.discard_own_mutations();
        self.reschedule();
        self.dispatch();
    }
}

fn key_input(event: &KeyboardEvent) -> KeyInput {
    // some hosts leave `key` undefined
    let key = js_sys::Reflect::get(event.as_ref(), &JsValue::from_str("key"))
        .ok()
        .and_then(|v| v.as_string());
    KeyInput {
        key,
        code: event.code(),
        ctrl: event.ctrl_key(),
        meta: event.meta_key(),
        shift: event.shift_key(),
        alt: event.alt_key(),
    }
}

#[wasm_bindgen]
pub struct DeskEditor {
    shared: Rc<Shared>,
    _keydown: Closure<dyn FnMut(KeyboardEvent)>,
    _before_input: Closure<dyn FnMut(InputEvent)>,
    _mutations: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

#[wasm_bindgen]
impl DeskEditor {
    /// Mount the editor. `config` uses the same camelCase keys as the YAML/JSON
    /// configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<DeskEditor, JsValue> {
        let config: DeskConfig = if config.is_undefined() || config.is_null() {
            DeskConfig::default()
        } else {
            deserialize(config, "Invalid editor configuration")?
        };
        info!("Mounting editor into #{}", config.holder);

        let surface = DomSurface::new()?;
        let commands = ExecCommand::new(surface.document())?;
        let holder_id = config.holder.clone();
        let mut desk = Desk::new(surface, config, commands).map_err(js_error)?;

        let outbox = Rc::new(RefCell::new(Vec::new()));
        let sink = outbox.clone();
        desk.set_on_change(Box::new(move |event| sink.borrow_mut().push(Outgoing::Change(event))));
        let sink = outbox.clone();
        desk.set_on_paste(Box::new(move |page, payload| {
            sink.borrow_mut().push(Outgoing::Paste {
                page: page.to_string(),
                payload: payload.to_string(),
            })
        }));

        let holder = desk
            .surface()
            .document()
            .get_element_by_id(&holder_id)
            .ok_or_else(|| js_error(DeskError::MissingHolder(holder_id.clone())))?;

        let shared = Rc::new(Shared {
            desk: RefCell::new(desk),
            outbox,
            on_change: RefCell::new(None),
            on_paste: RefCell::new(None),
            timer: Cell::new(None),
            tick: RefCell::new(None),
            observer: RefCell::new(None),
        });

        let weak = Rc::downgrade(&shared);
        *shared.tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            with_shared(&weak, |shared| {
                shared.timer.set(None);
                shared.desk.borrow_mut().tick(now());
            })
        }) as Box<dyn FnMut()>));

        let weak = Rc::downgrade(&shared);
        let keydown = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            with_shared(&weak, |shared| {
                if shared.keydown(&event) {
                    event.prevent_default();
                }
            })
        }) as Box<dyn FnMut(KeyboardEvent)>);

        let weak = Rc::downgrade(&shared);
        let before_input = Closure::wrap(Box::new(move |event: InputEvent| {
            with_shared(&weak, |shared| {
                shared.before_input(&event.input_type(), event.data());
            })
        }) as Box<dyn FnMut(InputEvent)>);

        let weak = Rc::downgrade(&shared);
        let mutations = Closure::wrap(Box::new(move |records: js_sys::Array, _observer: MutationObserver| {
            with_shared(&weak, |shared| shared.mutations(&records))
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        holder.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
        holder.add_event_listener_with_callback("beforeinput", before_input.as_ref().unchecked_ref())?;

        let observer = MutationObserver::new(mutations.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_character_data(true);
        options.set_character_data_old_value(true);
        options.set_subtree(true);
        observer.observe_with_options(&holder, &options)?;
        *shared.observer.borrow_mut() = Some(observer);

        Ok(DeskEditor {
            shared,
            _keydown: keydown,
            _before_input: before_input,
            _mutations: mutations,
        })
    }

    /// Handle a keystroke the host intercepted itself. Returns true when the
    /// default action must be suppressed.
    pub fn keydown(&self, event: KeyboardEvent) -> bool {
        let prevent = self.shared.keydown(&event);
        self.shared.settle();
        prevent
    }

    /// Handle mutation records the host observed itself
    pub fn mutations(&self, records: js_sys::Array) {
        self.shared.mutations(&records);
        self.shared.settle();
    }

    /// Handle a `beforeinput` the host observed itself. Returns the input's
    /// group: "insert", "delete", "deleteSelection", "replace", "format" or
    /// "unknown".
    #[wasm_bindgen(js_name = beforeInput)]
    pub fn before_input(&self, input_type: &str, data: Option<String>) -> Result<JsValue, JsValue> {
        let group = self.shared.before_input(input_type, data);
        self.shared.settle();
        serialize(&group, "Input group")
    }

    /// Shortcut bound to a chord, or `null`
    #[wasm_bindgen(js_name = matchShortcut)]
    pub fn match_shortcut(&self, code: &str, ctrl: bool, meta: bool, shift: bool, alt: bool) -> Result<JsValue, JsValue> {
        let input = KeyInput {
            key: None,
            code: code.to_string(),
            ctrl,
            meta,
            shift,
            alt,
        };
        let desk = self.shared.desk.borrow();
        serialize(&desk.engine().match_shortcut(&input), "Shortcut")
    }

    /// Register the change callback: `(event) => void`
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        *self.shared.on_change.borrow_mut() = Some(callback);
    }

    /// Register the paste callback: `(pageUid, payload) => void`
    #[wasm_bindgen(js_name = onPaste)]
    pub fn on_paste(&self, callback: js_sys::Function) {
        *self.shared.on_paste.borrow_mut() = Some(callback);
    }

    /// Snapshot of one page (1-based) or of the whole document
    pub fn save(&self, page: Option<usize>) -> Result<JsValue, JsValue> {
        let snapshot = self.shared.desk.borrow_mut().save(page);
        serialize(&snapshot, "Snapshot")
    }

    /// Append a page and move the caret onto it; returns its number
    #[wasm_bindgen(js_name = newPage)]
    pub fn new_page(&self) -> usize {
        let index = self.shared.desk.borrow_mut().new_page();
        self.shared.settle();
        index + 1
    }

    /// Insert a page before the given 1-based position
    #[wasm_bindgen(js_name = insertPageAt)]
    pub fn insert_page_at(&self, number: usize, data: JsValue) -> Result<usize, JsValue> {
        let data: Option<PageData> = if data.is_undefined() || data.is_null() {
            None
        } else {
            Some(deserialize(data, "Invalid page data")?)
        };
        let count = self.shared.desk.borrow().page_count();
        let at = page_index(number, count + 1)?;
        let index = self.shared.desk.borrow_mut().insert_page_at(at, data);
        self.shared.settle();
        index
            .map(|i| i + 1)
            .ok_or_else(|| js_error(format!("Cannot insert page {}", number)))
    }

    /// 1-based number of the page with this uid
    #[wasm_bindgen(js_name = findPageIndexByUid)]
    pub fn find_page_index_by_uid(&self, uid: &str) -> Option<usize> {
        self.shared.desk.borrow().find_page_index_by_uid(uid).map(|i| i + 1)
    }

    #[wasm_bindgen(js_name = pageCount)]
    pub fn page_count(&self) -> usize {
        self.shared.desk.borrow().page_count()
    }

    #[wasm_bindgen(js_name = wordCount)]
    pub fn word_count(&self) -> usize {
        self.shared.desk.borrow_mut().word_count()
    }

    #[wasm_bindgen(js_name = sessionKey)]
    pub fn session_key(&self) -> String {
        self.shared.desk.borrow().session_key().to_string()
    }

    /// Run an action by name, e.g. `"makeBold"`
    #[wasm_bindgen(js_name = executeAction)]
    pub fn execute_action(&self, action: JsValue, value: Option<String>) -> Result<(), JsValue> {
        let action: Action = deserialize(action, "Unknown action")?;
        self.shared.desk.borrow_mut().execute_action(action, value.as_deref());
        self.shared.settle();
        Ok(())
    }

    /// Deliver pending change notifications now
    pub fn flush(&self) {
        self.shared.desk.borrow_mut().flush();
        self.shared.settle();
    }

    /// Move the caret onto a page (1-based)
    #[wasm_bindgen(js_name = focusPage)]
    pub fn focus_page(&self, number: usize) -> Result<(), JsValue> {
        let count = self.shared.desk.borrow().page_count();
        let index = page_index(number, count)?;
        self.shared.desk.borrow_mut().focus_page(index);
        Ok(())
    }

    /// Stop observing and detach the listeners
    pub fn destroy(&self) {
        if let Some(observer) = self.shared.observer.borrow_mut().take() {
            observer.disconnect();
        }
        if let (Some(window), Some(handle)) = (web_sys::window(), self.shared.timer.take()) {
            window.clear_timeout_with_handle(handle);
        }
        let desk = self.shared.desk.borrow();
        if let Some(holder) = desk.surface().document().get_element_by_id(&desk.config().holder) {
            let _ = holder.remove_event_listener_with_callback("keydown", self._keydown.as_ref().unchecked_ref());
            let _ = holder
                .remove_event_listener_with_callback("beforeinput", self._before_input.as_ref().unchecked_ref());
        }
        info!("Editor destroyed");
    }
}

/// Run `f` on the live editor state, then settle
fn with_shared(weak: &Weak<Shared>, f: impl FnOnce(&Shared)) {
    let Some(shared) = weak.upgrade() else { return };
    if shared.desk.try_borrow_mut().is_err() {
        warn!("Editor busy; event dropped");
        return;
    }
    f(&shared);
    shared.settle();
}

/// Render text runs to HTML
#[wasm_bindgen(js_name = renderAttributes)]
pub fn render_attributes(runs: JsValue) -> Result<String, JsValue> {
    let runs: Vec<TextRun> = deserialize(runs, "Invalid text runs")?;
    render_html(&runs).map_err(js_error)
}

/// Sort and deduplicate a shortcut table's modifier sets
#[wasm_bindgen(js_name = compileShortcuts)]
pub fn compile_shortcuts(table: JsValue) -> Result<JsValue, JsValue> {
    let table: Vec<Shortcut> = deserialize(table, "Invalid shortcut table")?;
    let compiled = compile(table);
    serialize(&compiled.entries(), "Shortcut table")
}

/// Key input as the engine sees it, for host-side debugging
#[wasm_bindgen(js_name = describeKey)]
pub fn describe_key(event: KeyboardEvent) -> Result<JsValue, JsValue> {
    serialize(&key_input(&event), "Key input")
}
