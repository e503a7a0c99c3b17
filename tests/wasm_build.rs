//! WASM build test
//!
//! This module tests that the WASM module mounts in a browser and that the
//! JavaScript-facing API works against the live DOM.

#![cfg(target_arch = "wasm32")]

use desk_editor_wasm::api::{compile_shortcuts, render_attributes, DeskEditor, DomSurface};
use desk_editor_wasm::renderers::TextRun;
use desk_editor_wasm::surface::VisualSurface;
use serde::Serialize;
use serde_json::json;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn to_js<T: Serialize>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap()
}

fn mount_holder(id: &str) {
    let document = web_sys::window().unwrap().document().unwrap();
    if document.get_element_by_id(id).is_none() {
        let holder = document.create_element("div").unwrap();
        holder.set_id(id);
        document.body().unwrap().append_child(&holder).unwrap();
    }
}

#[wasm_bindgen_test]
fn test_editor_creation() {
    mount_holder("desk-editor");
    let editor = DeskEditor::new(JsValue::UNDEFINED).unwrap();
    assert_eq!(editor.page_count(), 1);
    editor.destroy();
}

#[wasm_bindgen_test]
fn test_missing_holder_is_an_error() {
    let config = to_js(&json!({ "holder": "nowhere" }));
    assert!(DeskEditor::new(config).is_err());
}

#[wasm_bindgen_test]
fn test_new_page_and_lookup() {
    mount_holder("desk-pages");
    let config = to_js(&json!({ "holder": "desk-pages" }));
    let editor = DeskEditor::new(config).unwrap();
    assert_eq!(editor.new_page(), 2);
    assert_eq!(editor.page_count(), 2);
    assert!(editor.focus_page(3).is_err());
    editor.destroy();
}

#[wasm_bindgen_test]
fn test_render_attributes() {
    let runs = vec![TextRun::with("a", &[("bold", json!(true))])];
    let html = render_attributes(to_js(&runs)).unwrap();
    assert_eq!(html, "<b>a</b>");
}

#[wasm_bindgen_test]
fn test_compile_shortcuts() {
    let table = json!([{
        "name": "Bold",
        "label": "CTRL + B",
        "shortcut": { "special": [2, 0, 2], "standard": "KeyB" },
        "action": "makeBold"
    }]);
    let compiled = compile_shortcuts(to_js(&table));
    assert!(compiled.is_ok());
}

#[wasm_bindgen_test]
fn test_detached_nodes_leave_the_registry() {
    let mut surface = DomSurface::new().unwrap();
    let root = surface.create_element("div");
    let block = surface.create_element("div");
    let text = surface.create_text("hello");
    surface.insert_before(block, text, None);
    surface.insert_before(root, block, None);
    assert_eq!(surface.tracked(), 3);

    surface.remove(block);
    assert_eq!(surface.tracked(), 1);
    assert!(surface.node(text).is_none());

    let other = surface.create_element("p");
    assert_ne!(other, text);
    surface.insert_before(root, other, None);
    surface.set_inner_html(other, "<b>x</b>");
    assert_eq!(surface.children(other).len(), 1);
    surface.set_text(root, "");
    assert_eq!(surface.tracked(), 1);
}
