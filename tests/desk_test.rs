// End-to-end behaviour of the desk on the in-memory surface

use std::cell::RefCell;
use std::rc::Rc;

use desk_editor_wasm::engine::{InputTypeGroup, RecordingCommands};
use desk_editor_wasm::models::{BlockData, ChangeEvent, DeskConfig, PageData};
use desk_editor_wasm::surface::{MemoryLayout, MemorySurface, NodeId, VisualSurface};
use desk_editor_wasm::{Desk, KeyInput};

type TestDesk = Desk<MemorySurface, RecordingCommands>;

fn surface() -> MemorySurface {
    let mut s = MemorySurface::new(MemoryLayout::default());
    let holder = s.create_element("div");
    s.set_attribute(holder, "id", "desk-editor");
    let body = s.body();
    s.append_child(body, holder);
    s
}

/// Pages with room for exactly two single-line blocks
fn config(pages: Vec<PageData>) -> DeskConfig {
    DeskConfig {
        height: "80px".to_string(),
        pages,
        ..DeskConfig::default()
    }
}

fn page(contents: &[&str]) -> PageData {
    PageData {
        uid: None,
        blocks: contents.iter().map(|c| BlockData::with_content(*c)).collect(),
    }
}

fn desk(pages: Vec<PageData>) -> TestDesk {
    Desk::new(surface(), config(pages), RecordingCommands::default()).expect("desk should mount")
}

fn contents(desk: &TestDesk, index: usize) -> Vec<String> {
    desk.pages()[index]
        .blocks()
        .iter()
        .map(|b| b.content().to_string())
        .collect()
}

fn text_of(desk: &TestDesk, page: usize, block: usize) -> NodeId {
    let elem = desk.pages()[page].blocks()[block].elem().expect("block is rendered");
    desk.surface().children(elem)[0]
}

fn collect_changes(desk: &mut TestDesk) -> Rc<RefCell<Vec<ChangeEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    desk.set_on_change(Box::new(move |event| sink.borrow_mut().push(event)));
    seen
}

#[test]
fn test_typing_past_the_page_splits_onto_a_new_page() {
    let mut desk = desk(vec![page(&["first", "second"])]);
    let changes = collect_changes(&mut desk);

    let text = text_of(&desk, 0, 1);
    let typed = format!("second{}", " word".repeat(12));
    desk.surface_mut().user_set_text(text, &typed);
    desk.surface_mut().place_caret(text, typed.chars().count());
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);

    assert_eq!(desk.page_count(), 2);
    assert_eq!(contents(&desk, 0), vec!["first", "second "]);
    let moved = contents(&desk, 1);
    assert_eq!(moved.len(), 1);
    assert!(moved[0].starts_with("word word"));
    assert!(!moved[0].contains('\u{200B}'));

    // the caret followed the text it was typing
    assert_eq!(desk.on_page(), 1);

    desk.tick(100.0);
    assert!(changes.borrow().is_empty());
    desk.tick(600.0);
    let changed: Vec<usize> = changes
        .borrow()
        .iter()
        .flat_map(|e| e.changed.keys().copied().collect::<Vec<_>>())
        .collect();
    assert!(changed.contains(&1));
    assert!(changed.contains(&2));
}

#[test]
fn test_enter_on_a_full_page_moves_the_new_line() {
    let mut desk = desk(vec![page(&["a", "b"])]);
    desk.focus_block(0, 1);

    let outcome = desk.keydown(&KeyInput::new("Enter", "Enter"), 0.0);
    assert!(outcome.prevent_default);
    assert_eq!(desk.page_count(), 2);
    assert_eq!(contents(&desk, 0), vec!["a", "b"]);
    assert_eq!(desk.pages()[1].block_count(), 1);
    assert_eq!(desk.on_page(), 1);
}

#[test]
fn test_backspace_on_an_empty_page_removes_it() {
    let mut doc = desk(vec![page(&["a"]), page(&[""])]);
    doc.focus_page(1);
    doc.keydown(&KeyInput::new("Backspace", "Backspace"), 0.0);
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.on_page(), 0);

    // the first page stays even when empty
    let mut solo = desk(vec![page(&[""])]);
    solo.keydown(&KeyInput::new("Backspace", "Backspace"), 0.0);
    assert_eq!(solo.page_count(), 1);
}

#[test]
fn test_content_flows_back_when_room_opens() {
    let mut desk = desk(vec![page(&["a"]), page(&["b", "c"])]);
    assert_eq!(desk.page_count(), 2);

    let text = text_of(&desk, 0, 0);
    desk.surface_mut().user_set_text(text, "A");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);

    assert_eq!(contents(&desk, 0), vec!["A", "b"]);
    assert_eq!(contents(&desk, 1), vec!["c"]);
}

#[test]
fn test_pulling_back_a_whole_page_removes_it() {
    let mut desk = desk(vec![page(&["a"]), page(&["b"])]);
    let text = text_of(&desk, 0, 0);
    desk.surface_mut().user_set_text(text, "A");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);

    assert_eq!(desk.page_count(), 1);
    assert_eq!(contents(&desk, 0), vec!["A", "b"]);
}

#[test]
fn test_blank_pages_are_not_pulled_back() {
    let mut desk = desk(vec![page(&["a"]), page(&[""])]);
    let text = text_of(&desk, 0, 0);
    desk.surface_mut().user_set_text(text, "A");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);
    assert_eq!(desk.page_count(), 2);
}

#[test]
fn test_edits_are_coalesced_into_one_notification() {
    let mut desk = desk(vec![page(&["abc"])]);
    let changes = collect_changes(&mut desk);
    let text = text_of(&desk, 0, 0);

    desk.surface_mut().user_insert_text(text, 3, "d");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);
    desk.surface_mut().user_insert_text(text, 4, "e");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 100.0);

    desk.tick(550.0);
    assert!(changes.borrow().is_empty());
    desk.tick(650.0);

    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].changed.get(&1), Some(&vec![1]));
    let block = &changes[0].snapshot.pages[&1].blocks[&1];
    assert_eq!(block.content, "abcde");
}

#[test]
fn test_bold_shortcut_reaches_the_host() {
    let mut desk = desk(vec![page(&["a"])]);
    let outcome = desk.keydown(&KeyInput::new("b", "KeyB").with_ctrl(), 0.0);
    assert!(outcome.prevent_default);
    assert_eq!(desk.engine().commands().calls, vec![("bold".to_string(), None)]);
}

#[test]
fn test_snapshot_round_trip() {
    let mut first = desk(vec![page(&["<b>one</b>", "two"]), page(&["three"])]);
    let snapshot = first.save(None);
    assert_eq!(snapshot.pages.len(), 2);

    let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
    let restored: desk_editor_wasm::DeskSnapshot = serde_json::from_str(&json).expect("snapshot parses");
    let mut second = desk(restored.to_page_data());

    assert_eq!(second.save(None), snapshot);
    assert_eq!(contents(&second, 0), vec!["<b>one</b>", "two"]);
}

#[test]
fn test_paste_is_reported() {
    let mut desk = desk(vec![page(&["a"])]);
    let pasted = Rc::new(RefCell::new(Vec::new()));
    let sink = pasted.clone();
    desk.set_on_paste(Box::new(move |page, payload| {
        sink.borrow_mut().push((page.to_string(), payload.to_string()))
    }));

    assert_eq!(desk.before_input(0, "insertText", Some("x".to_string())), InputTypeGroup::Insert);
    assert_eq!(desk.before_input(0, "insertFromPaste", Some("hello".to_string())), InputTypeGroup::Insert);
    assert_eq!(desk.before_input(3, "insertFromPaste", Some("lost".to_string())), InputTypeGroup::Unknown);

    let pasted = pasted.borrow();
    assert_eq!(pasted.len(), 1);
    assert_eq!(pasted[0].0, desk.pages()[0].uid);
    assert_eq!(pasted[0].1, "hello");
}

fn all_text(desk: &TestDesk) -> String {
    (0..desk.page_count()).flat_map(|i| contents(desk, i)).collect()
}

fn assert_pages_fit(desk: &TestDesk) {
    for (i, page) in desk.pages().iter().enumerate() {
        assert!(
            !page.is_overflowing(desk.surface(), desk.config()),
            "page {} overflows",
            i + 1
        );
    }
}

#[test]
fn test_oversized_block_is_split_across_pages_on_load() {
    let long = "word ".repeat(200);
    let desk = desk(vec![page(&[&long])]);

    assert!(desk.page_count() > 2);
    assert_pages_fit(&desk);
    assert_eq!(all_text(&desk), long);
}

#[test]
fn test_pasted_wall_of_text_flows_over_many_pages() {
    let mut desk = desk(vec![page(&["abc"])]);
    let text = text_of(&desk, 0, 0);
    let pasted = format!("abc{}", " word".repeat(200));
    desk.surface_mut().user_set_text(text, &pasted);
    desk.surface_mut().place_caret(text, pasted.chars().count());
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);

    assert!(desk.page_count() > 2);
    assert_pages_fit(&desk);
    assert_eq!(contents(&desk, 0), vec!["abc "]);
    assert_eq!(all_text(&desk), pasted);
}

#[test]
fn test_backspace_on_a_page_left_with_a_line_break() {
    let mut desk = desk(vec![page(&["a"]), page(&["b"])]);
    let elem = desk.pages()[1].blocks()[0].elem().expect("block is rendered");
    let text = text_of(&desk, 1, 0);

    // what a browser leaves behind after deleting the last character
    desk.surface_mut().user_remove(text);
    let br = desk.surface_mut().create_element("br");
    desk.surface_mut().user_insert(elem, br, None);
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);
    assert_eq!(desk.page_count(), 2);

    desk.focus_page(1);
    desk.keydown(&KeyInput::new("Backspace", "Backspace"), 10.0);
    assert_eq!(desk.page_count(), 1);
    assert_eq!(desk.on_page(), 0);
}

#[test]
fn test_change_survives_removal_of_an_earlier_block() {
    let mut desk = desk(vec![page(&["a", "b"])]);
    let changes = collect_changes(&mut desk);

    let text = text_of(&desk, 0, 1);
    desk.surface_mut().user_set_text(text, "bb");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);

    let first = desk.pages()[0].blocks()[0].elem().expect("block is rendered");
    desk.surface_mut().user_remove(first);
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 10.0);
    assert_eq!(desk.pages()[0].block_count(), 1);

    desk.tick(600.0);
    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].changed.get(&1), Some(&vec![1]));
    assert_eq!(changes[0].snapshot.pages[&1].blocks[&1].content, "bb");
}

#[test]
fn test_pull_back_cascades_down_the_desk() {
    let mut desk = desk(vec![page(&["a"]), page(&["b", "c"]), page(&["d", "e"])]);
    let text = text_of(&desk, 0, 0);
    desk.surface_mut().user_set_text(text, "A");
    let records = desk.surface_mut().take_records();
    desk.mutations(records, 0.0);

    assert_eq!(desk.page_count(), 3);
    assert_eq!(contents(&desk, 0), vec!["A", "b"]);
    assert_eq!(contents(&desk, 1), vec!["c", "d"]);
    assert_eq!(contents(&desk, 2), vec!["e"]);
}
