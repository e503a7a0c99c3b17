//! Editor actions and keyboard shortcut table entries

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Things the editor knows how to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    // Text formatting
    MakeBold,
    MakeItalic,
    MakeUnderline,
    MakeStrikethrough,
    MakeHighlight,
    MakeColor,

    // Font change
    MakeFontName,
    MakeFontSize,

    // Text alignment
    AlignLeft,
    AlignCenter,
    AlignRight,
    AlignJustify,

    // Indentation
    Indent,
    Unindent,

    // Lists
    MakeNumberList,
    MakeBulletList,

    // Styles
    MakeHeading,
    MakeSubscript,
    MakeSuperscript,

    // Editing
    Undo,
    Redo,

    // Clipboard
    PasteWithFormatting,
    PasteWithoutFormatting,

    DoPrint,
    Save,
}

/// Modifier keys a shortcut may require
///
/// Control and Meta are one equivalence class so that the same table works
/// with CTRL on most platforms and CMD on macOS. The numeric representation
/// matches what host tables send over the wire, and the derived ordering is
/// the canonical sort order of compiled modifier sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SpecialKey {
    ControlMeta = 0,
    Alt = 1,
    Shift = 2,
}

/// A key chord: modifier set plus one standard key code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardShortcut {
    pub special: Vec<SpecialKey>,
    /// Physical key code, e.g. `"KeyB"`, `"Tab"`
    pub standard: String,
}

impl KeyboardShortcut {
    pub fn new(special: &[SpecialKey], standard: &str) -> Self {
        Self {
            special: special.to_vec(),
            standard: standard.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub name: String,
    pub label: String,
    pub shortcut: KeyboardShortcut,
    pub action: Action,
}

impl Shortcut {
    pub fn new(name: &str, label: &str, special: &[SpecialKey], standard: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            shortcut: KeyboardShortcut::new(special, standard),
            action,
        }
    }
}

/// The built-in shortcut table
pub fn default_shortcuts() -> Vec<Shortcut> {
    use SpecialKey::*;

    vec![
        Shortcut::new("Bold", "CTRL + B", &[ControlMeta], "KeyB", Action::MakeBold),
        Shortcut::new("Italic", "CTRL + I", &[ControlMeta], "KeyI", Action::MakeItalic),
        Shortcut::new("Underline", "CTRL + U", &[ControlMeta], "KeyU", Action::MakeUnderline),
        Shortcut::new(
            "Strikethrough",
            "CTRL + SHIFT + X",
            &[Shift, ControlMeta],
            "KeyX",
            Action::MakeStrikethrough,
        ),
        Shortcut::new("Align Left", "CTRL + SHIFT + L", &[ControlMeta, Shift], "KeyL", Action::AlignLeft),
        Shortcut::new("Align Center", "CTRL + SHIFT + E", &[ControlMeta, Shift], "KeyE", Action::AlignCenter),
        Shortcut::new("Align Right", "CTRL + SHIFT + R", &[ControlMeta, Shift], "KeyR", Action::AlignRight),
        Shortcut::new("Justify", "CTRL + SHIFT + J", &[ControlMeta, Shift], "KeyJ", Action::AlignJustify),
        Shortcut::new("Indent", "TAB", &[], "Tab", Action::Indent),
        Shortcut::new("Unindent", "SHIFT + TAB", &[Shift], "Tab", Action::Unindent),
        Shortcut::new("Undo", "CTRL + Z", &[ControlMeta], "KeyZ", Action::Undo),
        Shortcut::new("Redo", "CTRL + SHIFT + Z", &[ControlMeta, Shift], "KeyZ", Action::Redo),
        Shortcut::new(
            "Paste Without Formatting",
            "CTRL + SHIFT + V",
            &[ControlMeta, Shift],
            "KeyV",
            Action::PasteWithoutFormatting,
        ),
        Shortcut::new("Print", "CTRL + P", &[ControlMeta], "KeyP", Action::DoPrint),
        Shortcut::new("Save", "CTRL + S", &[ControlMeta], "KeyS", Action::Save),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_string(&Action::MakeBold).unwrap(), r#""makeBold""#);
        let a: Action = serde_json::from_str(r#""pasteWithoutFormatting""#).unwrap();
        assert_eq!(a, Action::PasteWithoutFormatting);
    }

    #[test]
    fn test_special_key_is_numeric_on_the_wire() {
        let s = KeyboardShortcut::new(&[SpecialKey::Shift, SpecialKey::ControlMeta], "KeyX");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"special":[2,0],"standard":"KeyX"}"#);
    }

    #[test]
    fn test_default_table_has_unique_chords() {
        let table = default_shortcuts();
        for (i, a) in table.iter().enumerate() {
            for b in &table[i + 1..] {
                let mut sa = a.shortcut.special.clone();
                let mut sb = b.shortcut.special.clone();
                sa.sort();
                sb.sort();
                assert!(
                    !(sa == sb && a.shortcut.standard == b.shortcut.standard),
                    "{} and {} share a chord",
                    a.name,
                    b.name
                );
            }
        }
    }
}
