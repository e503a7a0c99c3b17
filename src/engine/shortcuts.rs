//! Shortcut compilation and matching
//!
//! A table is compiled once: every modifier set is sorted and deduplicated.
//! Matching a keystroke then only compares lengths, the key code and the
//! modifiers element by element. The first full match in table order wins,
//! so when two entries bind the same chord the earlier one is used.

use serde::{Deserialize, Serialize};

use crate::models::{Shortcut, SpecialKey};

/// What the engine needs to know about one keystroke
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyInput {
    /// Key name (`"Enter"`, `"b"`). Hosts that cannot report it send `None`.
    pub key: Option<String>,
    /// Physical key code (`"KeyB"`, `"Tab"`)
    pub code: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyInput {
    pub fn new(key: &str, code: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            code: code.to_string(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn key_is(&self, name: &str) -> bool {
        self.key.as_deref() == Some(name)
    }

    fn any_modifier(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// Active modifiers in canonical order. Control and Meta count as one.
pub fn active_modifiers(input: &KeyInput) -> Vec<SpecialKey> {
    let mut active = Vec::with_capacity(3);
    if input.ctrl || input.meta {
        active.push(SpecialKey::ControlMeta);
    }
    if input.alt {
        active.push(SpecialKey::Alt);
    }
    if input.shift {
        active.push(SpecialKey::Shift);
    }
    active
}

/// A shortcut table whose modifier sets are sorted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortcutTable {
    entries: Vec<Shortcut>,
}

/// Sort and deduplicate every entry's modifier set
pub fn compile(table: Vec<Shortcut>) -> ShortcutTable {
    let entries = table
        .into_iter()
        .map(|mut entry| {
            entry.shortcut.special.sort();
            entry.shortcut.special.dedup();
            entry
        })
        .collect();
    ShortcutTable { entries }
}

impl ShortcutTable {
    pub fn entries(&self) -> &[Shortcut] {
        &self.entries
    }

    /// First entry matching the keystroke. Without a held modifier only Tab
    /// can match.
    pub fn find(&self, input: &KeyInput) -> Option<&Shortcut> {
        if !input.any_modifier() && input.code != "Tab" {
            return None;
        }
        let active = active_modifiers(input);
        self.entries.iter().find(|entry| {
            let chord = &entry.shortcut;
            chord.special.len() == active.len()
                && chord.standard == input.code
                && chord.special.iter().zip(&active).all(|(a, b)| a == b)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_shortcuts, Action};

    #[test]
    fn test_ctrl_b_is_bold() {
        let table = compile(default_shortcuts());
        let hit = table.find(&KeyInput::new("b", "KeyB").with_ctrl()).unwrap();
        assert_eq!(hit.name, "Bold");
        assert_eq!(hit.action, Action::MakeBold);
        // meta is the same class as ctrl
        let hit = table.find(&KeyInput::new("b", "KeyB").with_meta()).unwrap();
        assert_eq!(hit.name, "Bold");
    }

    #[test]
    fn test_no_modifier_short_circuits() {
        let table = compile(default_shortcuts());
        assert!(table.find(&KeyInput::new("b", "KeyB")).is_none());
        assert_eq!(table.find(&KeyInput::new("Tab", "Tab")).unwrap().action, Action::Indent);
        assert_eq!(
            table.find(&KeyInput::new("Tab", "Tab").with_shift()).unwrap().action,
            Action::Unindent
        );
    }

    #[test]
    fn test_modifier_order_in_table_does_not_matter() {
        let table = compile(default_shortcuts());
        // declared as [Shift, ControlMeta]
        let hit = table.find(&KeyInput::new("X", "KeyX").with_shift().with_ctrl()).unwrap();
        assert_eq!(hit.action, Action::MakeStrikethrough);
        assert_eq!(hit.shortcut.special, vec![SpecialKey::ControlMeta, SpecialKey::Shift]);
    }

    #[test]
    fn test_extra_modifier_does_not_match() {
        let table = compile(default_shortcuts());
        assert!(table.find(&KeyInput::new("b", "KeyB").with_ctrl().with_alt()).is_none());
        assert_eq!(
            table.find(&KeyInput::new("Z", "KeyZ").with_ctrl().with_shift()).unwrap().action,
            Action::Redo
        );
    }

    #[test]
    fn test_first_duplicate_wins_and_is_stable() {
        let table = compile(vec![
            Shortcut::new("First", "", &[SpecialKey::Alt, SpecialKey::Alt], "KeyQ", Action::MakeBold),
            Shortcut::new("Second", "", &[SpecialKey::Alt], "KeyQ", Action::MakeItalic),
        ]);
        let input = KeyInput::new("q", "KeyQ").with_alt();
        for _ in 0..3 {
            assert_eq!(table.find(&input).unwrap().name, "First");
        }
    }
}
