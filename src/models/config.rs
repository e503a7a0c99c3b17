//! Editor configuration
//!
//! Every option has a default, so hosts only pass what they want to change.
//! Field names are camelCase on the wire to match the JavaScript host.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::serde_helpers::{number_or_false, serialize_option_as_null, string_or_false};
use super::shortcut::{default_shortcuts, Shortcut};
use super::snapshot::PageData;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Invalid JSON configuration: {0}")]
    Json(String),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(String),

    #[error("Could not read configuration: {0}")]
    Io(String),

    #[error("Margin '{side}' must be a finite, non-negative number of pixels (got {value})")]
    InvalidMargin { side: &'static str, value: f64 },

    #[error("Marker class '{0}' must not be empty")]
    EmptyClass(&'static str),
}

/// Page margins in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 15.0,
            right: 15.0,
            top: 15.0,
            bottom: 15.0,
        }
    }
}

/// Generate a fresh unique id (v4 UUID)
pub fn default_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_debounce() -> Option<u64> {
    Some(500)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeskConfig {
    /// Id of the element that will hold the editor
    pub holder: String,

    /// Page height as a CSS length
    pub height: String,

    /// Page width as a CSS length
    pub width: String,

    pub margins: Margins,

    /// Vertical gap between pages as a CSS length
    pub spacing: String,

    /// Initial content, one entry per page
    pub pages: Vec<PageData>,

    /// Page focused after load (1-based)
    pub on_page: usize,

    pub base_shortcuts: Vec<Shortcut>,
    pub extra_shortcuts: Vec<Shortcut>,

    pub block_class: String,
    pub page_class: String,
    pub page_wrapper_class: String,

    /// Build a full snapshot for every change notification
    pub save_on_change: bool,

    /// Debounce interval for change notifications; `None` fires immediately
    #[serde(
        deserialize_with = "number_or_false",
        serialize_with = "serialize_option_as_null",
        default = "default_debounce"
    )]
    pub debounce_changes: Option<u64>,

    /// Fixed session key; generated when absent
    #[serde(deserialize_with = "string_or_false", serialize_with = "serialize_option_as_null")]
    pub session_key: Option<String>,

    /// How many characters the overflow split walks back looking for a space
    pub split_search_limit: usize,

    #[serde(skip, default = "default_gen_uid")]
    pub gen_uid: fn() -> String,
}

fn default_gen_uid() -> fn() -> String {
    default_uid
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            holder: "desk-editor".to_string(),
            height: "1056px".to_string(),
            width: "815px".to_string(),
            margins: Margins::default(),
            spacing: "20px".to_string(),
            pages: Vec::new(),
            on_page: 1,
            base_shortcuts: default_shortcuts(),
            extra_shortcuts: Vec::new(),
            block_class: "desk-block".to_string(),
            page_class: "desk-page".to_string(),
            page_wrapper_class: "desk-page-wrapper".to_string(),
            save_on_change: false,
            debounce_changes: default_debounce(),
            session_key: None,
            split_search_limit: 64,
            gen_uid: default_uid,
        }
    }
}

impl DeskConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DeskConfig = serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: DeskConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.margins;
        for (side, value) in [("left", m.left), ("right", m.right), ("top", m.top), ("bottom", m.bottom)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidMargin { side, value });
            }
        }
        for (name, class) in [
            ("blockClass", &self.block_class),
            ("pageClass", &self.page_class),
            ("pageWrapperClass", &self.page_wrapper_class),
        ] {
            if class.trim().is_empty() {
                return Err(ConfigError::EmptyClass(name));
            }
        }
        Ok(())
    }

    /// Base shortcuts followed by the extra ones; table order is the tie-break
    pub fn shortcuts(&self) -> Vec<Shortcut> {
        self.base_shortcuts
            .iter()
            .chain(self.extra_shortcuts.iter())
            .cloned()
            .collect()
    }

    pub fn new_uid(&self) -> String {
        (self.gen_uid)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shortcut::{Action, SpecialKey};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = DeskConfig::default();
        assert_eq!(c.holder, "desk-editor");
        assert_eq!(c.debounce_changes, Some(500));
        assert_eq!(c.margins.bottom, 15.0);
        assert_eq!(c.on_page, 1);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let c = DeskConfig::from_json(r#"{"holder": "mine", "debounceChanges": false}"#).unwrap();
        assert_eq!(c.holder, "mine");
        assert_eq!(c.debounce_changes, None);
        assert_eq!(c.block_class, "desk-block");
        assert!(!c.base_shortcuts.is_empty());
    }

    #[test]
    fn test_negative_margin_rejected() {
        let err = DeskConfig::from_json(r#"{"margins": {"left": 1, "right": 1, "top": 1, "bottom": -3}}"#);
        assert!(matches!(err, Err(ConfigError::InvalidMargin { side: "bottom", .. })));
    }

    #[test]
    fn test_shortcut_merge_order() {
        let mut c = DeskConfig::default();
        c.base_shortcuts = vec![Shortcut::new("A", "", &[SpecialKey::Alt], "KeyA", Action::MakeBold)];
        c.extra_shortcuts = vec![Shortcut::new("B", "", &[SpecialKey::Alt], "KeyA", Action::MakeItalic)];
        let names: Vec<_> = c.shortcuts().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "holder: yaml-holder\nsessionKey: fixed\nsplitSearchLimit: 8").unwrap();
        let c = DeskConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(c.holder, "yaml-holder");
        assert_eq!(c.session_key.as_deref(), Some("fixed"));
        assert_eq!(c.split_search_limit, 8);
    }

    #[test]
    fn test_uid_generator_is_pluggable() {
        fn fixed() -> String {
            "fixed-id".to_string()
        }
        let c = DeskConfig {
            gen_uid: fixed,
            ..DeskConfig::default()
        };
        assert_eq!(c.new_uid(), "fixed-id");
        assert_ne!(DeskConfig::default().new_uid(), DeskConfig::default().new_uid());
    }
}
