//! Models module for the paginated editor
//!
//! This module contains the data models shared by pages, the engine and
//! the host API: blocks, serialized page/snapshot shapes, configuration and
//! the keyboard shortcut vocabulary.

pub mod block;
pub mod config;
pub mod serde_helpers;
pub mod shortcut;
pub mod snapshot;

// Re-export commonly used types
pub use block::Block;
pub use config::{ConfigError, DeskConfig, Margins};
pub use shortcut::{default_shortcuts, Action, KeyboardShortcut, Shortcut, SpecialKey};
pub use snapshot::{BlockData, BlockType, ChangeEvent, DeskSnapshot, PageData, PageSnapshot};
