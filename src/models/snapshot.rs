//! Serialized document shapes
//!
//! `PageData`/`BlockData` are what a page is built from. `DeskSnapshot` is the
//! export format: page numbers and block numbers are 1-based map keys and the
//! block map may be sparse when only part of a page was captured.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Serializable ids of each block type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Paragraph,
    Heading,
    /// Blank line
    Whitespace,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockData {
    /// Stays with the block wherever it moves; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,

    /// HTML content of the block
    #[serde(default)]
    pub content: String,

    /// Heading level, for heading blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,

    /// Anything else the block wants to track
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl BlockData {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Ordered block list
    #[serde(default)]
    pub blocks: Vec<BlockData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub uid: String,
    /// Block number (1-based) to block
    pub blocks: BTreeMap<usize, BlockData>,
}

impl PageSnapshot {
    /// Rebuild construction data; gaps in block numbering close up, order is kept
    pub fn to_page_data(&self) -> PageData {
        PageData {
            uid: Some(self.uid.clone()),
            blocks: self.blocks.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeskSnapshot {
    /// Page number (1-based) to page
    pub pages: BTreeMap<usize, PageSnapshot>,
}

impl DeskSnapshot {
    pub fn to_page_data(&self) -> Vec<PageData> {
        self.pages.values().map(PageSnapshot::to_page_data).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Change notification delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub session_key: String,
    /// Page number (1-based) to changed block numbers (1-based)
    pub changed: BTreeMap<usize, Vec<usize>>,
    pub snapshot: DeskSnapshot,
}
