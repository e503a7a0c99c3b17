//! Events passed from the engine to the desk

use serde::Serialize;

use super::debounce::PageChange;
use crate::models::BlockData;

/// Pages are named by uid so that events stay valid while pages come and go
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Tail content that no longer fits on `page`, in order
    Overflow { page: String, blocks: Vec<BlockData> },
    /// Backspace on a page holding a single empty block
    Delete { page: String },
    /// Changed blocks of one page (0-based indices)
    Change(PageChange),
    /// Clipboard content about to be pasted
    Paste { page: String, payload: String },
    /// Explicit save request
    Save,
}

impl EngineEvent {
    pub fn page(&self) -> Option<&str> {
        match self {
            EngineEvent::Overflow { page, .. } | EngineEvent::Delete { page } | EngineEvent::Paste { page, .. } => {
                Some(page)
            }
            EngineEvent::Change(change) => Some(&change.page),
            EngineEvent::Save => None,
        }
    }
}
