//! Structured mutation records
//!
//! Mirrors what a live mutation observer reports, reduced to the fields the
//! engine consumes. A batch of these is all the engine needs to classify an
//! edit, regardless of whether it came from a browser observer or a fixture.

use super::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    /// Text data of a text node changed
    CharacterData,
    /// Children were added to or removed from the target
    ChildList,
    /// An attribute on the target changed
    Attributes,
}

impl MutationKind {
    /// Parse the observer's `type` string
    pub fn from_observer_type(kind: &str) -> Option<Self> {
        match kind {
            "characterData" => Some(MutationKind::CharacterData),
            "childList" => Some(MutationKind::ChildList),
            "attributes" => Some(MutationKind::Attributes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    /// Previous text data (character data records only)
    pub old_value: Option<String>,
    #[serde(default)]
    pub added: Vec<NodeId>,
    #[serde(default)]
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub fn character_data(target: NodeId, old_value: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            old_value: Some(old_value.into()),
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            old_value: None,
            added,
            removed,
        }
    }

    /// Length in chars of the text before the edit, when known
    pub fn old_len(&self) -> Option<usize> {
        match self.kind {
            MutationKind::CharacterData => self.old_value.as_ref().map(|v| v.chars().count()),
            _ => None,
        }
    }
}
