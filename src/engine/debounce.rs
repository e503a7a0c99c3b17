//! Change debouncing
//!
//! Changed blocks are accumulated per page and released together once a
//! single shared deadline passes. Every new change pushes the deadline out
//! again, so a burst of edits produces one notification per page. Pages and
//! blocks are held by uid: both may move before the notification goes out.

use serde::Serialize;
use std::collections::BTreeSet;

/// Accumulated change of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChange {
    pub page: String,
    /// Block uids
    pub blocks: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeDebouncer {
    /// Milliseconds; `None` releases every change immediately
    interval: Option<u64>,
    deadline: Option<f64>,
    pending: Vec<PageChange>,
}

impl ChangeDebouncer {
    pub fn new(interval: Option<u64>) -> Self {
        Self {
            interval,
            deadline: None,
            pending: Vec::new(),
        }
    }

    pub fn interval(&self) -> Option<u64> {
        self.interval
    }

    /// When the pending changes will be released
    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Record changed blocks of a page at time `now` (ms). Returns what is
    /// released right away, which is nothing unless debouncing is off.
    pub fn push(&mut self, page: &str, blocks: BTreeSet<String>, now: f64) -> Vec<PageChange> {
        if blocks.is_empty() {
            return Vec::new();
        }
        match self.pending.iter_mut().find(|c| c.page == page) {
            Some(change) => change.blocks.extend(blocks),
            None => self.pending.push(PageChange {
                page: page.to_string(),
                blocks,
            }),
        }
        match self.interval {
            Some(ms) => {
                self.deadline = Some(now + ms as f64);
                Vec::new()
            }
            None => self.flush(),
        }
    }

    /// Release everything if the deadline has passed
    pub fn poll(&mut self, now: f64) -> Vec<PageChange> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Release everything now
    pub fn flush(&mut self) -> Vec<PageChange> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    /// Drop whatever is pending for a page that went away
    pub fn forget(&mut self, page: &str) {
        self.pending.retain(|c| c.page != page);
        if self.pending.is_empty() {
            self.deadline = None;
        }
    }
}
