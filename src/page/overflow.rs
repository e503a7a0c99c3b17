//! Overflow extraction
//!
//! Once the last block reaches the usable bottom, blocks are taken off the
//! end of the page until it fits again. Blocks lying wholly below the usable
//! bottom move as they are. The block straddling the boundary is split at a
//! word boundary: first where its text ended before the edit, when a record of
//! that edit is at hand, otherwise at the longest head found by measuring the
//! page. The tail keeps its formatting by re-rendering the attributes read off
//! its ancestor chain. When no split point can be found the straddling block
//! moves whole. Content is never dropped.

use log::{info, trace, warn};
use serde_json::Map;

use super::{Page, PageState};
use crate::models::{BlockData, DeskConfig};
use crate::renderers::parser::leaves;
use crate::renderers::{parse_attributes, render_html, runs_for_leaves, TextRun};
use crate::surface::{strip_placeholder, MutationKind, MutationRecord, NodeId, SurfaceExt, VisualSurface};

/// Keep the first `index + 1` characters of `text`, returning the rest
pub fn truncate_text(text: &mut String, index: usize) -> String {
    let cut = text
        .char_indices()
        .nth(index + 1)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_off(cut)
}

fn is_break_char(c: char) -> bool {
    c == ' ' || c == '\u{a0}'
}

/// Char index of the nearest space at or before `from`, looking back at most
/// `limit` characters. A space with nothing after it is not a split point.
pub fn find_split_point(text: &str, from: usize, limit: usize) -> Option<usize> {
    let chars: Vec<char> = text.chars().collect();
    let last = chars.len().checked_sub(1)?;
    let hi = from.min(last);
    let lo = hi.saturating_sub(limit);
    (lo..=hi).rev().find(|&i| is_break_char(chars[i]) && i < last)
}

impl Page {
    /// Take the overflowing tail off the page, in order. Leaves the page in
    /// `Breaking` until the caller has relocated the tail and refreshed it.
    pub fn extract_overflow<S: VisualSurface>(
        &mut self,
        surface: &mut S,
        config: &DeskConfig,
        records: &[MutationRecord],
    ) -> Vec<BlockData> {
        let Some(usable) = self.usable_bottom(surface, config) else {
            return Vec::new();
        };
        self.state = PageState::Breaking;

        // collected back to front
        let mut tail = Vec::new();
        let mut record_tried = false;
        while self.is_overflowing(surface, config) {
            let last = self.blocks.len() - 1;
            let Some(elem) = self.blocks[last].elem() else { break };

            if surface.bounds(elem).top < usable {
                let mut point = None;
                if !record_tried {
                    record_tried = true;
                    point = Self::split_target(surface, elem, records).and_then(|(target, old_len)| {
                        let at = find_split_point(&surface.text(target), old_len, config.split_search_limit)?;
                        Some((target, at))
                    });
                }
                let point = point.or_else(|| self.measured_split_point(surface, config, last));
                if let Some(data) = point.and_then(|(target, at)| self.split_block(surface, config, last, target, at)) {
                    tail.push(data);
                    continue;
                }
            }

            if self.blocks.len() == 1 {
                warn!("Page {} overflows with a single unbreakable block; leaving it in place", self.uid);
                break;
            }
            if let Some(mut block) = self.blocks.pop() {
                block.sync_from_surface(surface);
                block.detach(surface);
                trace!("Moving block {} off page {}", block.uid, self.uid);
                tail.push(block.serialize());
            }
        }

        tail.reverse();
        self.current = self.current.min(self.blocks.len() - 1);
        if !tail.is_empty() {
            info!("Page {} overflowed: {} blocks to relocate", self.uid, tail.len());
        }
        tail
    }

    /// Character data record for a text node inside `elem`, with its old length
    fn split_target<S: VisualSurface>(surface: &S, elem: NodeId, records: &[MutationRecord]) -> Option<(NodeId, usize)> {
        records.iter().rev().find_map(|r| {
            if r.kind != MutationKind::CharacterData || !surface.is_text(r.target) {
                return None;
            }
            if !surface.contains(elem, r.target) {
                return None;
            }
            Some((r.target, r.old_len()?))
        })
    }

    /// Longest head of block `index`, cut after a word boundary, with which
    /// the page fits. Found by trimming text leaves from the end and measuring;
    /// the surface is restored before returning.
    fn measured_split_point<S: VisualSurface>(
        &self,
        surface: &mut S,
        config: &DeskConfig,
        index: usize,
    ) -> Option<(NodeId, usize)> {
        let elem = self.blocks.get(index)?.elem()?;
        let texts: Vec<(NodeId, String)> = leaves(surface, elem)
            .into_iter()
            .filter(|leaf| surface.is_text(*leaf))
            .map(|leaf| (leaf, surface.text(leaf)))
            .collect();

        let mut found = None;
        'leaves: for pos in (0..texts.len()).rev() {
            let (leaf, text) = &texts[pos];
            let text_before = texts[..pos]
                .iter()
                .any(|(_, t)| !strip_placeholder(t).trim().is_empty());
            let mut from = text.chars().count();
            while let Some(at) = find_split_point(text, from, config.split_search_limit) {
                let mut head = text.clone();
                truncate_text(&mut head, at);
                if !text_before && strip_placeholder(&head).trim().is_empty() {
                    break;
                }
                surface.set_text(*leaf, &head);
                if !self.is_overflowing(surface, config) {
                    found = Some((*leaf, at));
                    break 'leaves;
                }
                let Some(next) = at.checked_sub(1) else { break };
                from = next;
            }
            surface.set_text(*leaf, "");
        }

        for (leaf, text) in &texts {
            surface.set_text(*leaf, text);
        }
        if let Some((_, at)) = found {
            trace!("Measured split of block {} at char {}", self.blocks[index].uid, at);
        }
        found
    }

    /// Split block `index` after char `at` of its text leaf `target`,
    /// returning the tail as a new block
    fn split_block<S: VisualSurface>(
        &mut self,
        surface: &mut S,
        config: &DeskConfig,
        index: usize,
        target: NodeId,
        at: usize,
    ) -> Option<BlockData> {
        let class = config.block_class.as_str();
        let elem = self.blocks.get(index)?.elem()?;

        let mut head = surface.text(target);
        let rest = strip_placeholder(&truncate_text(&mut head, at));
        if rest.is_empty() {
            return None;
        }

        let all = leaves(surface, elem);
        let pos = all.iter().position(|l| *l == target)?;
        let following = all[pos + 1..].to_vec();

        let mut runs = vec![TextRun {
            text: rest,
            attributes: parse_attributes(surface, target, class),
        }];
        runs.extend(runs_for_leaves(surface, &following, class));
        let content = match render_html(&runs) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not rebuild split tail on page {}: {}", self.uid, e);
                return None;
            }
        };

        for leaf in following {
            surface.remove(leaf);
        }
        surface.set_text(target, &head);
        surface.prune_empty(elem);

        let block = &mut self.blocks[index];
        block.sync_from_surface(surface);
        trace!("Split block {} at char {}", block.uid, at);
        Some(BlockData {
            uid: None,
            block_type: block.block_type,
            content,
            level: block.level,
            data: Map::new(),
        })
    }
}
