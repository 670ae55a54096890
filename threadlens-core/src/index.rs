//! Relational lookups over a [`Mapping`].
//!
//! [`build_indices`] is a pure function of the mapping; [`IndexedMapping`]
//! keeps the two together so the indices can never outlive or drift from the
//! data they were built from.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::types::{Edit, Hunk, Mapping, Message};

/// Five lookups derived from a mapping. Values are positions into the
/// mapping's vectors (messages, hunks, edits) or ids, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingIndex {
    pub messages_by_id: HashMap<String, usize>,
    pub hunks_by_id: HashMap<String, usize>,
    pub hunk_ids_by_edit: HashMap<String, Vec<String>>,
    pub edits_by_message: HashMap<String, Vec<usize>>,
    pub messages_by_hunk: HashMap<String, Vec<String>>,
}

/// Builds every index of `mapping`. Duplicate message or hunk ids keep their
/// first occurrence; duplicate links are collapsed.
pub fn build_indices(mapping: &Mapping) -> MappingIndex {
    let mut index = MappingIndex::default();

    for (pos, message) in mapping.messages.iter().enumerate() {
        index.messages_by_id.entry(message.id.clone()).or_insert(pos);
    }
    for (pos, hunk) in mapping.hunks.iter().enumerate() {
        index.hunks_by_id.entry(hunk.id.clone()).or_insert(pos);
    }
    for (pos, edit) in mapping.edits.iter().enumerate() {
        if let Some(message_id) = edit.referenced_message_id() {
            index
                .edits_by_message
                .entry(message_id.to_owned())
                .or_default()
                .push(pos);
        }
    }

    let mut seen_links = HashSet::new();
    let edit_messages: HashMap<&str, &str> = mapping
        .edits
        .iter()
        .filter_map(|e| Some((e.id.as_str(), e.referenced_message_id()?)))
        .collect();

    for link in &mapping.edit_hunks {
        if !seen_links.insert((link.edit_id.as_str(), link.hunk_id.as_str())) {
            continue;
        }
        index
            .hunk_ids_by_edit
            .entry(link.edit_id.clone())
            .or_default()
            .push(link.hunk_id.clone());

        if let Some(message_id) = edit_messages.get(link.edit_id.as_str()) {
            let messages = index.messages_by_hunk.entry(link.hunk_id.clone()).or_default();
            if !messages.iter().any(|m| m == message_id) {
                messages.push((*message_id).to_owned());
            }
        }
    }

    index
}

/// Rendering order for messages.
///
/// Timestamps (ISO-8601) compare lexicographically. A message without a
/// timestamp sorts before every timestamped message; two untimestamped
/// messages compare equal so a stable sort keeps their encounter order.
pub fn compare_messages(a: &Message, b: &Message) -> Ordering {
    match (&a.timestamp, &b.timestamp) {
        (Some(a_ts), Some(b_ts)) => a_ts.cmp(b_ts),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A mapping together with its indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedMapping {
    mapping: Mapping,
    index: MappingIndex,
}

impl IndexedMapping {
    pub fn new(mapping: Mapping) -> Self {
        let index = build_indices(&mapping);
        Self { mapping, index }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn index(&self) -> &MappingIndex {
        &self.index
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.index
            .messages_by_id
            .get(id)
            .map(|&pos| &self.mapping.messages[pos])
    }

    pub fn hunk(&self, id: &str) -> Option<&Hunk> {
        self.index.hunks_by_id.get(id).map(|&pos| &self.mapping.hunks[pos])
    }

    /// Hunks linked to `edit_id`; dangling hunk ids are skipped.
    pub fn hunks_for_edit(&self, edit_id: &str) -> Vec<&Hunk> {
        self.index
            .hunk_ids_by_edit
            .get(edit_id)
            .map(|ids| ids.iter().filter_map(|id| self.hunk(id)).collect())
            .unwrap_or_default()
    }

    pub fn edits_for_message(&self, message_id: &str) -> Vec<&Edit> {
        self.index
            .edits_by_message
            .get(message_id)
            .map(|positions| positions.iter().map(|&pos| &self.mapping.edits[pos]).collect())
            .unwrap_or_default()
    }

    /// Messages whose edits produced `hunk_id`, in link order. Edits that
    /// reference unknown messages are skipped.
    pub fn messages_for_hunk(&self, hunk_id: &str) -> Vec<&Message> {
        self.index
            .messages_by_hunk
            .get(hunk_id)
            .map(|ids| ids.iter().filter_map(|id| self.message(id)).collect())
            .unwrap_or_default()
    }

    /// Messages in rendering order (see [`compare_messages`]).
    pub fn ordered_messages(&self) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self.mapping.messages.iter().collect();
        messages.sort_by(|a, b| compare_messages(a, b));
        messages
    }
}
