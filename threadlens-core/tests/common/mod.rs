//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::io::Write;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;

use threadlens_core::document::{NodeId, Size};
use threadlens_core::memdoc::MemoryDocument;
use threadlens_core::types::{ConversationIdentity, Edit, EditHunkLink, Hunk, Mapping, Message};

pub fn identity() -> ConversationIdentity {
    ConversationIdentity::new("acme", "widgets", "42")
}

pub fn message(id: &str, timestamp: Option<&str>) -> Message {
    Message {
        id: id.to_owned(),
        role: "assistant".to_owned(),
        content: format!("message {id}"),
        timestamp: timestamp.map(str::to_owned),
        parent_id: None,
        tool: None,
    }
}

pub fn edit(id: &str, message_id: &str, file_path: &str, start_line: Option<u32>) -> Edit {
    Edit {
        id: id.to_owned(),
        file_path: file_path.to_owned(),
        start_line,
        end_line: start_line.map(|l| l + 2),
        message_id: Some(message_id.to_owned()),
        user_message_id: None,
        confidence: "exact".to_owned(),
        tool: None,
    }
}

pub fn hunk(id: &str, file_path: &str, new_start: u32) -> Hunk {
    Hunk {
        id: id.to_owned(),
        file_path: file_path.to_owned(),
        old_start: new_start,
        old_lines: 3,
        new_start,
        new_lines: 4,
    }
}

pub fn link(edit_id: &str, hunk_id: &str) -> EditHunkLink {
    EditHunkLink {
        edit_id: edit_id.to_owned(),
        hunk_id: hunk_id.to_owned(),
    }
}

/// Three messages, three edits, two hunks:
/// - `e1` (from `m1`) has no linked hunk and points at `src/lib.rs:10`
/// - `e2` (from `m2`) is linked to `h1` (`src/lib.rs:12`) and `h2` (`src/main.rs:3`)
/// - `e3` (from `m3`) has no linked hunk and no start line
pub fn sample_mapping() -> Mapping {
    Mapping {
        messages: vec![
            message("m1", None),
            message("m2", Some("2025-03-01T10:00:00Z")),
            message("m3", None),
        ],
        edits: vec![
            edit("e1", "m1", "src/lib.rs", Some(10)),
            edit("e2", "m2", "src/lib.rs", Some(12)),
            edit("e3", "m3", "README.md", None),
        ],
        hunks: vec![hunk("h1", "src/lib.rs", 12), hunk("h2", "src/main.rs", 3)],
        edit_hunks: vec![link("e2", "h1"), link("e2", "h2")],
        base: Some("main".to_owned()),
        head: Some("feature".to_owned()),
        errors: Vec::new(),
    }
}

/// Seals `mapping` the way the publisher does: gzip, then AES-256-GCM under
/// a random key and nonce. Returns the blob and the base64url key.
pub fn seal(mapping: &Mapping) -> (Vec<u8>, String) {
    let key: [u8; 32] = rand::random();
    let nonce: [u8; 12] = rand::random();

    let json = serde_json::to_vec(mapping).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).unwrap();
    let compressed = encoder.finish().unwrap();

    let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), compressed.as_ref())
        .unwrap();

    let mut blob = nonce.to_vec();
    blob.extend_from_slice(&ciphertext);
    (blob, URL_SAFE_NO_PAD.encode(key))
}

/// Handles into [`review_page`].
pub struct ReviewPage {
    pub doc: MemoryDocument,
    pub page: NodeId,
    pub sidebar: NodeId,
    pub filter: NodeId,
    pub diff_root: NodeId,
    pub lib_block: NodeId,
    pub lib_old_12: NodeId,
    pub lib_new_12: NodeId,
    pub lib_anchor_14: NodeId,
    pub main_block: NodeId,
    pub main_new_3: NodeId,
}

/// A review page with a files sidebar and two rendered file blocks:
///
/// ```text
/// body
/// └ main
///   ├ nav            (filter input + #diff- links)
///   └ div            (diff root, no well-known marker)
///     ├ div[data-path=src/lib.rs]   table: old 12, new 12, anchor R14
///     └ div[data-path=src/main.rs]  table: new 3
/// ```
pub fn review_page() -> ReviewPage {
    let mut doc = MemoryDocument::new(Size::new(1200.0, 800.0));
    let body = threadlens_core::document::Document::root(&doc);
    let page = doc.element(body, "main", &[]);

    let sidebar = doc.element(page, "nav", &[]);
    let filter = doc.element(sidebar, "input", &[("aria-label", "Filter changed files")]);
    let list = doc.element(sidebar, "ul", &[]);
    for (digest, name) in [("aaa", "src/lib.rs"), ("bbb", "src/main.rs")] {
        let item = doc.element(list, "li", &[]);
        let href = format!("#diff-{digest}");
        doc.element(item, "a", &[("href", href.as_str()), ("title", name)]);
    }

    let diff_root = doc.element(page, "div", &[]);

    let lib_block = doc.element(diff_root, "div", &[("data-path", "src/lib.rs")]);
    let table = doc.element(lib_block, "table", &[]);
    let tbody = doc.element(table, "tbody", &[]);
    let row = doc.element(tbody, "tr", &[]);
    let lib_old_12 = doc.element(row, "td", &[("data-line-number", "12"), ("data-side", "old")]);
    let lib_new_12 = doc.element(row, "td", &[("data-line-number", "12"), ("data-side", "new")]);
    let row = doc.element(tbody, "tr", &[]);
    let lib_anchor_14 = doc.element(row, "td", &[("id", "diff-aaaR14")]);

    let main_block = doc.element(diff_root, "div", &[("data-path", "src/main.rs")]);
    let table = doc.element(main_block, "table", &[]);
    let tbody = doc.element(table, "tbody", &[]);
    let row = doc.element(tbody, "tr", &[]);
    let main_new_3 = doc.element(row, "td", &[("data-line-number", "3"), ("data-side", "new")]);

    ReviewPage {
        doc,
        page,
        sidebar,
        filter,
        diff_root,
        lib_block,
        lib_old_12,
        lib_new_12,
        lib_anchor_14,
        main_block,
        main_new_3,
    }
}
