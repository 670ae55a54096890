use serde::{Deserialize, Serialize};

/// Identifies the discussion thread currently in view.
///
/// Every cache record is namespaced by an identity, so a reference discovered
/// for one thread is never returned for another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationIdentity {
    pub owner: String,
    pub repo: String,
    pub thread_id: String,
}

impl ConversationIdentity {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            thread_id: thread_id.into(),
        }
    }

    /// Derives `owner/repo` from a git remote URL.
    ///
    /// Accepts `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo.git`
    /// and scp-like `git@host:owner/repo.git`. Returns `None` when fewer than two
    /// path segments are present.
    pub fn from_remote(remote_url: &str, thread_id: impl Into<String>) -> Option<Self> {
        let trimmed = remote_url.trim().trim_end_matches('/');
        let path = if let Some((_, rest)) = trimmed.split_once("://") {
            rest.split_once('/').map(|(_, p)| p)?
        } else if let Some((_, rest)) = trimmed.split_once(':') {
            rest
        } else {
            trimmed
        };
        let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
        let repo = segments.next()?.trim_end_matches(".git");
        let owner = segments.next()?;
        if repo.is_empty() {
            return None;
        }
        Some(Self::new(owner, repo, thread_id))
    }
}

impl std::fmt::Display for ConversationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.thread_id)
    }
}

/// The two kinds of reference a marker line can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Mapping,
    Proxy,
}

impl ReferenceKind {
    /// Storage key used by the reference store.
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::Mapping => "mapping",
            ReferenceKind::Proxy => "proxy",
        }
    }

    /// Marker token that introduces a reference of this kind in free text.
    pub fn marker(self) -> &'static str {
        match self {
            ReferenceKind::Mapping => "agentexport-mapping",
            ReferenceKind::Proxy => "agentexport-proxy",
        }
    }
}

/// A discovered pointer, already sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub url: String,
    pub kind: ReferenceKind,
}

/// Which agent produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptTool {
    Claude,
    Codex,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>, // ISO-8601
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<TranscriptTool>,
}

/// A claimed correspondence between a message and a file region.
///
/// `start_line`/`end_line` are absent when the publisher could not place the
/// edit in the base file (`confidence == "unmatched"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub id: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message_id: Option<String>,
    #[serde(default)]
    pub confidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<TranscriptTool>,
}

impl Edit {
    /// The message this edit points at: the assistant message when known,
    /// otherwise the user prompt that led to it.
    pub fn referenced_message_id(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .or(self.user_message_id.as_deref())
    }
}

/// A contiguous diff region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub id: String,
    pub file_path: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
}

/// Join row between an edit and a hunk it overlaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHunkLink {
    pub edit_id: String,
    pub hunk_id: String,
}

/// The full mapping document as published next to a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Mapping {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub edits: Vec<Edit>,
    #[serde(default)]
    pub hunks: Vec<Hunk>,
    #[serde(default)]
    pub edit_hunks: Vec<EditHunkLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
