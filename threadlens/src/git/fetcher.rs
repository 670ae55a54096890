//! Re-reads the branch history when the head commit carries no reference.
//!
//! Every commit in `base..HEAD` counts as one message of the conversation
//! thread, newest first.

use std::path::PathBuf;

use async_trait::async_trait;
use git2::{Repository, Sort};

use threadlens_core::cache::ConversationFetcher;
use threadlens_core::error::LocateError;
use threadlens_core::locator::TextRegion;
use threadlens_core::types::ConversationIdentity;

#[derive(Debug, Clone)]
pub struct GitLogFetcher {
    repo_path: PathBuf,
    base: String,
}

impl GitLogFetcher {
    pub fn new(repo_path: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl ConversationFetcher for GitLogFetcher {
    async fn fetch_thread(
        &self,
        identity: &ConversationIdentity,
    ) -> Result<Vec<TextRegion>, LocateError> {
        let path = self.repo_path.clone();
        let base = self.base.clone();
        let regions = tokio::task::spawn_blocking(move || branch_messages(&path, &base))
            .await
            .map_err(|err| LocateError::Fetch(err.to_string()))?
            .map_err(|err| LocateError::Fetch(err.message().to_owned()))?;
        tracing::debug!(%identity, commits = regions.len(), "branch history fetched");
        Ok(regions)
    }
}

/// Commit messages reachable from HEAD but not from `base`.
///
/// `Repository` is `!Send`, so it is opened on the blocking thread itself.
pub fn branch_messages(path: &std::path::Path, base: &str) -> Result<Vec<TextRegion>, git2::Error> {
    let repo = Repository::discover(path)?;
    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    walk.push_head()?;
    if let Ok(base) = repo.revparse_single(base).and_then(|obj| obj.peel_to_commit()) {
        walk.hide(base.id())?;
    }

    let mut regions = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        if let Some(message) = commit.message() {
            regions.push(TextRegion::plain(message));
        }
    }
    Ok(regions)
}
