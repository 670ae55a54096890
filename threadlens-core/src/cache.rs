//! Reference cache and resolution priority.
//!
//! The store itself is injected ([`ReferenceStore`]) so the same resolution
//! rules run against SQLite in the binary and a plain map in tests. Reads and
//! writes are synchronous and always keyed by conversation identity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::LocateError;
use crate::locator::{self, TextRegion};
use crate::types::{ConversationIdentity, ReferenceKind};

/// Session-scoped key/value store for the last known-good reference.
pub trait ReferenceStore: Send + Sync {
    fn get(&self, identity: &ConversationIdentity, kind: ReferenceKind) -> Option<String>;
    fn set(&self, identity: &ConversationIdentity, kind: ReferenceKind, url: &str);
    fn remove(&self, identity: &ConversationIdentity, kind: ReferenceKind);
}

/// In-process store; the default for session-only runs and tests.
#[derive(Debug, Default)]
pub struct MemoryReferenceStore {
    records: Mutex<HashMap<(ConversationIdentity, ReferenceKind), String>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReferenceStore for MemoryReferenceStore {
    fn get(&self, identity: &ConversationIdentity, kind: ReferenceKind) -> Option<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(identity.clone(), kind))
            .cloned()
    }

    fn set(&self, identity: &ConversationIdentity, kind: ReferenceKind, url: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((identity.clone(), kind), url.to_owned());
    }

    fn remove(&self, identity: &ConversationIdentity, kind: ReferenceKind) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(identity.clone(), kind));
    }
}

/// Retrieves the full discussion thread when the current view shows no
/// reference.
#[async_trait]
pub trait ConversationFetcher: Send + Sync {
    async fn fetch_thread(
        &self,
        identity: &ConversationIdentity,
    ) -> Result<Vec<TextRegion>, LocateError>;
}

/// Where a resolved reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    View,
    Thread,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub url: String,
    pub kind: ReferenceKind,
    pub source: ReferenceSource,
}

/// Applies the view → thread → cache priority on top of a store.
#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn ReferenceStore>,
    fetcher: Option<Arc<dyn ConversationFetcher>>,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn ReferenceStore>) -> Self {
        Self {
            store,
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ConversationFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Resolves a reference of `kind` for `identity`.
    ///
    /// Order: a valid value in `view`, a valid value in the re-fetched thread,
    /// a cached value that still passes validation, and finally any fresh value
    /// that failed the whitelist. Valid fresh values are written to the store.
    pub async fn resolve(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
        view: &[TextRegion],
    ) -> Result<ResolvedReference, LocateError> {
        let mut weak = None;
        if let Some(found) = self.resolve_fresh(identity, kind, view, &mut weak).await {
            return Ok(found);
        }
        if let Some(url) = self.cached(identity, kind) {
            tracing::debug!(%identity, kind = kind.as_str(), "using cached reference");
            return Ok(ResolvedReference {
                url,
                kind,
                source: ReferenceSource::Cache,
            });
        }
        weak.ok_or(LocateError::ReferenceNotFound)
    }

    /// Re-derives a reference without consulting the cache.
    pub async fn rederive(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
        view: &[TextRegion],
    ) -> Result<ResolvedReference, LocateError> {
        let mut weak = None;
        match self.resolve_fresh(identity, kind, view, &mut weak).await {
            Some(found) => Ok(found),
            None => weak.ok_or(LocateError::ReferenceNotFound),
        }
    }

    async fn resolve_fresh(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
        view: &[TextRegion],
        weak: &mut Option<ResolvedReference>,
    ) -> Option<ResolvedReference> {
        if let Some(url) = locator::find_reference(view, kind) {
            if let Some(found) = self.accept(identity, kind, url, ReferenceSource::View, weak) {
                return Some(found);
            }
        }

        let fetcher = self.fetcher.as_ref()?;
        match fetcher.fetch_thread(identity).await {
            Ok(regions) => {
                let url = locator::find_reference(&regions, kind)?;
                self.accept(identity, kind, url, ReferenceSource::Thread, weak)
            }
            Err(err) => {
                tracing::warn!(%identity, error = %err, "conversation fetch failed");
                None
            }
        }
    }

    fn accept(
        &self,
        identity: &ConversationIdentity,
        kind: ReferenceKind,
        url: String,
        source: ReferenceSource,
        weak: &mut Option<ResolvedReference>,
    ) -> Option<ResolvedReference> {
        let resolved = ResolvedReference { url, kind, source };
        if kind == ReferenceKind::Mapping && !locator::is_likely_valid(&resolved.url) {
            tracing::debug!(url = %resolved.url, "fresh reference failed the whitelist");
            weak.get_or_insert(resolved);
            return None;
        }
        self.store.set(identity, kind, &resolved.url);
        Some(resolved)
    }

    /// Returns the cached value if it still validates; invalid entries are removed.
    pub fn cached(&self, identity: &ConversationIdentity, kind: ReferenceKind) -> Option<String> {
        let raw = self.store.get(identity, kind)?;
        let validated = match kind {
            ReferenceKind::Mapping => {
                locator::sanitize(&raw).filter(|url| locator::is_likely_valid(url))
            }
            ReferenceKind::Proxy => locator::proxy_origin(&raw),
        };
        if validated.is_none() {
            tracing::info!(%identity, kind = kind.as_str(), "dropping invalid cached reference");
            self.store.remove(identity, kind);
        }
        validated
    }

    pub fn invalidate(&self, identity: &ConversationIdentity, kind: ReferenceKind) {
        self.store.remove(identity, kind);
    }
}
