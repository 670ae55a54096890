mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use threadlens_core::cache::{
    ConversationFetcher, MemoryReferenceStore, ReferenceResolver, ReferenceSource, ReferenceStore,
};
use threadlens_core::db::SqliteReferenceStore;
use threadlens_core::error::LocateError;
use threadlens_core::locator::TextRegion;
use threadlens_core::types::{ConversationIdentity, ReferenceKind};

const VIEW_URL: &str = "https://agentexports.com/gm/fromview";
const THREAD_URL: &str = "https://agentexports.com/gm/fromthread";
const CACHED_URL: &str = "https://agentexports.com/gm/fromcache";

fn marker(url: &str) -> TextRegion {
    TextRegion::plain(format!("Review notes\n\nagentexport-mapping: {url}\n"))
}

/// Serves a scripted sequence of thread fetch results, then the last one forever.
struct ScriptedFetcher {
    replies: Mutex<Vec<Result<Vec<TextRegion>, LocateError>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(replies: Vec<Result<Vec<TextRegion>, LocateError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationFetcher for ScriptedFetcher {
    async fn fetch_thread(
        &self,
        _identity: &ConversationIdentity,
    ) -> Result<Vec<TextRegion>, LocateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies.first().cloned().unwrap_or(Ok(Vec::new()))
        }
    }
}

#[tokio::test]
async fn view_reference_wins_and_is_cached() {
    let store = Arc::new(MemoryReferenceStore::new());
    let identity = common::identity();
    store.set(&identity, ReferenceKind::Mapping, CACHED_URL);
    let resolver = ReferenceResolver::new(store.clone());

    let found = resolver
        .resolve(&identity, ReferenceKind::Mapping, &[marker(VIEW_URL)])
        .await
        .unwrap();

    assert_eq!(found.url, VIEW_URL);
    assert_eq!(found.source, ReferenceSource::View);
    assert_eq!(
        store.get(&identity, ReferenceKind::Mapping).as_deref(),
        Some(VIEW_URL)
    );
}

#[tokio::test]
async fn thread_is_consulted_before_the_cache() {
    let store = Arc::new(MemoryReferenceStore::new());
    let identity = common::identity();
    store.set(&identity, ReferenceKind::Mapping, CACHED_URL);
    let fetcher = ScriptedFetcher::new(vec![Ok(vec![marker(THREAD_URL)])]);
    let resolver = ReferenceResolver::new(store.clone()).with_fetcher(fetcher.clone());

    let found = resolver
        .resolve(&identity, ReferenceKind::Mapping, &[TextRegion::plain("no marker")])
        .await
        .unwrap();

    assert_eq!(found.url, THREAD_URL);
    assert_eq!(found.source, ReferenceSource::Thread);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn cache_is_used_when_nothing_fresh_is_found() {
    let store = Arc::new(MemoryReferenceStore::new());
    let identity = common::identity();
    store.set(&identity, ReferenceKind::Mapping, CACHED_URL);
    let fetcher = ScriptedFetcher::new(vec![Err(LocateError::Fetch("offline".into()))]);
    let resolver = ReferenceResolver::new(store).with_fetcher(fetcher);

    let found = resolver
        .resolve(&identity, ReferenceKind::Mapping, &[])
        .await
        .unwrap();

    assert_eq!(found.url, CACHED_URL);
    assert_eq!(found.source, ReferenceSource::Cache);
}

#[tokio::test]
async fn cache_is_scoped_by_identity() {
    let store = Arc::new(MemoryReferenceStore::new());
    store.set(&common::identity(), ReferenceKind::Mapping, CACHED_URL);
    let resolver = ReferenceResolver::new(store);

    let other = ConversationIdentity::new("acme", "widgets", "99");
    let result = resolver.resolve(&other, ReferenceKind::Mapping, &[]).await;

    assert_eq!(result, Err(LocateError::ReferenceNotFound));
}

#[tokio::test]
async fn invalid_cached_entry_is_dropped() {
    let store = Arc::new(MemoryReferenceStore::new());
    let identity = common::identity();
    store.set(&identity, ReferenceKind::Mapping, "https://agentexports.com/g/legacy");
    let resolver = ReferenceResolver::new(store.clone());

    let result = resolver.resolve(&identity, ReferenceKind::Mapping, &[]).await;

    assert_eq!(result, Err(LocateError::ReferenceNotFound));
    assert!(store.is_empty());
}

#[tokio::test]
async fn weak_fresh_reference_is_a_last_resort_and_never_cached() {
    let store = Arc::new(MemoryReferenceStore::new());
    let identity = common::identity();
    let resolver = ReferenceResolver::new(store.clone());
    let weak_url = "https://cdn.example.com/exports/mapping";

    let found = resolver
        .resolve(&identity, ReferenceKind::Mapping, &[marker(weak_url)])
        .await
        .unwrap();
    assert_eq!(found.url, weak_url);
    assert!(store.is_empty());

    // A valid cached value beats a weak fresh one.
    store.set(&identity, ReferenceKind::Mapping, CACHED_URL);
    let found = resolver
        .resolve(&identity, ReferenceKind::Mapping, &[marker(weak_url)])
        .await
        .unwrap();
    assert_eq!(found.url, CACHED_URL);
}

#[tokio::test]
async fn rederive_skips_the_cache() {
    let store = Arc::new(MemoryReferenceStore::new());
    let identity = common::identity();
    store.set(&identity, ReferenceKind::Mapping, CACHED_URL);
    let resolver = ReferenceResolver::new(store);

    let result = resolver.rederive(&identity, ReferenceKind::Mapping, &[]).await;

    assert_eq!(result, Err(LocateError::ReferenceNotFound));
}

#[tokio::test]
async fn proxy_references_are_cached_as_origins() {
    let store = Arc::new(SqliteReferenceStore::open_in_memory().unwrap());
    let identity = common::identity();
    let resolver = ReferenceResolver::new(store.clone());
    let view = [TextRegion::plain("agentexport-proxy: https://proxy.example.com/fetch")];

    let found = resolver
        .resolve(&identity, ReferenceKind::Proxy, &view)
        .await
        .unwrap();
    assert_eq!(found.url, "https://proxy.example.com");

    let again = resolver
        .resolve(&identity, ReferenceKind::Proxy, &[])
        .await
        .unwrap();
    assert_eq!(again.source, ReferenceSource::Cache);
    assert_eq!(
        store.load(&identity, ReferenceKind::Proxy).unwrap().as_deref(),
        Some("https://proxy.example.com")
    );
}
