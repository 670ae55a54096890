//! Builds the mapping pipeline from config and runs loads off the UI loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::mpsc::UnboundedSender;

use threadlens_core::cache::{ReferenceResolver, ReferenceStore};
use threadlens_core::db::{SqliteReferenceStore, IN_MEMORY};
use threadlens_core::locator::TextRegion;
use threadlens_core::pipeline::{MappingPipeline, PanelState};
use threadlens_core::retrieve::{HttpByteSource, ProxyChannel, SecureRetriever};
use threadlens_core::types::{ConversationIdentity, ReferenceKind};

use crate::config::Config;
use crate::event::AppEvent;
use crate::git::fetcher::GitLogFetcher;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct MappingLoader {
    pipeline: Arc<MappingPipeline>,
    tx: UnboundedSender<AppEvent>,
    /// `--mapping`: treated as if it were written in the visible text.
    reference_override: Option<String>,
}

impl MappingLoader {
    /// Opens the reference store and wires direct, proxied and history-based
    /// retrieval.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be opened or the HTTP client cannot be built.
    pub fn build(config: &Config, repo: &Path, tx: UnboundedSender<AppEvent>) -> anyhow::Result<Self> {
        let store: Arc<dyn ReferenceStore> = Arc::new(open_store(&config.cache_path)?);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;

        let mut retriever = SecureRetriever::new(Arc::new(HttpByteSource::new(client.clone())));
        if let Some(proxy) = &config.proxy {
            tracing::info!(origin = %proxy, "using configured fetch proxy");
            retriever = retriever.with_indirect(Arc::new(ProxyChannel::new(client.clone(), proxy.clone())));
        }
        let resolver = ReferenceResolver::new(store)
            .with_fetcher(Arc::new(GitLogFetcher::new(repo, config.base.clone())));
        let mut pipeline = MappingPipeline::new(resolver, retriever);
        if config.proxy.is_none() {
            pipeline = pipeline.with_proxy_discovery(client);
        }

        Ok(Self {
            pipeline: Arc::new(pipeline),
            tx,
            reference_override: config.mapping.clone(),
        })
    }

    /// Starts a load; the result arrives as `AppEvent::MappingLoaded`.
    pub fn spawn(&self, generation: u64, identity: ConversationIdentity, view: Vec<TextRegion>) {
        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.tx.clone();
        let view = self.visible_text(view);
        tokio::spawn(async move {
            let result = pipeline.load(&identity, &view).await;
            match &result {
                Ok(mapping) => tracing::info!(
                    %identity,
                    messages = mapping.mapping().messages.len(),
                    edits = mapping.mapping().edits.len(),
                    "mapping loaded"
                ),
                Err(err) => tracing::warn!(%identity, error = %err, "mapping unavailable"),
            }
            let _ = tx.send(AppEvent::MappingLoaded {
                generation,
                state: PanelState::from_result(result),
            });
        });
    }

    /// Drops the cached mapping reference so the next load rediscovers it.
    pub fn forget(&self, identity: &ConversationIdentity) {
        self.pipeline
            .resolver()
            .invalidate(identity, ReferenceKind::Mapping);
    }

    fn visible_text(&self, mut view: Vec<TextRegion>) -> Vec<TextRegion> {
        if let Some(reference) = &self.reference_override {
            let line = format!("{}: {reference}", ReferenceKind::Mapping.marker());
            view.insert(0, TextRegion::plain(line));
        }
        view
    }
}

fn open_store(path: &str) -> anyhow::Result<SqliteReferenceStore> {
    if path != IN_MEMORY {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    SqliteReferenceStore::open(path).with_context(|| format!("opening reference store {path}"))
}
