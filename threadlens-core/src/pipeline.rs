//! End-to-end loading: locate the reference, retrieve and decrypt the mapping,
//! build its indices. One retry with the cache bypassed on any failure.

use std::sync::Arc;

use crate::cache::ReferenceResolver;
use crate::error::{LocateError, PipelineError};
use crate::index::IndexedMapping;
use crate::locator::TextRegion;
use crate::retrieve::{ProxyChannel, SecureRetriever};
use crate::types::{ConversationIdentity, ReferenceKind};

/// What the conversation panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Loading,
    /// No reference anywhere; nothing to show.
    Empty,
    Failed(String),
    Ready(Arc<IndexedMapping>),
}

impl PanelState {
    pub fn from_result(result: Result<IndexedMapping, PipelineError>) -> Self {
        match result {
            Ok(mapping) => PanelState::Ready(Arc::new(mapping)),
            Err(PipelineError::Locate(LocateError::ReferenceNotFound)) => PanelState::Empty,
            Err(err) => PanelState::Failed(err.to_string()),
        }
    }

    pub fn mapping(&self) -> Option<&IndexedMapping> {
        match self {
            PanelState::Ready(mapping) => Some(mapping),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct MappingPipeline {
    resolver: ReferenceResolver,
    retriever: SecureRetriever,
    proxy_client: Option<reqwest::Client>,
}

impl MappingPipeline {
    pub fn new(resolver: ReferenceResolver, retriever: SecureRetriever) -> Self {
        Self {
            resolver,
            retriever,
            proxy_client: None,
        }
    }

    /// Lets `agentexport-proxy:` references found for a conversation override
    /// the retriever's indirect channel.
    pub fn with_proxy_discovery(mut self, client: reqwest::Client) -> Self {
        self.proxy_client = Some(client);
        self
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Loads the mapping for `identity`.
    ///
    /// If retrieval of the resolved reference fails, the cached mapping
    /// reference is dropped, the reference is derived again without the cache,
    /// and retrieval is attempted once more. When re-derivation finds nothing,
    /// the first failure is returned.
    pub async fn load(
        &self,
        identity: &ConversationIdentity,
        view: &[TextRegion],
    ) -> Result<IndexedMapping, PipelineError> {
        let retriever = self.retriever_for(identity, view).await;
        let reference = self
            .resolver
            .resolve(identity, ReferenceKind::Mapping, view)
            .await?;
        tracing::debug!(%identity, url = %reference.url, source = ?reference.source, "mapping reference resolved");

        let first_err = match retriever.resolve(&reference.url).await {
            Ok(mapping) => return Ok(IndexedMapping::new(mapping)),
            Err(err) => err,
        };
        tracing::warn!(%identity, error = %first_err, "mapping retrieval failed, retrying without cache");
        self.resolver.invalidate(identity, ReferenceKind::Mapping);

        let Ok(retry) = self
            .resolver
            .rederive(identity, ReferenceKind::Mapping, view)
            .await
        else {
            return Err(first_err.into());
        };
        let mapping = retriever.resolve(&retry.url).await?;
        Ok(IndexedMapping::new(mapping))
    }

    async fn retriever_for(&self, identity: &ConversationIdentity, view: &[TextRegion]) -> SecureRetriever {
        let Some(client) = &self.proxy_client else {
            return self.retriever.clone();
        };
        match self.resolver.resolve(identity, ReferenceKind::Proxy, view).await {
            Ok(proxy) => {
                tracing::debug!(%identity, origin = %proxy.url, "using discovered fetch proxy");
                self.retriever
                    .clone()
                    .with_indirect(Arc::new(ProxyChannel::new(client.clone(), proxy.url)))
            }
            Err(_) => self.retriever.clone(),
        }
    }
}
