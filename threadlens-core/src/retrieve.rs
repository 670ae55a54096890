//! Secure retrieval: reference URL in, [`Mapping`] out.
//!
//! Direct retrieval goes through a [`ByteSource`]; when it fails and an
//! [`IndirectChannel`] is configured, the same URL is requested through that
//! privileged channel instead. Keyed references are decrypted and inflated
//! before parsing.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::RetrieveError;
use crate::locator;
use crate::types::Mapping;

/// Fetches raw bytes for a URL.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RetrieveError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectRequest {
    pub url: String,
}

/// Reply of the indirect channel. `bytes` is standard base64 on the wire and
/// may be omitted when `ok` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndirectResponse {
    Reply {
        ok: bool,
        status: u16,
        #[serde(default)]
        bytes: String,
    },
    Failed { error: String },
}

/// Privileged fallback used only when direct retrieval is blocked.
#[async_trait]
pub trait IndirectChannel: Send + Sync {
    async fn request(&self, request: IndirectRequest) -> Result<IndirectResponse, RetrieveError>;
}

/// Direct HTTP retrieval.
#[derive(Debug, Clone, Default)]
pub struct HttpByteSource {
    client: reqwest::Client,
}

impl HttpByteSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RetrieveError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrieveError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Indirect channel backed by a fetch proxy: `POST <origin>/fetch` with
/// `{"url": ...}`.
#[derive(Debug, Clone)]
pub struct ProxyChannel {
    client: reqwest::Client,
    origin: String,
}

impl ProxyChannel {
    pub fn new(client: reqwest::Client, origin: impl Into<String>) -> Self {
        Self {
            client,
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[async_trait]
impl IndirectChannel for ProxyChannel {
    async fn request(&self, request: IndirectRequest) -> Result<IndirectResponse, RetrieveError> {
        let endpoint = format!("{}/fetch", self.origin.trim_end_matches('/'));
        let response = self.client.post(&endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RetrieveError::Status(status.as_u16()));
        }
        Ok(response.json::<IndirectResponse>().await?)
    }
}

/// Normalizes, retrieves, decrypts and parses mapping references.
#[derive(Clone)]
pub struct SecureRetriever {
    direct: Arc<dyn ByteSource>,
    indirect: Option<Arc<dyn IndirectChannel>>,
}

impl SecureRetriever {
    pub fn new(direct: Arc<dyn ByteSource>) -> Self {
        Self {
            direct,
            indirect: None,
        }
    }

    pub fn with_indirect(mut self, channel: Arc<dyn IndirectChannel>) -> Self {
        self.indirect = Some(channel);
        self
    }

    /// Resolves `reference` to a mapping.
    ///
    /// # Errors
    ///
    /// Any [`RetrieveError`]; transport errors come from the indirect channel
    /// when one was tried, otherwise from direct retrieval.
    pub async fn resolve(&self, reference: &str) -> Result<Mapping, RetrieveError> {
        let normalized = locator::normalize(reference);
        let (url, key) = crypto::split_key(&normalized);
        if url::Url::parse(url).is_err() {
            return Err(RetrieveError::InvalidUrl(url.to_owned()));
        }
        let bytes = self.retrieve(url).await?;
        let mapping = decode_payload(&bytes, key)?;
        tracing::info!(
            url,
            encrypted = key.is_some(),
            messages = mapping.messages.len(),
            edits = mapping.edits.len(),
            hunks = mapping.hunks.len(),
            "mapping resolved"
        );
        Ok(mapping)
    }

    async fn retrieve(&self, url: &str) -> Result<Vec<u8>, RetrieveError> {
        let direct_err = match self.direct.fetch(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(err) => err,
        };
        let Some(channel) = &self.indirect else {
            return Err(direct_err);
        };
        tracing::warn!(url, error = %direct_err, "direct retrieval failed, using indirect channel");

        let request = IndirectRequest {
            url: url.to_owned(),
        };
        match channel.request(request).await? {
            IndirectResponse::Reply {
                ok: true, bytes, ..
            } => STANDARD
                .decode(bytes.as_bytes())
                .map_err(|err| RetrieveError::Indirect(format!("invalid body encoding: {err}"))),
            IndirectResponse::Reply { status, .. } => Err(RetrieveError::Status(status)),
            IndirectResponse::Failed { error } => Err(RetrieveError::Indirect(error)),
        }
    }
}

/// Turns retrieved bytes into a mapping.
///
/// With a key, the bytes are a sealed blob (see [`crypto::open_blob`]). Without
/// one, they must be plain JSON; a body that starts with `<` is an HTML page
/// (login wall, error page) and is rejected as `UnexpectedContentType`.
pub fn decode_payload(bytes: &[u8], key: Option<&str>) -> Result<Mapping, RetrieveError> {
    let plaintext = match key {
        Some(key) => crypto::open_blob(bytes, key)?,
        None => bytes.to_vec(),
    };
    let text = String::from_utf8(plaintext)?;
    if key.is_none() && text.trim_start().starts_with('<') {
        return Err(RetrieveError::UnexpectedContentType);
    }
    Ok(serde_json::from_str(&text)?)
}
