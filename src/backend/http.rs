//! HTTP model backend for OpenAI-compatible vendor endpoints.
//!
//! Vendors come from configuration: each exposes a base URL and a list of
//! model families. `list` filters that catalog by the request's selector;
//! `invoke` POSTs a streaming chat completion and yields the SSE
//! `delta.content` fragments, line-buffered across TCP chunk boundaries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::{FragmentStream, InvokeOptions, Message, ModelBackend, ModelHandle, ModelSelector};
use crate::config::{ApiKey, VendorConfig};
use crate::error::{Error, Result};

/// Cap on a single buffered SSE line; a source that exceeds it is discarded.
const MAX_SSE_LINE: usize = 64 * 1024;

/// Production backend over configured OpenAI-compatible vendors.
pub struct HttpBackend {
    client: Client,
    vendors: Vec<VendorConfig>,
}

impl HttpBackend {
    /// Build a backend over the configured vendors.
    ///
    /// No overall request timeout is set: fragment streams are long-lived
    /// and cancellation is driven by the per-request token instead.
    pub fn new(vendors: Vec<VendorConfig>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Invocation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, vendors })
    }
}

#[async_trait]
impl ModelBackend for HttpBackend {
    async fn list(&self, selector: &ModelSelector) -> Result<Vec<Arc<dyn ModelHandle>>> {
        let mut handles: Vec<Arc<dyn ModelHandle>> = Vec::new();

        for vendor in self.vendors.iter().filter(|v| v.name == selector.vendor) {
            for family in &vendor.families {
                if selector.family.as_deref().is_none_or(|wanted| wanted == family) {
                    handles.push(Arc::new(HttpModel {
                        client: self.client.clone(),
                        url: vendor.url.clone(),
                        api_key: vendor.api_key.clone(),
                        family: family.clone(),
                    }));
                }
            }
        }

        Ok(handles)
    }
}

/// One configured (vendor, family) pair, callable as a model.
struct HttpModel {
    client: Client,
    url: String,
    api_key: Option<ApiKey>,
    family: String,
}

#[async_trait]
impl ModelHandle for HttpModel {
    fn id(&self) -> &str {
        &self.family
    }

    async fn invoke(
        &self,
        messages: Vec<Message>,
        options: Option<InvokeOptions>,
        cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        let mut payload = serde_json::Map::new();
        payload.insert("model".into(), self.family.clone().into());
        payload.insert(
            "messages".into(),
            serde_json::to_value(&messages)
                .map_err(|e| Error::Invocation(format!("failed to encode messages: {e}")))?,
        );
        payload.insert("stream".into(), true.into());
        // Pass-through options are opaque; reserved keys keep the bridge's values.
        if let Some(options) = options {
            for (key, value) in options {
                payload.entry(key).or_insert(value);
            }
        }

        let url = format!("{}/chat/completions", self.url.trim_end_matches('/'));
        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::Value::Object(payload));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Invocation(format!("failed to reach vendor endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Invocation(format!(
                "vendor endpoint returned {status}: {body}"
            )));
        }

        Ok(sse_fragments(response.bytes_stream(), cancel))
    }
}

/// Turn an SSE byte stream into a fragment stream, stopping on cancellation.
fn sse_fragments(
    bytes: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    cancel: CancellationToken,
) -> FragmentStream {
    let fragments = bytes
        .take_until(cancel.cancelled_owned())
        .map(|chunk| {
            chunk.map_err(|e| Error::Invocation(format!("stream error from vendor endpoint: {e}")))
        })
        .scan(SseDecoder::new(), |decoder, chunk| {
            let out: Vec<Result<String>> = match chunk {
                Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            futures::future::ready(Some(futures::stream::iter(out)))
        })
        .flatten();

    Box::pin(fragments)
}

/// Line-buffered extraction of `delta.content` from OpenAI-style SSE data.
///
/// Reassembles complete lines across chunk boundaries; non-`data:` SSE fields
/// and unparsable data lines are skipped; `[DONE]` ends extraction.
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Feed one chunk, returning the content fragments it completed.
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }

        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_SSE_LINE && !self.buffer.contains(&b'\n') {
            tracing::warn!("Discarding oversized SSE line from vendor endpoint");
            self.buffer.clear();
            return fragments;
        }

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(fragment) = self.decode_line(line.trim_end_matches(['\r', '\n'])) {
                fragments.push(fragment);
            }
            if self.done {
                break;
            }
        }

        fragments
    }

    /// Extract the content delta from one complete SSE line, if any.
    fn decode_line(&mut self, line: &str) -> Option<String> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        let value: serde_json::Value = serde_json::from_str(data).ok()?;
        let content = value
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()?;
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}
