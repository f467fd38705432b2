//! Model backend capability.
//!
//! The bridge depends only on the [`ModelBackend`] / [`ModelHandle`] traits:
//! given a selector, return zero or more callable models; given a model and
//! a message list, return a cancellable stream of text fragments. The
//! production implementation fronts OpenAI-compatible endpoints ([`http`]),
//! but the core never depends on a concrete backend.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub mod http;

pub use http::HttpBackend;

/// A (vendor, optional family) pair used to pick a model among available
/// backends. Built per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelector {
    pub vendor: String,
    pub family: Option<String>,
}

/// One chat message sent to a model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    /// A single user-turn message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Opaque pass-through request options, forwarded verbatim to the invocation.
pub type InvokeOptions = serde_json::Map<String, serde_json::Value>;

/// A lazily produced sequence of text fragments from one model invocation.
///
/// The producer must stop promptly once the cancellation token passed to
/// [`ModelHandle::invoke`] is cancelled.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One selected model. The bridge never inspects a handle beyond invoking it.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    /// Identifier for diagnostics only.
    fn id(&self) -> &str;

    /// Issue a chat request, yielding text fragments as they are produced.
    ///
    /// Cancellation is cooperative: the implementation observes `cancel` and
    /// stops producing fragments once it is triggered.
    async fn invoke(
        &self,
        messages: Vec<Message>,
        options: Option<InvokeOptions>,
        cancel: CancellationToken,
    ) -> Result<FragmentStream>;
}

/// The host capability that supplies callable models.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Return the models matching `selector`, in the backend's stable order.
    async fn list(&self, selector: &ModelSelector) -> Result<Vec<Arc<dyn ModelHandle>>>;
}

/// Pick a model for `selector`: the first entry of the matched set.
///
/// The bridge imposes no ranking beyond the backend's own ordering. An empty
/// set fails with [`Error::NoModelAvailable`] carrying the selector for
/// diagnostics.
pub async fn select_model(
    backend: &dyn ModelBackend,
    selector: &ModelSelector,
) -> Result<Arc<dyn ModelHandle>> {
    let models = backend.list(selector).await?;
    models
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoModelAvailable {
            vendor: selector.vendor.clone(),
            family: selector.family.clone(),
        })
}
