//! Shared test doubles: a scripted model backend that replays fixed
//! fragment sequences and records invocations and cancellation.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use llm_bridge::backend::{
    FragmentStream, InvokeOptions, Message, ModelBackend, ModelHandle, ModelSelector,
};
use llm_bridge::bridge::{create_router, AppState};
use llm_bridge::{Error, Result};

/// A model that replays a fixed script of fragments.
pub struct ScriptedModel {
    name: String,
    script: Vec<std::result::Result<String, String>>,
    hang_after: bool,
    pub invocations: Arc<AtomicUsize>,
    pub cancelled: Arc<AtomicBool>,
}

impl ScriptedModel {
    /// A model that yields the given fragments, then completes.
    pub fn new(name: &str, fragments: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            script: fragments.iter().map(|f| Ok(f.to_string())).collect(),
            hang_after: false,
            invocations: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A model that yields the given fragments, then fails with `message`.
    pub fn failing(name: &str, fragments: &[&str], message: &str) -> Self {
        let mut model = Self::new(name, fragments);
        model.script.push(Err(message.to_string()));
        model
    }

    /// A model that yields the given fragments, then produces nothing until
    /// its cancellation token fires.
    pub fn hanging(name: &str, fragments: &[&str]) -> Self {
        let mut model = Self::new(name, fragments);
        model.hang_after = true;
        model
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelHandle for ScriptedModel {
    fn id(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _messages: Vec<Message>,
        _options: Option<InvokeOptions>,
        cancel: CancellationToken,
    ) -> Result<FragmentStream> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        // Record cancellation independently of stream polling: the relay
        // stops consuming once it observes a disconnect.
        let cancelled = self.cancelled.clone();
        let watched = cancel.clone();
        tokio::spawn(async move {
            watched.cancelled().await;
            cancelled.store(true, Ordering::SeqCst);
        });

        let script: Vec<Result<String>> = self
            .script
            .iter()
            .map(|step| match step {
                Ok(fragment) => Ok(fragment.clone()),
                Err(message) => Err(Error::Invocation(message.clone())),
            })
            .collect();

        let scripted = futures::stream::iter(script);
        let tail = futures::stream::unfold((cancel, self.hang_after), |(cancel, hang)| async move {
            if hang {
                cancel.cancelled().await;
            }
            None::<(Result<String>, _)>
        });

        Ok(Box::pin(scripted.chain(tail)))
    }
}

/// A backend serving scripted models for a single vendor.
pub struct ScriptedBackend {
    vendor: String,
    models: Vec<Arc<ScriptedModel>>,
}

impl ScriptedBackend {
    pub fn new(vendor: &str, models: Vec<Arc<ScriptedModel>>) -> Self {
        Self {
            vendor: vendor.to_string(),
            models,
        }
    }

    /// A backend with no models at all.
    pub fn empty() -> Self {
        Self::new("copilot", vec![])
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn list(&self, selector: &ModelSelector) -> Result<Vec<Arc<dyn ModelHandle>>> {
        if selector.vendor != self.vendor {
            return Ok(vec![]);
        }
        Ok(self
            .models
            .iter()
            .filter(|m| selector.family.as_deref().is_none_or(|f| f == m.name))
            .map(|m| m.clone() as Arc<dyn ModelHandle>)
            .collect())
    }
}

/// Build a bridge router over the given backend.
pub fn app(backend: ScriptedBackend) -> axum::Router {
    create_router(AppState {
        backend: Arc::new(backend),
    })
}
