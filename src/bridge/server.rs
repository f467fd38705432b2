//! HTTP server setup and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Extension, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::backend::ModelBackend;
use crate::bridge::types::ChatRequest;
use crate::bridge::{body, relay};
use crate::error::{Error, Result};

/// Response header carrying the per-request correlation ID.
pub const BRIDGE_REQUEST_ID_HEADER: &str = "x-bridge-request-id";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ModelBackend>,
}

/// Correlation ID assigned to each request (UUID v4).
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Create the axum router: one recognized route, everything else 404.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Wrong methods on /chat get the same 404 as unknown paths
        .route("/chat", post(chat).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
}

/// Handle POST /chat: decode, select, relay.
async fn chat(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    raw_body: axum::body::Body,
) -> Response {
    match body::decode::<ChatRequest>(raw_body).await {
        Ok(request) => {
            tracing::debug!(request_id = %request_id.0, "Decoded chat request");
            relay::relay_chat(state.backend.clone(), request).await
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id.0, error = %e, "Failed to decode chat request");
            e.into_response()
        }
    }
}

/// Fixed 404 body for every unrecognized method/path combination.
async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not Found. Use POST /chat" })),
    )
        .into_response()
}

/// Assign a correlation ID and echo it back as a response header.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    request.extensions_mut().insert(RequestId(id));

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        BRIDGE_REQUEST_ID_HEADER,
        HeaderValue::from_str(&id.to_string()).unwrap(),
    );
    response
}

/// Outcome of [`BridgeServer::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The listener was bound at this address.
    Started(SocketAddr),
    /// Already listening; no side effects.
    AlreadyRunning(SocketAddr),
}

impl StartOutcome {
    /// The bound address in either case.
    pub fn addr(&self) -> SocketAddr {
        match self {
            StartOutcome::Started(addr) | StartOutcome::AlreadyRunning(addr) => *addr,
        }
    }
}

/// Single-writer server lifecycle: `Stopped -> Listening -> Stopped`.
///
/// Owns the only cross-request shared resource (the listening socket).
/// `start` never creates a second concurrently-listening instance and
/// `stop` is safe to call when already stopped.
pub struct BridgeServer {
    listen: String,
    backend: Arc<dyn ModelBackend>,
    running: Option<Running>,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl BridgeServer {
    pub fn new(listen: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            listen: listen.into(),
            backend,
            running: None,
        }
    }

    /// Bind the configured address and start serving.
    ///
    /// A no-op reporting [`StartOutcome::AlreadyRunning`] when already
    /// listening. A serve task that died from a listener-level failure has
    /// already logged the error and is cleared here, so an explicit restart
    /// binds afresh.
    pub async fn start(&mut self) -> Result<StartOutcome> {
        if let Some(running) = &self.running {
            if running.task.is_finished() {
                self.running = None;
            } else {
                tracing::info!(addr = %running.local_addr, "Bridge server already running");
                return Ok(StartOutcome::AlreadyRunning(running.local_addr));
            }
        }

        let listener = TcpListener::bind(&self.listen).await.map_err(Error::Listener)?;
        let local_addr = listener.local_addr().map_err(Error::Listener)?;

        let app = create_router(AppState {
            backend: self.backend.clone(),
        });

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal.cancelled_owned())
                .await
            {
                tracing::error!(error = %e, "Bridge server listener failed");
            }
        });

        tracing::info!(addr = %local_addr, "Bridge server listening");
        self.running = Some(Running {
            local_addr,
            shutdown,
            task,
        });
        Ok(StartOutcome::Started(local_addr))
    }

    /// Release the listening socket and wait for the serve task to exit.
    /// A no-op when already stopped.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            tracing::debug!("Bridge server already stopped");
            return;
        };

        running.shutdown.cancel();
        if let Err(e) = running.task.await {
            tracing::error!(error = %e, "Bridge server task failed during shutdown");
        }
        tracing::info!("Bridge server stopped");
    }

    /// The bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}
