//! Streaming relay: one validated chat request in, one streamed response out.
//!
//! The relay owns the per-request cancellation token. Fragments are pushed
//! through a bounded channel whose receiving half is the response body; when
//! the client disconnects the receiver drops, the session observes the closed
//! channel, cancels the token once, and stops consuming the model stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::backend::{select_model, FragmentStream, Message, ModelBackend, ModelHandle};
use crate::bridge::types::ChatRequest;
use crate::error::Error;

/// Channel depth between the model consumer and the response body.
const FRAGMENT_BUFFER: usize = 16;

/// Relay one chat request to a model and stream its output back.
///
/// Validation and selection failures produce structured error responses
/// before any model work; once a model is selected the response headers are
/// committed and every later failure is surfaced inline in the stream.
pub async fn relay_chat(backend: Arc<dyn ModelBackend>, request: ChatRequest) -> Response {
    let Some(prompt) = request.prompt() else {
        tracing::info!("Rejecting chat request without prompt");
        return Error::MissingPrompt.into_response();
    };

    let selector = request.selector();
    let model = match select_model(backend.as_ref(), &selector).await {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!(
                vendor = %selector.vendor,
                family = ?selector.family,
                error = %e,
                "Model selection failed"
            );
            return e.into_response();
        }
    };

    tracing::info!(
        model = model.id(),
        vendor = %selector.vendor,
        "Relaying chat request"
    );

    let messages = vec![Message::user(prompt)];
    let options = request.options.clone();

    let (tx, rx) = mpsc::channel::<Bytes>(FRAGMENT_BUFFER);
    let session = StreamSession::new(tx);
    tokio::spawn(run_session(model, messages, options, session));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(body)
        .unwrap()
}

/// Per-request stream state: one per in-flight request, owned by the
/// session task that created it.
struct StreamSession {
    cancel: CancellationToken,
    tx: mpsc::Sender<Bytes>,
    ended: bool,
}

impl StreamSession {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            tx,
            ended: false,
        }
    }

    /// Write one fragment to the response. Returns false once the client
    /// is gone; nothing is written after the session has ended.
    async fn write(&mut self, text: String) -> bool {
        if self.ended {
            return false;
        }
        if self.tx.send(Bytes::from(text)).await.is_err() {
            self.disconnected();
            return false;
        }
        true
    }

    /// The client went away. Cancels the token exactly once; a no-op if the
    /// session already ended.
    fn disconnected(&mut self) {
        if !self.ended {
            self.ended = true;
            self.cancel.cancel();
        }
    }

    /// Normal end of the session; later disconnects are no-ops.
    fn finish(&mut self) {
        self.ended = true;
    }
}

/// One step of the consume loop, computed inside the select and acted on
/// outside it.
enum Step {
    Disconnected,
    Fragment(String),
    Failed(Error),
    Done,
}

async fn run_session(
    model: Arc<dyn ModelHandle>,
    messages: Vec<Message>,
    options: Option<crate::backend::InvokeOptions>,
    mut session: StreamSession,
) {
    let mut stream: FragmentStream = match model
        .invoke(messages, options, session.cancel.clone())
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            // Headers are already committed; the error travels inline.
            tracing::error!(model = model.id(), error = %e, "Model invocation failed");
            session.write(error_marker(&e)).await;
            session.finish();
            return;
        }
    };

    loop {
        let step = tokio::select! {
            _ = session.tx.closed() => Step::Disconnected,
            next = stream.next() => match next {
                Some(Ok(fragment)) => Step::Fragment(fragment),
                Some(Err(e)) => Step::Failed(e),
                None => Step::Done,
            },
        };

        match step {
            Step::Fragment(fragment) => {
                if !session.write(fragment).await {
                    break;
                }
            }
            Step::Disconnected => {
                tracing::debug!(model = model.id(), "Client disconnected mid-stream");
                session.disconnected();
                break;
            }
            Step::Failed(e) => {
                tracing::error!(model = model.id(), error = %e, "Error while streaming from model");
                session.write(error_marker(&e)).await;
                break;
            }
            Step::Done => break,
        }
    }

    session.finish();
    // Dropping the sender finalizes the response body.
}

fn error_marker(e: &Error) -> String {
    format!("\nError from LLM service: {e}\n")
}
