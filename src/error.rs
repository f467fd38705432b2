//! Error types for llm-bridge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for llm-bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for llm-bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Failed to parse request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("Prompt is required in the request body.")]
    MissingPrompt,

    #[error("{}", no_model_message(.vendor, .family))]
    NoModelAvailable {
        vendor: String,
        family: Option<String>,
    },

    #[error("{0}")]
    Invocation(String),

    #[error("Listener error: {0}")]
    Listener(#[source] std::io::Error),

    #[error("I/O error while reading request: {0}")]
    Io(#[from] std::io::Error),
}

fn no_model_message(vendor: &str, family: &Option<String>) -> String {
    match family {
        Some(family) => format!(
            "No suitable language model found for vendor '{}' and family '{}'.",
            vendor, family
        ),
        None => format!("No suitable language model found for vendor '{}'.", vendor),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::MissingPrompt => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": self.to_string() }),
            ),
            Error::NoModelAvailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": self.to_string() }),
            ),
            // Everything else surfaces as an opaque processing failure; the
            // underlying diagnostic travels in "details".
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": "Failed to process chat request.",
                    "details": self.to_string(),
                }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
