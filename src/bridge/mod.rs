//! HTTP bridge server module.
//!
//! This module provides the single-route HTTP surface of the bridge:
//! body decoding, the streaming relay, and the server lifecycle.

pub mod body;
pub mod relay;
mod server;
pub mod types;

pub use server::{create_router, AppState, BridgeServer, RequestId, StartOutcome};
pub use types::{ChatRequest, DEFAULT_VENDOR};
