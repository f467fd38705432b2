//! llm-bridge - Local HTTP bridge for streaming language-model chat
//!
//! This library provides the core functionality for the bridge: request
//! decoding, model selection, the streaming relay, and server lifecycle.

pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
