//! Chat request types.

use serde::Deserialize;

use crate::backend::ModelSelector;

/// Vendor used when the request does not name one.
pub const DEFAULT_VENDOR: &str = "copilot";

/// An incoming chat request.
///
/// `prompt` is kept as a raw JSON value so that an absent, empty, or
/// non-string prompt is a validation failure (400), never a
/// deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    prompt: serde_json::Value,
    pub vendor: Option<String>,
    pub family: Option<String>,
    /// Opaque options, passed through verbatim to the model invocation.
    pub options: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ChatRequest {
    /// The prompt, if present as a non-empty string.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_str().filter(|s| !s.is_empty())
    }

    /// The selector for this request, applying the vendor default.
    pub fn selector(&self) -> ModelSelector {
        ModelSelector {
            vendor: self
                .vendor
                .clone()
                .unwrap_or_else(|| DEFAULT_VENDOR.to_string()),
            family: self.family.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> ChatRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn prompt_present() {
        let req = parse(serde_json::json!({ "prompt": "hello" }));
        assert_eq!(req.prompt(), Some("hello"));
    }

    #[test]
    fn prompt_absent() {
        let req = parse(serde_json::json!({}));
        assert_eq!(req.prompt(), None);
    }

    #[test]
    fn prompt_empty_string() {
        let req = parse(serde_json::json!({ "prompt": "" }));
        assert_eq!(req.prompt(), None);
    }

    #[test]
    fn prompt_non_string() {
        let req = parse(serde_json::json!({ "prompt": 42 }));
        assert_eq!(req.prompt(), None);
    }

    #[test]
    fn selector_defaults_vendor() {
        let req = parse(serde_json::json!({ "prompt": "hi" }));
        let selector = req.selector();
        assert_eq!(selector.vendor, DEFAULT_VENDOR);
        assert!(selector.family.is_none());
    }

    #[test]
    fn selector_uses_request_fields() {
        let req = parse(serde_json::json!({
            "prompt": "hi",
            "vendor": "local",
            "family": "llama-3.1",
        }));
        let selector = req.selector();
        assert_eq!(selector.vendor, "local");
        assert_eq!(selector.family.as_deref(), Some("llama-3.1"));
    }

    #[test]
    fn options_pass_through() {
        let req = parse(serde_json::json!({
            "prompt": "hi",
            "options": { "temperature": 0.2, "max_tokens": 64 },
        }));
        let options = req.options.unwrap();
        assert_eq!(options["temperature"], serde_json::json!(0.2));
        assert_eq!(options["max_tokens"], serde_json::json!(64));
    }
}
