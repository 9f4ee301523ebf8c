//! Scripted transport for failover tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerateContentRequest, GenerativeTransport, HttpReply, LlmError, ModelInfo};

/// Replies are queued per model and consumed in order. A model with an
/// empty queue answers 500 so an unexpected call fails loudly.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Result<HttpReply, LlmError>>>>,
    listing: Mutex<Option<Vec<ModelInfo>>>,
    calls: Mutex<Vec<String>>,
    listing_calls: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(self, ids: &[&str]) -> Self {
        let models = ids
            .iter()
            .map(|id| ModelInfo {
                name: format!("models/{}", id),
                supported_generation_methods: vec!["generateContent".to_string()],
            })
            .collect();
        *self.listing.lock().unwrap() = Some(models);
        self
    }

    pub fn reply(self, model: &str, status: u16, body: &str) -> Self {
        self.push(model, Ok(HttpReply::new(status, body)))
    }

    pub fn network_error(self, model: &str) -> Self {
        self.push(
            model,
            Err(LlmError::network_error("connection reset".to_string())),
        )
    }

    pub fn program(self, model: &str, source: &str) -> Self {
        let body = success_body(&format!("```rust\n{}\n```", source));
        self.reply(model, 200, &body)
    }

    fn push(self, model: &str, reply: Result<HttpReply, LlmError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Models in the order they were called.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn listing_calls(&self) -> usize {
        *self.listing_calls.lock().unwrap()
    }
}

/// A 200 body whose first candidate text is `text`.
pub fn success_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string()
}

#[async_trait]
impl GenerativeTransport for ScriptedTransport {
    async fn generate_content(
        &self,
        model: &str,
        _request: &GenerateContentRequest,
    ) -> Result<HttpReply, LlmError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.replies
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(HttpReply::new(500, format!("unscripted call to {}", model))))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        *self.listing_calls.lock().unwrap() += 1;
        self.listing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LlmError::network_error("listing unavailable".to_string()))
    }
}
