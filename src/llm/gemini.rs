//! Gemini REST API transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::error::LlmError;
use super::{GenerateContentRequest, GenerativeTransport, HttpReply, ModelInfo, ModelList};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini API client.
///
/// Does not retry on its own: every reply, including 429s, is handed back to
/// the failover orchestrator which owns the retry policy.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client for `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/models/{id}:generateContent`
    fn generate_url(&self, model: &str) -> String {
        let resource = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        format!("{}/{}:generateContent", self.base_url, resource)
    }

    fn map_send_error(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::network_error(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::network_error(format!("Connection failed: {}", e))
        } else {
            LlmError::network_error(format!("Request failed: {}", e))
        }
    }
}

#[async_trait]
impl GenerativeTransport for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<HttpReply, LlmError> {
        tracing::debug!(model = %model, "Sending generateContent request");

        let response = self
            .client
            .post(self.generate_url(model))
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read body: {}", e)))?;

        Ok(HttpReply::new(status, body))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::from_reply(status.as_u16(), &body));
        }

        let parsed: ModelList = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse model list: {}", e))
        })?;
        Ok(parsed.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn generate_url_adds_resource_prefix_once() {
        let client = GeminiClient::new("k".to_string(), "https://host/v1beta/");
        assert_eq!(
            client.generate_url("gemini-2.0-flash"),
            "https://host/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            client.generate_url("models/gemini-2.0-flash"),
            "https://host/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn generate_posts_prompt_with_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .match_body(Matcher::Json(serde_json::json!({
                "contents": [{ "parts": [{ "text": "hello" }] }]
            })))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#)
            .create_async()
            .await;

        let client = GeminiClient::new("secret".to_string(), server.url());
        let reply = client
            .generate_content("gemini-test", &GenerateContentRequest::from_prompt("hello"))
            .await
            .expect("reply");

        assert_eq!(reply.status, 200);
        assert!(reply.body.contains("\"ok\""));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_passes_error_status_through() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("Please retry in 3s.")
            .create_async()
            .await;

        let client = GeminiClient::new("k".to_string(), server.url());
        let reply = client
            .generate_content("gemini-test", &GenerateContentRequest::from_prompt("x"))
            .await
            .expect("reply");
        assert_eq!(reply.status, 429);
        assert!(!reply.is_success());
    }

    #[tokio::test]
    async fn list_models_parses_listing() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/models")
            .match_query(Matcher::UrlEncoded("key".into(), "k".into()))
            .with_status(200)
            .with_body(
                r#"{"models":[{"name":"models/gemini-2.0-flash","supportedGenerationMethods":["generateContent"]}]}"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::new("k".to_string(), server.url());
        let models = client.list_models().await.expect("models");
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id(), "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn list_models_classifies_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/models")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let client = GeminiClient::new("k".to_string(), server.url());
        let err = client.list_models().await.unwrap_err();
        assert_eq!(err.kind, crate::llm::LlmErrorKind::Rejected);
        assert_eq!(err.status_code, Some(403));
    }
}
