use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{build_user_prompt, error_from_response, parse_verdict, Classifier, SYSTEM_PROMPT};
use crate::error::ApiError;
use crate::models::Verdict;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Classifier backed by the Anthropic messages API
pub struct AnthropicClassifier {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    reason_language: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    system: String,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicClassifier {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            reason_language: "Japanese".to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_reason_language(mut self, language: &str) -> Self {
        self.reason_language = language.to_string();
        self
    }
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    #[instrument(skip(self, conversation), fields(model = %self.model, bytes = conversation.len()))]
    async fn classify(&self, conversation: &[u8]) -> Result<Verdict, ApiError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: build_user_prompt(conversation, &self.reason_language),
            }],
            system: SYSTEM_PROMPT.to_string(),
        };

        debug!("Sending request to Anthropic API");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let anthropic_response: AnthropicResponse = response.json().await?;

        // Claude may wrap the JSON in markdown; parse_verdict strips it
        let content = anthropic_response
            .content
            .first()
            .map(|c| c.text.as_str())
            .unwrap_or_default();

        parse_verdict(content)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitPolicy;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_classify_reads_fenced_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": "```json\n{\"relevant_discussion\": \"\", \"reason\": \"\"}\n```"
                }]
            })))
            .mount(&server)
            .await;

        let adapter = AnthropicClassifier::new("test-key".to_string()).with_base_url(&server.uri());
        let verdict = adapter.classify(b"{}").await.unwrap();

        assert_eq!(verdict, Verdict::default());
    }

    #[tokio::test]
    async fn test_429_without_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("too many requests"))
            .mount(&server)
            .await;

        let adapter = AnthropicClassifier::new("k".to_string()).with_base_url(&server.uri());
        let err = adapter.classify(b"{}").await.unwrap_err();

        assert!(matches!(err, ApiError::RateLimited { reset_at: None, .. }));
        assert!(RateLimitPolicy::classifier().is_rate_limited(&err));
    }

    #[tokio::test]
    async fn test_empty_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": []})),
            )
            .mount(&server)
            .await;

        let adapter = AnthropicClassifier::new("k".to_string()).with_base_url(&server.uri());
        let err = adapter.classify(b"{}").await.unwrap_err();

        assert!(matches!(err, ApiError::Malformed(_)));
    }
}
