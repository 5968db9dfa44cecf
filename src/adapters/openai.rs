use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{build_user_prompt, error_from_response, parse_verdict, Classifier, SYSTEM_PROMPT};
use crate::error::ApiError;
use crate::models::Verdict;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Classifier backed by OpenAI chat completions in JSON mode
pub struct OpenAiClassifier {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    reason_language: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: "gpt-5-mini".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
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

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_reason_language(mut self, language: &str) -> Self {
        self.reason_language = language.to_string();
        self
    }

    fn build_request(&self, conversation: &[u8]) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(conversation, &self.reason_language),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    #[instrument(skip(self, conversation), fields(model = %self.model, bytes = conversation.len()))]
    async fn classify(&self, conversation: &[u8]) -> Result<Verdict, ApiError> {
        let request = self.build_request(conversation);

        debug!("Sending request to OpenAI API");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let chat_response: ChatResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Malformed("no choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        parse_verdict(&content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
