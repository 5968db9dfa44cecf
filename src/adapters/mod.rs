pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClassifier;
pub use openai::OpenAiClassifier;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::{ClassifierConfig, Provider};
use crate::error::ApiError;
use crate::models::Verdict;

/// Decides whether a PR discussion talks about a security vulnerability.
///
/// Implementations make exactly one provider call per `classify`; retrying on rate
/// limits is the caller's job.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, conversation: &[u8]) -> Result<Verdict, ApiError>;

    fn name(&self) -> &str;
}

/// Build the classifier selected in the configuration
pub fn build_classifier(config: &ClassifierConfig, api_key: String) -> Box<dyn Classifier> {
    match config.provider {
        Provider::OpenAi => {
            let mut adapter = OpenAiClassifier::new(api_key)
                .with_model(config.model())
                .with_reason_language(&config.reason_language);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url);
            }
            if let Some(t) = config.temperature {
                adapter = adapter.with_temperature(t);
            }
            Box::new(adapter)
        }
        Provider::Anthropic => {
            let mut adapter = AnthropicClassifier::new(api_key)
                .with_model(config.model())
                .with_reason_language(&config.reason_language);
            if let Some(url) = &config.base_url {
                adapter = adapter.with_base_url(url);
            }
            Box::new(adapter)
        }
    }
}

pub(crate) const SYSTEM_PROMPT: &str =
    "Analyze code review discussions for security vulnerability findings. Return JSON only.";

pub(crate) fn build_user_prompt(conversation: &[u8], reason_language: &str) -> String {
    let conversation = String::from_utf8_lossy(conversation);

    format!(
        r#"Analyze this code review conversation for security vulnerability findings.

Conversation:
{conversation}

Return JSON:
{{
  "relevant_discussion": "excerpt if vulnerability found, else empty string",
  "reason": "explanation in {reason_language} if found, else empty string"
}}"#
    )
}

/// Turn a non-success provider response into an `ApiError`.
///
/// A 429 becomes `RateLimited`, carrying the `retry-after` deadline when the
/// provider sends one.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());
    let body = response.text().await.unwrap_or_default();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ApiError::RateLimited {
            reset_at: retry_after.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            message: body,
        };
    }

    ApiError::Status {
        status: status.as_u16(),
        message: body,
    }
}

/// Extract JSON from a response that may contain markdown code blocks
pub(crate) fn extract_json(content: &str) -> &str {
    if let Some(start) = content.find("```json") {
        let json_start = start + 7;
        if let Some(end) = content[json_start..].find("```") {
            return content[json_start..json_start + end].trim();
        }
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            return &content[start..=end];
        }
    }

    content
}

/// Parse the model's JSON answer into a verdict
pub(crate) fn parse_verdict(content: &str) -> Result<Verdict, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::Malformed("empty content in response".to_string()));
    }
    serde_json::from_str(extract_json(content))
        .map_err(|e| ApiError::Malformed(format!("failed to parse verdict JSON: {e}")))
}
