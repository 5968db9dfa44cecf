use crate::error::ApiError;

/// Which part of a failure identified it as provider throttling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitSignal {
    StatusCode(u16),
    MessagePattern,
    StructuredRateLimit,
}

/// Provider-specific rules for recognizing a rate-limit failure.
///
/// GitHub answers abuse limits with 403 and secondary limits with 429, while the
/// LLM providers only ever throttle with 429.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    status_codes: Vec<u16>,
}

const MESSAGE_PATTERN: &str = "rate limit";

impl RateLimitPolicy {
    pub fn new(status_codes: Vec<u16>) -> Self {
        Self { status_codes }
    }

    pub fn github() -> Self {
        Self::new(vec![403, 429])
    }

    pub fn classifier() -> Self {
        Self::new(vec![429])
    }

    /// Check whether a failure represents provider throttling
    pub fn is_rate_limited(&self, err: &ApiError) -> bool {
        self.signal(err).is_some()
    }

    /// Return the first signal that marks the failure as throttling, if any
    pub fn signal(&self, err: &ApiError) -> Option<RateLimitSignal> {
        if matches!(err, ApiError::RateLimited { .. }) {
            return Some(RateLimitSignal::StructuredRateLimit);
        }

        let text = err.to_string();
        if let ApiError::Status { status, .. } = err {
            if self.status_codes.contains(status) {
                return Some(RateLimitSignal::StatusCode(*status));
            }
        }
        if let Some(code) = self
            .status_codes
            .iter()
            .copied()
            .find(|code| contains_code(&text, *code))
        {
            return Some(RateLimitSignal::StatusCode(code));
        }

        if text.to_lowercase().contains(MESSAGE_PATTERN) {
            return Some(RateLimitSignal::MessagePattern);
        }

        None
    }
}

/// True when `code` appears in `text` as a standalone number (so PR #14290 is not a 429)
fn contains_code(text: &str, code: u16) -> bool {
    let needle = code.to_string();
    let bytes = text.as_bytes();

    text.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = start.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(end).copied();
        !before.is_some_and(|b| b.is_ascii_digit()) && !after.is_some_and(|b| b.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_status_code_in_text() {
        let policy = RateLimitPolicy::classifier();
        let err = ApiError::Other("request failed with status 429".to_string());
        assert_eq!(policy.signal(&err), Some(RateLimitSignal::StatusCode(429)));
    }

    #[test]
    fn test_structured_status() {
        let policy = RateLimitPolicy::github();
        let err = ApiError::Status {
            status: 403,
            message: "You have exceeded a secondary limit".to_string(),
        };
        assert_eq!(policy.signal(&err), Some(RateLimitSignal::StatusCode(403)));
    }

    #[test]
    fn test_403_not_throttling_for_classifier() {
        let policy = RateLimitPolicy::classifier();
        let err = ApiError::Status {
            status: 403,
            message: "invalid organization".to_string(),
        };
        assert!(!policy.is_rate_limited(&err));
    }

    #[test]
    fn test_message_pattern_case_insensitive() {
        let policy = RateLimitPolicy::github();
        let err = ApiError::Other("Rate Limit Exceeded".to_string());
        assert_eq!(policy.signal(&err), Some(RateLimitSignal::MessagePattern));
    }

    #[test]
    fn test_structured_rate_limit_with_future_reset() {
        let policy = RateLimitPolicy::classifier();
        let err = ApiError::RateLimited {
            reset_at: Some(Utc::now() + Duration::minutes(30)),
            message: "quota exhausted".to_string(),
        };
        assert_eq!(
            policy.signal(&err),
            Some(RateLimitSignal::StructuredRateLimit)
        );
    }

    #[test]
    fn test_not_found_is_not_rate_limited() {
        let policy = RateLimitPolicy::github();
        let err = ApiError::Other("not found".to_string());
        assert!(!policy.is_rate_limited(&err));

        let err = ApiError::Status {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert!(!policy.is_rate_limited(&err));
    }

    #[test]
    fn test_code_must_stand_alone() {
        assert!(contains_code("HTTP 429: Too Many Requests", 429));
        assert!(contains_code("429", 429));
        assert!(!contains_code("failed to fetch PR #14290", 429));
        assert!(!contains_code("id 40312", 403));
    }
}
