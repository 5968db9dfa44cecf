use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub rate_limit: RateLimitConfig,
    pub ledger: LedgerConfig,
    pub harvest: HarvestConfig,
    pub classifier: ClassifierConfig,
    pub filters: FilterConfig,
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub per_page: u8,
    /// Qualifiers appended to every keyword search
    pub search_qualifiers: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            search_qualifiers: "in:comments type:pr is:merged".to_string(),
        }
    }
}

/// Cool-down periods applied when a provider throttles us
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Wait after a throttled search or comment fetch
    pub search_wait_secs: u64,
    /// Wait after a throttled page of the full PR listing
    pub listing_wait_secs: u64,
    /// Wait after the LLM provider throttles a classification
    pub classifier_wait_secs: u64,
    pub heartbeat_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            search_wait_secs: 90 * 60,
            listing_wait_secs: 65 * 60,
            classifier_wait_secs: 90 * 60,
            heartbeat_secs: 10 * 60,
        }
    }
}

impl RateLimitConfig {
    pub fn search_wait(&self) -> Duration {
        Duration::from_secs(self.search_wait_secs)
    }

    pub fn listing_wait(&self) -> Duration {
        Duration::from_secs(self.listing_wait_secs)
    }

    pub fn classifier_wait(&self) -> Duration {
        Duration::from_secs(self.classifier_wait_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// Ledger checkpointing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Buffered completions that force a flush
    pub flush_threshold: usize,
    /// Successful items between checkpoints
    pub checkpoint_every: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 100,
            checkpoint_every: 10,
        }
    }
}

/// Keyword harvest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// JSON array of search keywords
    pub word_list: PathBuf,
    /// Root of `<owner>/<repo>/...` output trees
    pub data_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            word_list: PathBuf::from("word_list.json"),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// LLM backend used for classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-5-mini",
            Provider::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub provider: Provider,
    /// Model name, provider default when unset
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Language the model should explain its reasoning in
    pub reason_language: String,
    /// Override the provider API base URL
    pub base_url: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            temperature: None,
            reason_language: "Japanese".to_string(),
            base_url: None,
        }
    }
}

impl ClassifierConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// Comment filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Issue comments whose trimmed body starts with one of these are dropped
    pub drop_comment_prefixes: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            drop_comment_prefixes: vec!["## Stats from current PR".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.prscan/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".prscan/config.yml")
    }
}

/// Load the keyword list, a JSON array of strings
pub fn load_keywords(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read word list file: {}", path.display()))?;

    let words: Vec<String> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse word list JSON: {}", path.display()))?;

    Ok(words
        .into_iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.per_page, 100);
        assert_eq!(config.rate_limit.search_wait(), Duration::from_secs(5400));
        assert_eq!(config.rate_limit.listing_wait(), Duration::from_secs(3900));
        assert_eq!(config.rate_limit.heartbeat(), Duration::from_secs(600));
        assert_eq!(config.ledger.flush_threshold, 100);
        assert_eq!(config.ledger.checkpoint_every, 10);
        assert_eq!(config.classifier.model(), "gpt-5-mini");
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r###"
rate_limit:
  search_wait_secs: 60
  heartbeat_secs: 5

classifier:
  provider: anthropic

filters:
  drop_comment_prefixes:
    - "## Coverage report"
"###;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limit.search_wait_secs, 60);
        assert_eq!(config.rate_limit.listing_wait_secs, 3900);
        assert_eq!(config.classifier.provider, Provider::Anthropic);
        assert_eq!(config.classifier.model(), "claude-sonnet-4-20250514");
        assert_eq!(config.filters.drop_comment_prefixes, vec!["## Coverage report"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.yml")).unwrap();
        assert_eq!(config.harvest.word_list, PathBuf::from("word_list.json"));
    }

    #[test]
    fn test_load_keywords() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("word_list.json");
        fs::write(&path, r#"["sql injection", "  xss ", ""]"#).unwrap();

        let words = load_keywords(&path).unwrap();
        assert_eq!(words, vec!["sql injection", "xss"]);
    }

    #[test]
    fn test_load_keywords_rejects_non_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("word_list.json");
        fs::write(&path, r#"{"words": []}"#).unwrap();

        assert!(load_keywords(&path).is_err());
    }
}
