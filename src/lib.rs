pub mod adapters;
pub mod backoff;
pub mod config;
pub mod error;
pub mod fetch;
pub mod github;
pub mod ledger;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod rate_limit;

pub use adapters::{build_classifier, Classifier};
pub use config::Config;
pub use error::ApiError;
pub use github::{parse_repository, GitHubClient, PullRequestSource};
pub use ledger::{JsonLedgerFile, LedgerStore, ProgressLedger};
pub use models::*;
pub use pipeline::{classify_directory, fetch_all_pulls, harvest_keywords, strip_directory};
