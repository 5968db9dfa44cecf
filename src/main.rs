use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prscan::config::load_keywords;
use prscan::{
    build_classifier, classify_directory, fetch_all_pulls, harvest_keywords, parse_repository,
    strip_directory, Config, GitHubClient,
};

#[derive(Parser)]
#[command(name = "prscan")]
#[command(about = "Harvest pull request discussions and flag security findings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a repository for each keyword and save matching PR discussions
    Harvest {
        /// Repository (owner/repo or GitHub URL)
        repo: String,

        /// GitHub token; anonymous requests are heavily rate limited
        #[arg(env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Save the full detail of every PR in a repository
    FetchAll {
        /// Repository (owner/repo or GitHub URL)
        repo: String,

        /// GitHub token
        #[arg(env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Classify saved discussions with an LLM
    Classify {
        /// Directory of <pr>.json discussion files
        input_dir: PathBuf,

        /// JSONL file results are appended to
        output_file: PathBuf,

        /// Provider API key (falls back to OPENAI_API_KEY or ANTHROPIC_API_KEY)
        api_key: Option<String>,
    },

    /// Remove bot comments from saved discussions
    StripStats {
        /// Directory to rewrite (defaults to harvest.data_dir)
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("prscan=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::load_default()?;

    match cli.command {
        Commands::Harvest { repo, token } => run_harvest(&config, &repo, token).await?,
        Commands::FetchAll { repo, token } => run_fetch_all(&config, &repo, &token).await?,
        Commands::Classify {
            input_dir,
            output_file,
            api_key,
        } => run_classify(&config, input_dir, output_file, api_key).await?,
        Commands::StripStats { dir } => run_strip(&config, dir)?,
    }

    Ok(())
}

async fn run_harvest(config: &Config, repo: &str, token: Option<String>) -> Result<()> {
    let repo = parse_repository(repo)?;
    let word_list = &config.harvest.word_list;
    let keywords = load_keywords(word_list)?;

    if keywords.is_empty() {
        warn!(path = %word_list.display(), "Word list is empty, nothing to search");
        return Ok(());
    }

    let token = token.filter(|t| !t.is_empty());
    if token.is_none() {
        warn!("No GitHub token provided, requests are limited to 60 per hour");
    }

    let client = GitHubClient::new(token.as_deref(), repo)?;
    let summary = harvest_keywords(&client, &keywords, config).await?;

    println!("{summary}");
    Ok(())
}

async fn run_fetch_all(config: &Config, repo: &str, token: &str) -> Result<()> {
    let repo = parse_repository(repo)?;
    let client = GitHubClient::new(Some(token), repo)?;
    let summary = fetch_all_pulls(&client, config).await?;

    println!("{summary}");
    Ok(())
}

async fn run_classify(
    config: &Config,
    input_dir: PathBuf,
    output_file: PathBuf,
    api_key: Option<String>,
) -> Result<()> {
    let key_env = config.classifier.provider.api_key_env();
    let api_key = match api_key {
        Some(key) => key,
        None => std::env::var(key_env)
            .with_context(|| format!("No API key given and {key_env} not set"))?,
    };

    let classifier = build_classifier(&config.classifier, api_key);
    info!(
        provider = classifier.name(),
        model = config.classifier.model(),
        "Using classifier"
    );

    let summary = classify_directory(classifier.as_ref(), &input_dir, &output_file, config).await?;

    println!("{summary}");
    Ok(())
}

fn run_strip(config: &Config, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.harvest.data_dir.clone());
    let report = strip_directory(&dir, &config.filters.drop_comment_prefixes)?;

    println!("{report}");
    Ok(())
}
