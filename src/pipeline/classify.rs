use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::Batch;
use crate::adapters::Classifier;
use crate::backoff::{format_duration, Backoff};
use crate::config::Config;
use crate::fetch::Throttle;
use crate::ledger::{JsonLedgerFile, ProgressLedger};
use crate::models::{ClassificationRecord, PrNumber, ProcessOutcome, RunSummary};
use crate::output::JsonlWriter;
use crate::rate_limit::RateLimitPolicy;

/// Every `*.json` file under `dir`, excluding dotfiles, in path order
pub fn discover_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/*.json",
        glob::Pattern::escape(&dir.to_string_lossy())
    );

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).context("Invalid input directory pattern")? {
        let path = entry.context("Failed to read input directory")?;
        let hidden = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(true);
        if !hidden && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// PR number taken from a numeric file stem such as `1234.json`
pub fn pr_number_from_path(path: &Path) -> Option<PrNumber> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Read a discussion file, rejecting content that is not JSON
fn read_conversation(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_slice::<serde_json::Value>(&bytes)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(bytes)
}

/// Classify every discussion file under `input_dir`, appending one JSON line per PR
/// to `output_file`. Progress is kept in `.<output-stem>_index.json` next to it.
pub async fn classify_directory<C: Classifier + ?Sized>(
    classifier: &C,
    input_dir: &Path,
    output_file: &Path,
    config: &Config,
) -> Result<RunSummary> {
    if !input_dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", input_dir.display());
    }

    let writer = JsonlWriter::open(output_file)?;
    let throttle = Throttle::new(
        RateLimitPolicy::classifier(),
        Backoff::new(config.rate_limit.heartbeat()),
        config.rate_limit.classifier_wait(),
    );
    let ledger = ProgressLedger::load(
        JsonLedgerFile::beside(output_file),
        config.ledger.flush_threshold,
    )?;
    let mut batch = Batch::new(ledger, &throttle, config.ledger.checkpoint_every);

    let files = discover_json_files(input_dir)?;
    info!(
        input = %input_dir.display(),
        files = files.len(),
        classifier = classifier.name(),
        cool_down = %format_duration(throttle.wait()),
        "Starting classification"
    );

    let mut flagged = 0usize;
    for path in files {
        let Some(number) = pr_number_from_path(&path) else {
            warn!(path = %path.display(), "File name is not a PR number, skipping");
            continue;
        };
        batch.record_fetched(1);

        if batch.skip_if_done(number) {
            continue;
        }

        let conversation = match read_conversation(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                batch.fail(number, format!("{e:#}"));
                continue;
            }
        };

        let conversation = conversation.as_slice();
        let outcome = batch
            .drive(number, move || classifier.classify(conversation))
            .await?;

        if let ProcessOutcome::Success(verdict) = outcome {
            let record = ClassificationRecord::new(number, verdict);
            if record.is_flagged() {
                flagged += 1;
                info!(pr = number, reason = %record.reason, "Security discussion found");
            }
            if let Err(e) = writer.append(&record) {
                batch.fail(number, format!("{e:#}"));
                continue;
            }
            batch.complete(number)?;
        }
    }

    let summary = batch.finish()?;
    match writer.count_lines() {
        Ok(lines) => info!(
            output = %writer.path().display(),
            lines,
            flagged,
            "Classification results written"
        ),
        Err(e) => warn!(output = %writer.path().display(), error = %e, "Could not count output lines"),
    }

    Ok(summary)
}
