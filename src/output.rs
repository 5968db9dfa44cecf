use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::PrNumber;

/// Write `value` as pretty JSON to `<dir>/<number>.json`, replacing any previous copy
pub fn write_item_file<T: Serialize>(dir: &Path, number: PrNumber, value: &T) -> Result<PathBuf> {
    let path = dir.join(format!("{number}.json"));
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize PR #{number}"))?;

    fs::write(&path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    Ok(path)
}

/// Create an output directory and everything above it
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

/// Directory name for a search keyword; path separators become underscores and
/// names that would resolve outside the keyword's own directory become `_`
pub fn keyword_dir_name(keyword: &str) -> String {
    let name: String = keyword
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();

    match name.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => name,
    }
}

/// Append-only JSON Lines file; existing lines are never rewritten
#[derive(Debug, Clone)]
pub struct JsonlWriter {
    path: PathBuf,
}

impl JsonlWriter {
    /// Create the file (and its directory) if needed without truncating it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            ensure_dir(dir)?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;

        Ok(Self { path })
    }

    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize result")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open output file: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to write result: {}", self.path.display()))?;

        Ok(())
    }

    /// Number of non-blank lines in the file
    pub fn count_lines(&self) -> Result<usize> {
        let file = fs::File::open(&self.path)
            .with_context(|| format!("Failed to open output file: {}", self.path.display()))?;

        let mut count = 0;
        for line in BufReader::new(file).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
