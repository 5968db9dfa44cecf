use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::LedgerStore;
use crate::models::PrNumber;

/// Ledger persisted as a JSON array of PR numbers
#[derive(Debug, Clone)]
pub struct JsonLedgerFile {
    path: PathBuf,
}

impl JsonLedgerFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Ledger kept next to an output file: `out/results.jsonl` → `out/.results_index.json`
    pub fn beside(output_file: impl AsRef<Path>) -> Self {
        let output_file = output_file.as_ref();
        let stem = output_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = output_file.parent().unwrap_or_else(|| Path::new(""));
        Self::new(dir.join(format!(".{stem}_index.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LedgerStore for JsonLedgerFile {
    fn read(&self) -> Result<Option<BTreeSet<PrNumber>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ledger: {}", self.path.display()))?;

        let ids: Vec<PrNumber> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ledger: {}", self.path.display()))?;

        Ok(Some(ids.into_iter().collect()))
    }

    fn write(&self, ids: &BTreeSet<PrNumber>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create ledger directory: {}", dir.display()))?;
        }

        let ids: Vec<PrNumber> = ids.iter().copied().collect();
        let content = serde_json::to_string_pretty(&ids)?;

        // Write then rename so an interrupted flush never leaves a truncated ledger
        let tmp = self.temp_path();
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write ledger: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace ledger: {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = ids.len(), "Wrote ledger");

        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join(".processed_prs.json"));
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("nested/.processed_prs.json"));

        store.write(&BTreeSet::from([3, 1, 2])).unwrap();

        let ids = store.read().unwrap().unwrap();
        assert_eq!(ids, BTreeSet::from([1, 2, 3]));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".processed_prs.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonLedgerFile::new(&path);
        let err = store.read().unwrap_err();
        assert!(err.to_string().contains("Failed to parse ledger"));
    }

    #[test]
    fn test_beside_output_file() {
        let store = JsonLedgerFile::beside("out/results.jsonl");
        assert_eq!(store.path(), Path::new("out/.results_index.json"));

        let store = JsonLedgerFile::beside("results.jsonl");
        assert_eq!(store.path(), Path::new(".results_index.json"));
    }
}
