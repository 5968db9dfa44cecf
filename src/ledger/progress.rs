use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use tracing::{debug, info, warn};

use super::LedgerStore;
use crate::models::PrNumber;

/// Set of completed PRs with a buffer of completions not yet persisted.
///
/// `contains` answers from memory; `add` buffers and flushes once the buffer reaches
/// `flush_threshold`. A flush re-reads the store and writes the union back, so ids
/// persisted by someone else since `load` are never dropped.
pub struct ProgressLedger<S: LedgerStore> {
    store: S,
    done: HashSet<PrNumber>,
    pending: Vec<PrNumber>,
    flush_threshold: usize,
}

impl<S: LedgerStore> ProgressLedger<S> {
    /// Load the persisted set. A missing store starts empty; an unreadable one is fatal.
    pub fn load(store: S, flush_threshold: usize) -> Result<Self> {
        let done: HashSet<PrNumber> = store.read()?.unwrap_or_default().into_iter().collect();

        if done.is_empty() {
            info!(ledger = %store.describe(), "Starting with an empty ledger");
        } else {
            info!(ledger = %store.describe(), count = done.len(), "Loaded previously processed PRs");
        }

        Ok(Self {
            store,
            done,
            pending: Vec::new(),
            flush_threshold: flush_threshold.max(1),
        })
    }

    pub fn contains(&self, id: PrNumber) -> bool {
        self.done.contains(&id)
    }

    /// Record a completed item, flushing when the buffer is full
    pub fn add(&mut self, id: PrNumber) -> Result<()> {
        if !self.done.insert(id) {
            return Ok(());
        }
        self.pending.push(id);

        if self.pending.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Merge buffered completions into the store
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut merged = match self.store.read() {
            Ok(persisted) => persisted.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Could not re-read ledger before flush, rewriting from memory");
                BTreeSet::new()
            }
        };
        merged.extend(self.pending.iter().copied());
        merged.extend(self.done.iter().copied());

        self.store.write(&merged)?;

        debug!(
            flushed = self.pending.len(),
            total = merged.len(),
            "Checkpointed ledger"
        );

        self.done.extend(merged);
        self.pending.clear();
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::JsonLedgerFile;
    use std::fs;
    use tempfile::tempdir;

    fn read_ids(store: &JsonLedgerFile) -> BTreeSet<PrNumber> {
        store.read().unwrap().unwrap_or_default()
    }

    #[test]
    fn test_load_absent_is_empty() {
        let dir = tempdir().unwrap();
        let ledger = ProgressLedger::load(JsonLedgerFile::new(dir.path().join("l.json")), 100).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains(1));
    }

    #[test]
    fn test_load_corrupt_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("l.json");
        fs::write(&path, "[1, 2,").unwrap();
        assert!(ProgressLedger::load(JsonLedgerFile::new(&path), 100).is_err());
    }

    #[test]
    fn test_add_is_visible_before_flush() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));
        let mut ledger = ProgressLedger::load(store.clone(), 100).unwrap();

        ledger.add(5).unwrap();

        assert!(ledger.contains(5));
        assert_eq!(ledger.pending_len(), 1);
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_threshold_triggers_flush() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));
        let mut ledger = ProgressLedger::load(store.clone(), 3).unwrap();

        ledger.add(1).unwrap();
        ledger.add(2).unwrap();
        assert!(store.read().unwrap().is_none());

        ledger.add(3).unwrap();
        assert_eq!(ledger.pending_len(), 0);
        assert_eq!(read_ids(&store), BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_huge_threshold_only_flushes_on_demand() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));
        let mut ledger = ProgressLedger::load(store.clone(), usize::MAX).unwrap();

        ledger.add(1).unwrap();
        assert_eq!(ledger.pending_len(), 1);
        assert!(store.read().unwrap().is_none());

        ledger.flush().unwrap();
        assert_eq!(read_ids(&store), BTreeSet::from([1]));
    }

    #[test]
    fn test_duplicate_add_is_not_buffered() {
        let dir = tempdir().unwrap();
        let mut ledger =
            ProgressLedger::load(JsonLedgerFile::new(dir.path().join("l.json")), 100).unwrap();
        ledger.add(9).unwrap();
        ledger.add(9).unwrap();
        assert_eq!(ledger.pending_len(), 1);
    }

    #[test]
    fn test_flush_empty_buffer_is_noop() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));
        let mut ledger = ProgressLedger::load(store.clone(), 100).unwrap();

        ledger.flush().unwrap();

        assert!(!store.path().exists());
    }

    #[test]
    fn test_flush_preserves_external_writes() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));
        store.write(&BTreeSet::from([1, 2, 3])).unwrap();

        let mut ledger = ProgressLedger::load(store.clone(), 100).unwrap();
        ledger.add(4).unwrap();
        ledger.add(5).unwrap();

        // Another process records 6 after we loaded
        store.write(&BTreeSet::from([1, 2, 3, 6])).unwrap();

        ledger.flush().unwrap();

        assert_eq!(read_ids(&store), BTreeSet::from([1, 2, 3, 4, 5, 6]));
        assert!(ledger.contains(6));
    }

    #[test]
    fn test_flush_rewrites_when_store_became_corrupt() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));
        store.write(&BTreeSet::from([1])).unwrap();

        let mut ledger = ProgressLedger::load(store.clone(), 100).unwrap();
        ledger.add(2).unwrap();
        fs::write(store.path(), "garbage").unwrap();

        ledger.flush().unwrap();

        assert_eq!(read_ids(&store), BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_unflushed_items_are_lost_on_interrupt() {
        let dir = tempdir().unwrap();
        let store = JsonLedgerFile::new(dir.path().join("l.json"));

        {
            let mut ledger = ProgressLedger::load(store.clone(), 100).unwrap();
            ledger.add(1).unwrap();
            ledger.flush().unwrap();
            ledger.add(10).unwrap();
            ledger.add(11).unwrap();
            // dropped without flushing
        }

        let mut next_run = ProgressLedger::load(store.clone(), 100).unwrap();
        assert!(next_run.contains(1));
        assert!(!next_run.contains(10));
        assert!(!next_run.contains(11));

        next_run.add(10).unwrap();
        next_run.add(11).unwrap();
        next_run.flush().unwrap();
        assert_eq!(read_ids(&store), BTreeSet::from([1, 10, 11]));
    }
}
