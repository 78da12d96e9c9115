//! Persistent ledger of processed message identifiers.
//!
//! A JSON array on disk, rewritten wholesale and flushed synchronously on
//! every append. The pipeline uses one instance for processed mail ids; the
//! notifier keeps its own file for sent notifications. Sequential processing
//! is the single-writer guarantee, so no lock lives here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

pub struct IdLedger {
    path: PathBuf,
    ids: HashSet<String>,
}

impl IdLedger {
    /// Load the ledger from disk. A missing file yields an empty ledger; an
    /// unreadable one is logged and treated as empty rather than blocking
    /// startup.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let ids = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ledger file unreadable, starting empty");
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, ids })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an identifier and flush the whole ledger before returning.
    /// Recording an already-known id is a no-op without a disk write.
    pub fn record(&mut self, id: &str) -> Result<(), LedgerError> {
        if self.ids.insert(id.to_string()) {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), LedgerError> {
        // Stable order on disk.
        let mut ids: Vec<&String> = self.ids.iter().collect();
        ids.sort();
        let json = serde_json::to_string_pretty(&ids)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IdLedger::load(dir.path().join("processed.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn record_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");

        let mut ledger = IdLedger::load(&path).unwrap();
        ledger.record("msg-1").unwrap();
        ledger.record("msg-2").unwrap();
        drop(ledger);

        let reloaded = IdLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("msg-1"));
        assert!(reloaded.contains("msg-2"));
        assert!(!reloaded.contains("msg-3"));
    }

    #[test]
    fn duplicate_record_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = IdLedger::load(dir.path().join("processed.json")).unwrap();
        ledger.record("msg-1").unwrap();
        ledger.record("msg-1").unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn flush_happens_on_every_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");

        let mut ledger = IdLedger::load(&path).unwrap();
        ledger.record("msg-1").unwrap();

        // The file must already hold the id; no explicit save step exists.
        let raw = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(ids, vec!["msg-1".to_string()]);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        std::fs::write(&path, "{not json").unwrap();

        let ledger = IdLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
    }
}
