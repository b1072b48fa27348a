//! File-backed local fallback store. One JSON file per key under the data
//! directory, written atomically (temp file + rename) so a crash mid-write
//! never corrupts the previous snapshot.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::storage::{LocalStore, LocalStoreError};

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating local store directory {}", dir.display()))?;
        Ok(FileStore { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are well-known identifiers; anything path-hostile is flattened.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn classify(e: io::Error) -> LocalStoreError {
        // ENOSPC is the file-system equivalent of a quota-exceeded write.
        if e.raw_os_error() == Some(28) {
            LocalStoreError::QuotaExceeded
        } else {
            LocalStoreError::Io(e.to_string())
        }
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::classify(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(Self::classify)?;
        tmp.write_all(value.as_bytes()).map_err(Self::classify)?;
        tmp.persist(self.path_for(key))
            .map_err(|e| Self::classify(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("folio.cv.current", "{\"a\":1}").unwrap();
        assert_eq!(
            store.get("folio.cv.current").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
    }

    #[test]
    fn test_missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get("nothing-here").unwrap().is_none());
    }

    #[test]
    fn test_set_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("slot", "old").unwrap();
        store.set("slot", "new").unwrap();
        assert_eq!(store.get("slot").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_hostile_keys_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.set("../escape/attempt", "x").unwrap();
        assert_eq!(store.get("../escape/attempt").unwrap().as_deref(), Some("x"));
        // Nothing was written outside the store directory.
        assert!(dir.path().join(".._escape_attempt.json").exists());
    }
}
