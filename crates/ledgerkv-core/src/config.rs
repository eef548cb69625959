//! Configuration for a LedgerKV store
//!
//! File locations, the optional log-suppression condition, and the
//! persistence knobs. Validated once before the store opens.

use std::path::{Path, PathBuf};

use crate::condition::Condition;
use crate::error::{StoreError, StoreResult};

/// How the snapshot and the operation log reach disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Rewrite each file in full after every change.
    #[default]
    WholeFile,
    /// Append one CRC32C-framed record per change.
    Incremental,
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig<K, V> {
    /// Snapshot of the full mapping
    pub snapshot_path: PathBuf,
    /// Operation log
    pub log_path: PathBuf,
    /// Suppress the latest log record while `key` currently maps to `value`
    pub condition: Option<Condition<K, V>>,
    /// Delete both files before loading, so every open starts empty
    pub reset_on_open: bool,
    /// Whole-file rewrite or append-only framing
    pub persist_mode: PersistMode,
    /// Force every write to stable storage before returning
    pub sync_writes: bool,
}

impl<K, V> StoreConfig<K, V> {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(snapshot_path: P, log_path: Q) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
            log_path: log_path.as_ref().to_path_buf(),
            condition: None,
            reset_on_open: true,
            persist_mode: PersistMode::WholeFile,
            sync_writes: false,
        }
    }

    /// Place `store.dat` and `log.dat` inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("store.dat"), dir.join("log.dat"))
    }

    pub fn with_condition(mut self, key: K, value: V) -> Self {
        self.condition = Some(Condition::new(key, value));
        self
    }

    /// Keep existing files and recover from them instead of starting empty.
    pub fn keep_existing(mut self) -> Self {
        self.reset_on_open = false;
        self
    }

    pub fn persist_mode(mut self, mode: PersistMode) -> Self {
        self.persist_mode = mode;
        self
    }

    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("snapshot_path must not be empty".into()));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("log_path must not be empty".into()));
        }
        if self.snapshot_path == self.log_path {
            return Err(StoreError::InvalidConfig(format!(
                "snapshot_path and log_path must differ (both {})",
                self.snapshot_path.display()
            )));
        }
        Ok(())
    }
}

impl<K, V> Default for StoreConfig<K, V> {
    fn default() -> Self {
        Self::new("store.dat", "log.dat")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Config = StoreConfig<String, String>;

    #[test]
    fn test_default_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.reset_on_open);
        assert_eq!(config.persist_mode, PersistMode::WholeFile);
        assert!(!config.sync_writes);
        assert!(config.condition.is_none());
    }

    #[test]
    fn test_same_paths_rejected() {
        let config = Config::new("same.dat", "same.dat");
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = Config::new("", "log.dat");
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder() {
        let config = Config::in_dir("/tmp/kv")
            .with_condition("trigger".into(), "activate".into())
            .keep_existing()
            .persist_mode(PersistMode::Incremental)
            .sync_writes(true);

        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/kv/store.dat"));
        assert_eq!(config.log_path, PathBuf::from("/tmp/kv/log.dat"));
        assert!(!config.reset_on_open);
        assert!(config.sync_writes);
        let cond = config.condition.unwrap();
        assert_eq!(cond.key, "trigger");
        assert_eq!(cond.value, "activate");
    }
}
