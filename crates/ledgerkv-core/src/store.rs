//! The public store: mapping, snapshot and operation log behind one lock.
//!
//! `put` and `get` hold the same exclusive `Mutex` for their whole
//! duration, including file I/O. Readers do not run alongside writers or
//! each other, so the log order is exactly the lock-acquisition order.
//!
//! **put**: mapping insert, snapshot persist, log append
//! **get**: mapping read, log append

use std::fmt;
use std::hash::Hash;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{BincodeCodec, Codec};
use crate::condition::ConditionObserver;
use crate::config::{PersistMode, StoreConfig};
use crate::error::StoreResult;
use crate::files;
use crate::oplog::{LogRecord, OpLog};
use crate::snapshot::{CompactionResult, SnapshotFile};

/// Everything the lock guards.
struct StoreState<K, V> {
    map: HashMap<K, V>,
    snapshot: SnapshotFile<K, V>,
    log: OpLog<K, V>,
}

/// Embedded key-value store with snapshot persistence and an operation log.
///
/// All public methods take `&self`; share it across threads with `Arc`.
pub struct KvStore<K, V, C = BincodeCodec> {
    state: Mutex<StoreState<K, V>>,
    observer: Option<Box<dyn ConditionObserver<K, V>>>,
    codec: C,
    config: StoreConfig<K, V>,
}

impl<K, V> KvStore<K, V, BincodeCodec>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned + PartialEq + Clone,
{
    /// Open a store with the default binary codec.
    pub fn open(config: StoreConfig<K, V>) -> StoreResult<Self> {
        Self::open_with_codec(config, BincodeCodec)
    }
}

impl<K, V, C> KvStore<K, V, C>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned + PartialEq + Clone,
    C: Codec,
{
    /// Open a store.
    ///
    /// With `reset_on_open` (the default) any existing snapshot and log
    /// files are deleted first, so the store always starts empty. Otherwise
    /// both files are loaded back, and an incremental snapshot is compacted
    /// to one frame per key.
    pub fn open_with_codec(config: StoreConfig<K, V>, codec: C) -> StoreResult<Self> {
        config.validate()?;
        files::ensure_parent(&config.snapshot_path)?;
        files::ensure_parent(&config.log_path)?;

        let snapshot =
            SnapshotFile::new(&config.snapshot_path, config.persist_mode, config.sync_writes);
        let mut log = OpLog::new(&config.log_path, config.persist_mode, config.sync_writes);

        if config.reset_on_open {
            snapshot.remove()?;
            log.remove()?;
            tracing::debug!(
                snapshot = %config.snapshot_path.display(),
                log = %config.log_path.display(),
                "store files reset"
            );
        }

        let map = snapshot.load(&codec)?;
        log.load(&codec)?;

        if !config.reset_on_open && snapshot.mode() == PersistMode::Incremental {
            snapshot.compact(&map, &codec)?;
        }

        tracing::debug!(
            entries = map.len(),
            log_records = log.len(),
            mode = ?config.persist_mode,
            "store ready"
        );

        Ok(Self {
            state: Mutex::new(StoreState { map, snapshot, log }),
            observer: None,
            codec,
            config,
        })
    }

    /// Install the hook run when the condition suppresses a record.
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: ConditionObserver<K, V> + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// Rewrites (or appends to) the snapshot, then logs the put. If a file
    /// write fails the mapping keeps the new value and the error is returned.
    pub fn put(&self, key: K, value: V) -> StoreResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.map.insert(key.clone(), value.clone());
        state.snapshot.record_put(&key, &value, &state.map, &self.codec)?;
        state.log.append(
            LogRecord::put(key, value),
            &state.map,
            self.config.condition.as_ref(),
            self.observer.as_deref(),
            &self.codec,
        )?;
        Ok(())
    }

    /// Current value for `key`, `None` if it was never written. Logged either way.
    pub fn get(&self, key: &K) -> StoreResult<Option<V>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let value = state.map.get(key).cloned();
        state.log.append(
            LogRecord::get(key.clone(), value.clone()),
            &state.map,
            self.config.condition.as_ref(),
            self.observer.as_deref(),
            &self.codec,
        )?;
        Ok(value)
    }

    /// Replace the in-memory log with what is on disk.
    pub fn reload_log(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.log.load(&self.codec)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().map.is_empty()
    }

    /// Unlike `get`, this is not logged.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.lock().map.contains_key(key)
    }

    /// Copy of the whole mapping.
    pub fn entries(&self) -> HashMap<K, V> {
        self.state.lock().map.clone()
    }

    /// Copy of the in-memory log.
    pub fn log_records(&self) -> Vec<LogRecord<K, V>> {
        self.state.lock().log.records().to_vec()
    }

    pub fn log_len(&self) -> usize {
        self.state.lock().log.len()
    }

    pub fn config(&self) -> &StoreConfig<K, V> {
        &self.config
    }

    /// Rewrite the snapshot so it holds only the current mapping.
    pub fn compact(&self) -> StoreResult<CompactionResult> {
        let state = self.state.lock();
        state.snapshot.compact(&state.map, &self.codec)
    }
}

impl<K, V, C> fmt::Debug for KvStore<K, V, C>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}
