//! Operation log: one record per store access, in lock-acquisition order.
//!
//! Append order of operations:
//! 1. push the record onto the in-memory sequence
//! 2. evaluate the condition against the current mapping
//! 3. if it holds, pop the last record and notify the observer
//! 4. persist
//!
//! `WholeFile` mode rewrites the log file as one encoded `Vec<LogRecord>`
//! after every append. `Incremental` mode appends a frame for the record
//! only when it was retained, so the file always matches memory.

use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::condition::{Condition, ConditionEvent, ConditionObserver};
use crate::config::PersistMode;
use crate::error::{StoreError, StoreResult};
use crate::files;
use crate::format::{encode_frame, read_frames};

/// Kind of store access that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Put,
    Get,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Put => f.write_str("put"),
            Operation::Get => f.write_str("get"),
        }
    }
}

/// One logged access. `value` is what was written for a put and what was
/// read for a get; `None` means the key was absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord<K, V> {
    pub operation: Operation,
    pub key: K,
    pub value: Option<V>,
}

impl<K, V> LogRecord<K, V> {
    pub fn put(key: K, value: V) -> Self {
        Self { operation: Operation::Put, key, value: Some(value) }
    }

    pub fn get(key: K, value: Option<V>) -> Self {
        Self { operation: Operation::Get, key, value }
    }
}

/// What happened to an appended record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Retained,
    Suppressed,
}

/// In-memory record sequence mirrored to a file.
#[derive(Debug)]
pub struct OpLog<K, V> {
    path: PathBuf,
    mode: PersistMode,
    sync: bool,
    records: Vec<LogRecord<K, V>>,
}

impl<K, V> OpLog<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned + PartialEq + Clone,
{
    /// An empty log bound to `path`. Nothing is read until `load`.
    pub fn new<P: AsRef<Path>>(path: P, mode: PersistMode, sync: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode,
            sync,
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[LogRecord<K, V>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the in-memory sequence with the file's contents.
    /// A missing file yields an empty log. In incremental mode a torn final
    /// frame is cut off the file so later appends follow the last good frame.
    pub fn load<C: Codec>(&mut self, codec: &C) -> StoreResult<()> {
        self.records = match files::read_if_exists(&self.path)? {
            None => Vec::new(),
            Some(bytes) => match self.mode {
                PersistMode::WholeFile => codec.decode(&bytes).map_err(|e| StoreError::Corrupted {
                    path: self.path.clone(),
                    reason: format!("log does not decode: {}", e),
                })?,
                PersistMode::Incremental => self.load_frames(&bytes, codec)?,
            },
        };

        tracing::debug!(
            path = %self.path.display(),
            records = self.records.len(),
            "operation log loaded"
        );
        Ok(())
    }

    fn load_frames<C: Codec>(&self, bytes: &[u8], codec: &C) -> StoreResult<Vec<LogRecord<K, V>>> {
        let frames = read_frames(bytes, &self.path)?;
        if frames.has_torn_tail(bytes.len()) {
            files::truncate(&self.path, frames.valid_len as u64, self.sync)?;
            tracing::warn!(
                path = %self.path.display(),
                dropped = bytes.len() - frames.valid_len,
                "torn log tail truncated"
            );
        }

        frames
            .payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| {
                codec.decode(payload).map_err(|e| StoreError::Corrupted {
                    path: self.path.clone(),
                    reason: format!("log frame {} does not decode: {}", index, e),
                })
            })
            .collect()
    }

    /// Append `record`, apply the suppression rule, then persist.
    pub fn append<C: Codec>(
        &mut self,
        record: LogRecord<K, V>,
        map: &HashMap<K, V>,
        condition: Option<&Condition<K, V>>,
        observer: Option<&dyn ConditionObserver<K, V>>,
        codec: &C,
    ) -> StoreResult<AppendOutcome> {
        self.records.push(record);

        let mut outcome = AppendOutcome::Retained;
        if let Some(condition) = condition.filter(|c| c.is_met(map)) {
            if let Some(suppressed) = self.records.pop() {
                outcome = AppendOutcome::Suppressed;
                tracing::info!(
                    operation = %suppressed.operation,
                    log_len = self.records.len(),
                    "condition met, suppressing latest log record"
                );
                if let Some(observer) = observer {
                    observer.condition_met(&ConditionEvent {
                        condition: condition.clone(),
                        suppressed,
                    });
                }
            }
        }

        self.persist(outcome, codec)?;
        Ok(outcome)
    }

    fn persist<C: Codec>(&self, outcome: AppendOutcome, codec: &C) -> StoreResult<()> {
        match self.mode {
            PersistMode::WholeFile => {
                let bytes = codec.encode(&self.records).map_err(|e| self.encode_error(e))?;
                files::write_whole(&self.path, &bytes, self.sync)
            }
            PersistMode::Incremental => {
                let last = match (outcome, self.records.last()) {
                    (AppendOutcome::Retained, Some(last)) => last,
                    _ => return Ok(()),
                };
                let payload = codec.encode(last).map_err(|e| self.encode_error(e))?;
                let frame = encode_frame(&payload, &self.path)?;
                files::append(&self.path, &frame, self.sync)
            }
        }
    }

    fn encode_error(&self, err: crate::codec::CodecError) -> StoreError {
        StoreError::Encode {
            path: Some(self.path.clone()),
            reason: err.to_string(),
        }
    }

    /// Delete the log file if present. The in-memory sequence is untouched.
    pub fn remove(&self) -> StoreResult<()> {
        if files::remove_if_exists(&self.path)? {
            tracing::debug!(path = %self.path.display(), "stale operation log removed");
        }
        Ok(())
    }
}
