//! Persistence manager for the key-value mapping.
//!
//! In `WholeFile` mode the snapshot file holds exactly one encoded
//! `HashMap<K, V>` and every put rewrites it in full, O(size of store).
//! In `Incremental` mode every put appends one `(key, value)` frame and a
//! load replays them, last write wins. Overwrites leave stale frames
//! behind, so the file grows until `compact` rewrites it with one frame
//! per live key. The store compacts on every open that keeps existing files.

use std::hash::Hash;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::config::PersistMode;
use crate::error::{StoreError, StoreResult};
use crate::files;
use crate::format::{encode_frame, read_frames};

/// Outcome of `SnapshotFile::compact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Keys written to the compacted file
    pub live_entries: usize,
    /// File size before compaction
    pub bytes_before: u64,
    /// File size after compaction
    pub bytes_after: u64,
}

impl CompactionResult {
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// On-disk snapshot of a `HashMap<K, V>`.
#[derive(Debug)]
pub struct SnapshotFile<K, V> {
    path: PathBuf,
    mode: PersistMode,
    sync: bool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SnapshotFile<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash,
    V: Serialize + DeserializeOwned,
{
    pub fn new<P: AsRef<Path>>(path: P, mode: PersistMode, sync: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode,
            sync,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> PersistMode {
        self.mode
    }

    /// Read the mapping back. A missing file yields an empty mapping;
    /// a file that does not decode is fatal. In incremental mode a torn
    /// final frame is cut off the file so later appends follow the last
    /// good frame.
    pub fn load<C: Codec>(&self, codec: &C) -> StoreResult<HashMap<K, V>> {
        let bytes = match files::read_if_exists(&self.path)? {
            Some(bytes) => bytes,
            None => return Ok(HashMap::new()),
        };

        let map = match self.mode {
            PersistMode::WholeFile => codec.decode(&bytes).map_err(|e| StoreError::Corrupted {
                path: self.path.clone(),
                reason: format!("snapshot does not decode: {}", e),
            })?,
            PersistMode::Incremental => {
                let frames = read_frames(&bytes, &self.path)?;
                if frames.has_torn_tail(bytes.len()) {
                    files::truncate(&self.path, frames.valid_len as u64, self.sync)?;
                    tracing::warn!(
                        path = %self.path.display(),
                        dropped = bytes.len() - frames.valid_len,
                        "torn snapshot tail truncated"
                    );
                }

                let mut map = HashMap::new();
                for (index, payload) in frames.payloads.into_iter().enumerate() {
                    let (key, value): (K, V) =
                        codec.decode(payload).map_err(|e| StoreError::Corrupted {
                            path: self.path.clone(),
                            reason: format!("snapshot frame {} does not decode: {}", index, e),
                        })?;
                    map.insert(key, value);
                }
                map
            }
        };

        tracing::debug!(path = %self.path.display(), entries = map.len(), "snapshot loaded");
        Ok(map)
    }

    /// Encode the entire mapping and overwrite the snapshot file.
    pub fn save<C: Codec>(&self, map: &HashMap<K, V>, codec: &C) -> StoreResult<()> {
        let bytes = codec.encode(map).map_err(|e| StoreError::Encode {
            path: Some(self.path.clone()),
            reason: e.to_string(),
        })?;
        files::write_whole(&self.path, &bytes, self.sync)?;
        tracing::debug!(
            path = %self.path.display(),
            entries = map.len(),
            bytes = bytes.len(),
            "snapshot rewritten"
        );
        Ok(())
    }

    /// Rewrite the file so it holds `map` and nothing else.
    ///
    /// Incremental mode writes one frame per live key to a temporary file and
    /// renames it over the snapshot. Whole-file mode is already compact and
    /// just saves.
    pub fn compact<C: Codec>(
        &self,
        map: &HashMap<K, V>,
        codec: &C,
    ) -> StoreResult<CompactionResult> {
        let bytes_before = files::len_or_zero(&self.path)?;

        match self.mode {
            PersistMode::WholeFile => self.save(map, codec)?,
            PersistMode::Incremental => {
                let mut buffer = Vec::new();
                for (key, value) in map {
                    let payload = codec.encode(&(key, value)).map_err(|e| StoreError::Encode {
                        path: Some(self.path.clone()),
                        reason: e.to_string(),
                    })?;
                    buffer.extend_from_slice(&encode_frame(&payload, &self.path)?);
                }
                files::replace_atomically(&self.path, &buffer, self.sync)?;
            }
        }

        let result = CompactionResult {
            live_entries: map.len(),
            bytes_before,
            bytes_after: files::len_or_zero(&self.path)?,
        };
        tracing::debug!(
            path = %self.path.display(),
            live = result.live_entries,
            saved = result.bytes_saved(),
            "snapshot compacted"
        );
        Ok(result)
    }

    /// Persist the effect of one put. `map` must already contain it.
    pub fn record_put<C: Codec>(
        &self,
        key: &K,
        value: &V,
        map: &HashMap<K, V>,
        codec: &C,
    ) -> StoreResult<()> {
        match self.mode {
            PersistMode::WholeFile => self.save(map, codec),
            PersistMode::Incremental => {
                let payload = codec.encode(&(key, value)).map_err(|e| StoreError::Encode {
                    path: Some(self.path.clone()),
                    reason: e.to_string(),
                })?;
                let frame = encode_frame(&payload, &self.path)?;
                files::append(&self.path, &frame, self.sync)
            }
        }
    }

    /// Delete the snapshot file if present.
    pub fn remove(&self) -> StoreResult<()> {
        if files::remove_if_exists(&self.path)? {
            tracing::debug!(path = %self.path.display(), "stale snapshot removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BincodeCodec, JsonCodec};
    use tempfile::TempDir;

    fn snapshot(dir: &TempDir, mode: PersistMode) -> SnapshotFile<String, String> {
        SnapshotFile::new(dir.path().join("store.dat"), mode, false)
    }

    fn put(
        map: &mut HashMap<String, String>,
        snap: &SnapshotFile<String, String>,
        k: &str,
        v: &str,
    ) {
        map.insert(k.to_string(), v.to_string());
        snap.record_put(&k.to_string(), &v.to_string(), map, &BincodeCodec).unwrap();
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::WholeFile);
        assert!(snap.load(&BincodeCodec).unwrap().is_empty());
    }

    #[test]
    fn test_whole_file_reflects_latest_map() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::WholeFile);
        let mut map = HashMap::new();
        put(&mut map, &snap, "a", "1");
        put(&mut map, &snap, "b", "2");
        put(&mut map, &snap, "a", "3");

        let loaded = snap.load(&BincodeCodec).unwrap();
        assert_eq!(loaded, map);
        assert_eq!(loaded.get("a").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_incremental_replays_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::Incremental);
        let mut map = HashMap::new();
        put(&mut map, &snap, "a", "1");
        put(&mut map, &snap, "b", "2");
        put(&mut map, &snap, "a", "3");

        let loaded = snap.load(&BincodeCodec).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("a").map(String::as_str), Some("3"));
        assert_eq!(loaded.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_torn_tail_is_truncated_on_load() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::Incremental);
        let mut map = HashMap::new();
        put(&mut map, &snap, "a", "1");
        let good_len = std::fs::metadata(snap.path()).unwrap().len();

        files::append(snap.path(), b"LKV1\x40\x00", false).unwrap();
        assert_eq!(snap.load(&BincodeCodec).unwrap(), map);
        assert_eq!(std::fs::metadata(snap.path()).unwrap().len(), good_len);

        put(&mut map, &snap, "b", "2");
        assert_eq!(snap.load(&BincodeCodec).unwrap(), map);
    }

    #[test]
    fn test_compact_keeps_one_frame_per_key() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::Incremental);
        let mut map = HashMap::new();
        for i in 0..50 {
            put(&mut map, &snap, "a", &i.to_string());
        }
        put(&mut map, &snap, "b", "x");

        let result = snap.compact(&map, &BincodeCodec).unwrap();
        assert_eq!(result.live_entries, 2);
        assert!(result.bytes_after < result.bytes_before);
        assert_eq!(result.bytes_saved(), result.bytes_before - result.bytes_after);
        assert_eq!(std::fs::metadata(snap.path()).unwrap().len(), result.bytes_after);

        let loaded = snap.load(&BincodeCodec).unwrap();
        assert_eq!(loaded, map);
        assert_eq!(loaded.get("a").map(String::as_str), Some("49"));
    }

    #[test]
    fn test_compact_empty_map_and_whole_file() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::Incremental);
        let result = snap.compact(&HashMap::new(), &BincodeCodec).unwrap();
        assert_eq!(result.bytes_after, 0);
        assert!(snap.load(&BincodeCodec).unwrap().is_empty());

        let whole = SnapshotFile::<String, String>::new(
            dir.path().join("whole.dat"),
            PersistMode::WholeFile,
            false,
        );
        let mut map = HashMap::new();
        map.insert("k".to_string(), "v".to_string());
        let result = whole.compact(&map, &BincodeCodec).unwrap();
        assert_eq!(result.live_entries, 1);
        assert_eq!(whole.load(&BincodeCodec).unwrap(), map);
    }

    #[test]
    fn test_empty_whole_file_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::WholeFile);
        std::fs::write(snap.path(), b"").unwrap();
        assert!(matches!(snap.load(&BincodeCodec), Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_garbage_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let snap: SnapshotFile<String, String> =
            SnapshotFile::new(dir.path().join("store.json"), PersistMode::WholeFile, false);
        std::fs::write(snap.path(), b"{\"a\":").unwrap();
        match snap.load(&JsonCodec) {
            Err(StoreError::Corrupted { path, .. }) => assert_eq!(path, snap.path()),
            other => panic!("Expected Corrupted, got {:?}", other),
        }
    }

    #[test]
    fn test_json_snapshot_is_an_object() {
        let dir = TempDir::new().unwrap();
        let snap: SnapshotFile<String, u32> =
            SnapshotFile::new(dir.path().join("store.json"), PersistMode::WholeFile, false);
        let mut map = HashMap::new();
        map.insert("x".to_string(), 7u32);
        snap.save(&map, &JsonCodec).unwrap();

        assert_eq!(std::fs::read_to_string(snap.path()).unwrap(), r#"{"x":7}"#);
        assert_eq!(snap.load(&JsonCodec).unwrap(), map);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let snap = snapshot(&dir, PersistMode::WholeFile);
        snap.remove().unwrap();
        snap.save(&HashMap::new(), &BincodeCodec).unwrap();
        assert!(snap.path().exists());
        snap.remove().unwrap();
        assert!(!snap.path().exists());
    }
}
