//! LedgerKV Core — Embedded Key-Value Store with an Operation Log
//!
//! An in-memory key-value map that mirrors every mutation to a snapshot
//! file and records every access in an operation log.
//!
//! # Architecture
//!
//! - **Store state**: one `HashMap` behind one exclusive lock, the single
//!   source of truth for reads
//! - **Snapshot**: the whole map rewritten after every put (or, in
//!   incremental mode, one CRC32C-framed record appended and the file
//!   compacted when reopened)
//! - **Operation log**: every put and get recorded in lock order and
//!   persisted after each append
//! - **Condition**: an optional (key, value) pair; while the map holds it,
//!   each append retracts the record just appended
//!
//! # Example
//!
//! ```no_run
//! use ledgerkv_core::{KvStore, StoreConfig};
//!
//! let config = StoreConfig::new("store.dat", "log.dat")
//!     .with_condition("trigger".to_string(), "activate".to_string());
//! let store: KvStore<String, String> = KvStore::open(config)?;
//!
//! store.put("a".to_string(), "1".to_string())?;
//! assert_eq!(store.get(&"a".to_string())?, Some("1".to_string()));
//! # Ok::<(), ledgerkv_core::StoreError>(())
//! ```

pub mod codec;
pub mod condition;
pub mod config;
pub mod durability;
pub mod error;
mod files;
pub mod format;
pub mod oplog;
pub mod snapshot;
pub mod store;

// Re-export key types for convenience
pub use codec::{BincodeCodec, Codec, CodecError, JsonCodec};
pub use condition::{Condition, ConditionEvent, ConditionObserver};
pub use config::{PersistMode, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use oplog::{AppendOutcome, LogRecord, OpLog, Operation};
pub use snapshot::{CompactionResult, SnapshotFile};
pub use store::KvStore;
