//! Edge-triggered log suppression.
//!
//! A `Condition` names one key and the value it must currently hold. While
//! the mapping satisfies it, every log append retracts whatever record was
//! appended last, whichever key that record was about.

use std::hash::Hash;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::oplog::LogRecord;

/// The configured (key, expected value) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Condition<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    /// True when `map` currently holds `value` under `key`. Never mutates.
    pub fn is_met(&self, map: &HashMap<K, V>) -> bool
    where
        K: Eq + Hash,
        V: PartialEq,
    {
        map.get(&self.key) == Some(&self.value)
    }
}

/// Reported each time the condition fires.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionEvent<K, V> {
    pub condition: Condition<K, V>,
    /// The record that was just appended and then removed
    pub suppressed: LogRecord<K, V>,
}

/// Hook run synchronously, inside the store's critical section, when the
/// condition fires. It sees the event but cannot touch stored data.
pub trait ConditionObserver<K, V>: Send + Sync {
    fn condition_met(&self, event: &ConditionEvent<K, V>);
}

impl<K, V, F> ConditionObserver<K, V> for F
where
    F: Fn(&ConditionEvent<K, V>) + Send + Sync,
{
    fn condition_met(&self, event: &ConditionEvent<K, V>) {
        self(event)
    }
}
