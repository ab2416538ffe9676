//! Latest-value cache
//!
//! Keeps the most recent [`SignalUpdate`] per published name. Entries are
//! overwritten, never merged, and never evicted: the set of names is bounded by
//! the signal map. Going past that bound means something upstream is minting
//! names it should not, so it is logged once.

use crate::types::SignalUpdate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// Name-keyed map of the most recent update per signal
#[derive(Debug, Default)]
pub struct LatestValueCache {
    values: RwLock<HashMap<String, SignalUpdate>>,
    expected_max: Option<usize>,
    bound_warned: AtomicBool,
}

impl LatestValueCache {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that warns once when it holds more than `expected_max` names
    pub fn with_expected_bound(expected_max: usize) -> Self {
        Self {
            expected_max: Some(expected_max),
            ..Self::default()
        }
    }

    /// Store an update, replacing any previous value for its name
    pub fn insert(&self, update: SignalUpdate) {
        let len = {
            let mut values = self.values.write();
            values.insert(update.name.clone(), update);
            values.len()
        };

        if let Some(max) = self.expected_max {
            if len > max && !self.bound_warned.swap(true, Ordering::Relaxed) {
                log::warn!(
                    "Latest-value cache holds {} signals, more than the {} the signal map can produce",
                    len,
                    max
                );
            }
        }
    }

    /// Latest update for a name
    pub fn get(&self, name: &str) -> Option<SignalUpdate> {
        self.values.read().get(name).cloned()
    }

    /// Copy of every latest value, ordered by name
    pub fn snapshot(&self) -> BTreeMap<String, SignalUpdate> {
        self.values
            .read()
            .iter()
            .map(|(name, update)| (name.clone(), update.clone()))
            .collect()
    }

    /// Number of distinct signal names seen so far
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
