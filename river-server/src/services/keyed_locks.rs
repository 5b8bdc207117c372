//! Keyed lock registry
//!
//! Maps a key to a shared, reference-counted slot. Every caller asking for the
//! same key while any handle is alive gets the same slot; once all handles are
//! dropped the entry is pruned on a later insertion. The registry mutex is held
//! only for lookup and insertion, never while a slot is in use.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Registry of per-key slots
pub struct KeyedLocks<K, T> {
    slots: Mutex<HashMap<K, Weak<T>>>,
}

impl<K, T> KeyedLocks<K, T>
where
    K: Eq + Hash + Clone,
    T: Default,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Shared slot for `key`, created on first use
    pub fn slot(&self, key: &K) -> Arc<T> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = slots.get(key).and_then(Weak::upgrade) {
            return slot;
        }

        slots.retain(|_, weak| weak.strong_count() > 0);
        let slot = Arc::new(T::default());
        slots.insert(key.clone(), Arc::downgrade(&slot));
        slot
    }

    /// Number of keys with a live handle
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl<K, T> Default for KeyedLocks<K, T>
where
    K: Eq + Hash + Clone,
    T: Default,
{
    fn default() -> Self {
        Self::new()
    }
}
