//! # Storage Service
//!
//! This crate defines the node's local key-value storage.
//!
//! ## Philosophy
//!
//! - Values are plain strings under string keys
//! - Persistence is one opaque text blob, produced by [`LocalStorage::save_data`]
//!   and handed back to [`LocalStorage::from_saved`] on the next start
//! - Writes mark the store dirty so the host knows when to persist
//!
//! Other services (such as the address book) persist themselves by storing
//! their own encoded form under a key.

use codec::{deserialize_map, serialize_map, Value, ValueMap};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::warn;

/// String get/set persistence
pub trait KeyValueStore {
    /// Returns the value under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str);
}

#[derive(Debug, Default)]
struct StorageState {
    entries: BTreeMap<String, String>,
    dirty: bool,
}

/// In-memory storage with a text save format
///
/// Cloning yields another handle onto the same store.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    state: Rc<RefCell<StorageState>>,
}

impl LocalStorage {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from text produced by [`LocalStorage::save_data`]
    ///
    /// Blank or unreadable save data yields an empty store.
    pub fn from_saved(data: &str) -> Self {
        let storage = Self::new();
        if data.trim().is_empty() {
            return storage;
        }

        match deserialize_map(data) {
            Ok(map) => {
                let mut state = storage.state.borrow_mut();
                for (key, value) in map {
                    let text = match value {
                        Value::Str(s) => s,
                        other => other.to_string(),
                    };
                    state.entries.insert(key, text);
                }
            }
            Err(err) => warn!(%err, "discarding unreadable save data"),
        }
        storage
    }

    /// Returns the value under `key`, or `""` when absent
    pub fn get(&self, key: &str) -> String {
        self.state
            .borrow()
            .entries
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().entries.contains_key(key)
    }

    /// Stores `value` under `key` and marks the store dirty
    pub fn set(&self, key: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        state.entries.insert(key.to_string(), value.to_string());
        state.dirty = true;
    }

    /// Removes every entry and marks the store dirty
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.entries.clear();
        state.dirty = true;
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    /// True when there are writes not yet captured by [`LocalStorage::save_data`]
    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    /// Encodes the whole store and clears the dirty mark
    pub fn save_data(&self) -> String {
        let mut state = self.state.borrow_mut();
        let map: ValueMap = state
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        state.dirty = false;
        serialize_map(&map)
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.state.borrow().entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        LocalStorage::set(self, key, value);
    }
}
