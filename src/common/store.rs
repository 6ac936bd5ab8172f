//! Volatile per-replica key-value store

use crate::common::operation::{Key, Method, Operation};
use std::collections::HashMap;

/// In-memory map from integer key to string value.
///
/// Lives as long as the replica that owns it; nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct KeyValueStore {
    map: HashMap<Key, String>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute_get(&self, key: Key) -> Option<String> {
        self.map.get(&key).cloned()
    }

    pub fn execute_put(&mut self, key: Key, value: String) {
        self.map.insert(key, value);
    }

    pub fn execute_delete(&mut self, key: Key) -> Option<String> {
        self.map.remove(&key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.map.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Apply an agreed operation and render the client-visible result.
    ///
    /// Reads and deletes of an absent key leave the store untouched.
    pub fn apply(&mut self, operation: &Operation) -> String {
        match operation {
            Operation::Get { key } => self
                .execute_get(*key)
                .unwrap_or_else(|| not_found_message(*key, Method::Get)),
            Operation::Put { key, value } => {
                self.execute_put(*key, value.clone());
                inserted_message(*key)
            }
            Operation::Del { key } => match self.execute_delete(*key) {
                Some(_) => deleted_message(*key),
                None => not_found_message(*key, Method::Del),
            },
        }
    }
}

pub fn not_found_message(key: Key, method: Method) -> String {
    format!("Key {} not found. {} request aborted.", key, method)
}

pub fn inserted_message(key: Key) -> String {
    format!("Key {} was successfully inserted", key)
}

pub fn deleted_message(key: Key) -> String {
    format!("Key {} successfully deleted", key)
}
