//! The table from logical keys to store-assigned locators.
//!
//! Blob stores pick the locator of an object when it is created, so the harness has to remember
//! which locator belongs to which logical key. The [`MappingStore`] is shared by all workers of a
//! process, and its [`snapshot`](MappingStore::snapshot) is what the load phase publishes for the
//! run phase.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

/// The logical key under which the locator of the published mapping itself is recorded.
pub const MAPPING_KEY: &str = "blobbench.mapping_id";

/// A point-in-time copy of a [`MappingStore`].
pub type MappingTable = BTreeMap<String, String>;

/// A concurrent table from logical key to store locator.
///
/// Cloning the store is cheap and yields a handle to the same table.
///
/// Concurrent [`put`](Self::put)s under the same key race: the last write wins, and there is no
/// guarantee which write that is.
#[derive(Clone, Debug, Default)]
pub struct MappingStore {
    entries: Arc<DashMap<String, String>>,
}

impl MappingStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the locator for a logical key, replacing any previous locator.
    pub fn put(&self, key: impl Into<String>, locator: impl Into<String>) {
        self.entries.insert(key.into(), locator.into());
    }

    /// Returns the locator recorded for a logical key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Records all entries of `table`, replacing existing locators.
    pub fn extend(&self, table: MappingTable) {
        for (key, locator) in table {
            self.entries.insert(key, locator);
        }
    }

    /// Copies the current contents of the store.
    ///
    /// Writers are only blocked for the time it takes to copy a single shard. Writes that happen
    /// while the copy is taken may or may not be part of it.
    pub fn snapshot(&self) -> MappingTable {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Returns the number of recorded keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serializes a mapping into the JSON object stored as the published mapping.
pub fn encode(table: &MappingTable) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(table)
}

/// Parses a published mapping.
pub fn decode(bytes: &[u8]) -> serde_json::Result<MappingTable> {
    serde_json::from_slice(bytes)
}
