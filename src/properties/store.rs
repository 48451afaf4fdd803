//! Layered property store
//!
//! Properties live in an ordered list of layers, highest precedence first.
//! Within a layer a key is immutable once set: later writes are ignored.

use crate::error::{PropertyError, PropertyResult};
use std::collections::{BTreeMap, HashMap};
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// Indices of the layers created by [`PropertyStore::standard`]
pub mod layer {
    /// `-D name=value` definitions
    pub const COMMAND_LINE: usize = 0;
    /// Inline build file properties and properties written by steps
    pub const PROJECT: usize = 1;
    /// Imported property files
    pub const FILE: usize = 2;
    /// Per-user defaults
    pub const USER: usize = 3;
    /// Process environment exposed under a prefix
    pub const ENVIRONMENT: usize = 4;
}

/// Layer names of the standard store, in precedence order
pub const STANDARD_LAYERS: &[&str] = &["command-line", "project", "file", "user", "environment"];

#[derive(Debug)]
struct Layer {
    name: String,
    values: RwLock<HashMap<String, String>>,
}

impl Layer {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ordered, layered key to value mapping with first-wins writes
///
/// Each layer carries its own lock, so the store can be shared by reference
/// between worker threads. A write holds the layer lock for one `set` only.
#[derive(Debug)]
pub struct PropertyStore {
    layers: Vec<Layer>,
}

impl PropertyStore {
    /// Create a store with the given layers, highest precedence first
    pub fn new<I, S>(layer_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropertyStore {
            layers: layer_names
                .into_iter()
                .map(|name| Layer {
                    name: name.into(),
                    values: RwLock::new(HashMap::new()),
                })
                .collect(),
        }
    }

    /// Create a store with the [`STANDARD_LAYERS`]
    pub fn standard() -> Self {
        Self::new(STANDARD_LAYERS.iter().copied())
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Name of a layer
    pub fn layer_name(&self, index: usize) -> Option<&str> {
        self.layers.get(index).map(|l| l.name.as_str())
    }

    fn layer(&self, index: usize) -> PropertyResult<&Layer> {
        self.layers.get(index).ok_or(PropertyError::NoSuchLayer {
            index,
            layers: self.layers.len(),
        })
    }

    /// Set `key` in `layer` unless it is already defined there
    ///
    /// Returns whether the value was stored.
    pub fn set(
        &self,
        layer: usize,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> PropertyResult<bool> {
        let target = self.layer(layer)?;
        let mut values = target.write();
        match values.entry(key.into()) {
            Entry::Occupied(existing) => {
                trace!(
                    key = existing.key().as_str(),
                    layer = target.name.as_str(),
                    "property already set, ignoring"
                );
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(value.into());
                Ok(true)
            }
        }
    }

    /// Look up `key`, scanning layers from highest precedence
    pub fn get(&self, key: &str) -> Option<String> {
        self.layers
            .iter()
            .find_map(|layer| layer.read().get(key).cloned())
    }

    /// Whether `key` is defined in any layer
    pub fn contains(&self, key: &str) -> bool {
        self.defined_in(key).is_some()
    }

    /// Index of the layer providing the visible value of `key`
    pub fn defined_in(&self, key: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.read().contains_key(key))
    }

    /// Merged view of every property; higher layers win on conflicts
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for layer in self.layers.iter().rev() {
            for (key, value) in layer.read().iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_layer_wins() {
        let store = PropertyStore::new(["high", "low"]);
        store.set(1, "a", "2").unwrap();
        store.set(0, "a", "1").unwrap();

        assert_eq!(store.get("a"), Some("1".to_string()));
        assert_eq!(store.defined_in("a"), Some(0));
    }

    #[test]
    fn test_first_set_wins_within_layer() {
        let store = PropertyStore::standard();
        assert!(store.set(layer::PROJECT, "a", "1").unwrap());
        assert!(!store.set(layer::PROJECT, "a", "2").unwrap());

        assert_eq!(store.get("a"), Some("1".to_string()));
    }

    #[test]
    fn test_missing_is_not_empty() {
        let store = PropertyStore::standard();
        store.set(layer::PROJECT, "empty", "").unwrap();

        assert_eq!(store.get("missing"), None);
        assert_eq!(store.get("empty"), Some(String::new()));
        assert!(store.contains("empty"));
        assert!(!store.contains("missing"));
    }

    #[test]
    fn test_set_unknown_layer() {
        let store = PropertyStore::new(["only"]);
        let result = store.set(3, "a", "1");
        assert_eq!(
            result,
            Err(PropertyError::NoSuchLayer { index: 3, layers: 1 })
        );
    }

    #[test]
    fn test_snapshot_merges_by_precedence() {
        let store = PropertyStore::new(["cli", "project", "file"]);
        store.set(2, "a", "file").unwrap();
        store.set(2, "b", "file").unwrap();
        store.set(1, "b", "project").unwrap();
        store.set(0, "c", "cli").unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["a"], "file");
        assert_eq!(snapshot["b"], "project");
        assert_eq!(snapshot["c"], "cli");

        // Snapshot is a copy
        store.set(0, "d", "later").unwrap();
        assert!(!snapshot.contains_key("d"));
    }

    #[test]
    fn test_layer_names() {
        let store = PropertyStore::standard();
        assert_eq!(store.layer_count(), STANDARD_LAYERS.len());
        assert_eq!(store.layer_name(layer::COMMAND_LINE), Some("command-line"));
        assert_eq!(store.layer_name(layer::ENVIRONMENT), Some("environment"));
        assert_eq!(store.layer_name(99), None);
    }

    #[test]
    fn test_concurrent_writers_keep_first_value() {
        let store = PropertyStore::new(["shared"]);
        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    store.set(0, "winner", i.to_string()).unwrap();
                });
            }
        });

        let winner = store.get("winner").unwrap();
        assert!(winner.parse::<u32>().unwrap() < 8);
        assert_eq!(store.snapshot().len(), 1);
    }
}
