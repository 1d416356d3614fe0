use std::collections::BTreeMap;

use arc_swap::ArcSwap;

use crate::KeyValueStore;
use crate::error::StorageResult;

/// Process-local store with the same contract as the durable one.
pub struct MemoryStore {
    entries: ArcSwap<BTreeMap<String, String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(BTreeMap::new()),
        }
    }

    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(BTreeMap::from([(key.into(), value.into())])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.rcu(|entries| {
            let mut next = BTreeMap::clone(entries);
            next.insert(key.to_string(), value.to_string());
            next
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.rcu(|entries| {
            let mut next = BTreeMap::clone(entries);
            next.remove(key);
            next
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_remove_forgets() {
        let store = MemoryStore::new();

        store.set("gemini_api_key", "first").unwrap();
        store.set("gemini_api_key", "second").unwrap();
        assert_eq!(
            store.get("gemini_api_key").unwrap().as_deref(),
            Some("second")
        );

        store.remove("gemini_api_key").unwrap();
        store.remove("gemini_api_key").unwrap();
        assert!(store.is_empty());
    }
}
