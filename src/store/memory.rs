use crate::error::StoreError;
use crate::store::{KeyIterator, PersistenceStore};
use std::collections::HashMap;

/// Keeps the persisted bytes in a plain `HashMap`. Nothing survives the process, so this is
/// mostly useful for tests and for callers that want the map API with persistence turned off.
#[derive(Default)]
pub struct MemoryStore {
    data: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            data: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<Key: Into<String>> FromIterator<(Key, Vec<u8>)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (Key, Vec<u8>)>>(iter: I) -> Self {
        MemoryStore {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl PersistenceStore for MemoryStore {
    fn enumerate_keys(&self) -> KeyIterator<'_, String> {
        Box::new(self.data.keys().cloned())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.data
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), bytes);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.data.clear();
        Ok(())
    }
}
