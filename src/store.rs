pub mod discrete_files;
pub mod memory;

use crate::error::StoreError;

pub type KeyIterator<'a, Key> = Box<dyn Iterator<Item = Key> + 'a>;

/// A durable, keyed repository of byte blobs. Every call is expected to run to completion
/// before returning; anything that needs a timeout implements it here, not in the map.
pub trait PersistenceStore {
    /// Every key currently persisted. The map only walks this once, while hydrating.
    fn enumerate_keys(&self) -> KeyIterator<'_, String>;

    /// Fails if the key is absent or its bytes can't be read back.
    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn write(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Removing a key that isn't persisted is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;
}
