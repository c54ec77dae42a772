use crate::codec::Codec;
use crate::error::{PersistentMapError, Result};
use crate::store::PersistenceStore;
use log::debug;
use std::collections::hash_map::{Iter, Keys, Values};
use std::collections::HashMap;
use std::fmt;

/// An in-memory `HashMap<String, Value>` that mirrors every mutation to a [`PersistenceStore`].
///
/// Every mutator changes memory first and then attempts persistence. A failed persistence call
/// is discarded: it is not returned, not retried, and the in-memory change stays in place. The
/// store may therefore lag behind memory until the next successful write of the same key.
/// Reads never touch the store or the codec.
///
/// Construction hydrates the map from the store. Unlike steady-state writes, any failure while
/// hydrating is returned and no map is built.
///
/// Not thread-safe: there is no atomicity between the in-memory update and the store call. Share
/// it across threads only behind a single lock guarding the whole map.
pub struct PersistentMap<Value> {
    delegate: HashMap<String, Value>,
    codec: Box<dyn Codec<Value>>,
    store: Box<dyn PersistenceStore>,
}

impl<Value> PersistentMap<Value> {
    pub fn new(codec: Box<dyn Codec<Value>>, store: Box<dyn PersistenceStore>) -> Result<Self> {
        Self::with_delegate(HashMap::new(), codec, store)
    }

    /// Same as [`new`](Self::new), but fills the supplied map, e.g. one created with a capacity
    /// or a custom hasher. The map must be empty.
    pub fn with_delegate(
        delegate: HashMap<String, Value>,
        codec: Box<dyn Codec<Value>>,
        store: Box<dyn PersistenceStore>,
    ) -> Result<Self> {
        if !delegate.is_empty() {
            return Err(PersistentMapError::InvalidArgument(
                "delegate map must be empty",
            ));
        }

        let mut map = PersistentMap {
            delegate,
            codec,
            store,
        };
        map.hydrate()?;

        Ok(map)
    }

    fn hydrate(&mut self) -> Result<()> {
        debug!("hydrating from store");
        for key in self.store.enumerate_keys() {
            if check_key(&key).is_err() {
                return Err(PersistentMapError::HydrationKey { key });
            }
            let bytes = self
                .store
                .read(&key)
                .map_err(|source| PersistentMapError::HydrationRead {
                    key: key.clone(),
                    source,
                })?;
            let value =
                self.codec
                    .decode(&bytes)
                    .map_err(|source| PersistentMapError::HydrationDecode {
                        key: key.clone(),
                        source,
                    })?;

            self.delegate.insert(key, value);
        }

        debug!("hydrated {} entries from store", self.delegate.len());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.delegate.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.delegate.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.delegate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegate.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.delegate.iter()
    }

    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.delegate.keys()
    }

    pub fn values(&self) -> Values<'_, String, Value> {
        self.delegate.values()
    }

    /// Inserts or replaces `key`, returning the previous value, then writes the encoded value to
    /// the store. Encoding or write failures are swallowed.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
        let key = key.into();
        check_key(&key)?;

        let previous = self.delegate.insert(key.clone(), value);
        self.write_through(&key);

        Ok(previous)
    }

    /// [`put`](Self::put) for each entry, in iteration order. A persistence failure on one key
    /// doesn't stop the others; an invalid key stops at that entry.
    pub fn put_all<I, Key>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (Key, Value)>,
        Key: Into<String>,
    {
        for (key, value) in entries {
            self.put(key, value)?;
        }

        Ok(())
    }

    /// Removes `key` from memory, returning its value if it was present, then removes it from
    /// the store. A store failure is swallowed.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        check_key(key)?;

        let removed = self.delegate.remove(key);
        let _ = self.store.remove(key);

        Ok(removed)
    }

    /// Empties memory, then the store. A store failure is swallowed.
    pub fn clear(&mut self) {
        self.delegate.clear();
        let _ = self.store.clear();
    }

    pub fn store(&self) -> &dyn PersistenceStore {
        self.store.as_ref()
    }

    pub fn codec(&self) -> &dyn Codec<Value> {
        self.codec.as_ref()
    }

    pub fn into_parts(
        self,
    ) -> (
        HashMap<String, Value>,
        Box<dyn Codec<Value>>,
        Box<dyn PersistenceStore>,
    ) {
        (self.delegate, self.codec, self.store)
    }

    fn write_through(&mut self, key: &str) {
        if let Some(value) = self.delegate.get(key) {
            if let Ok(bytes) = self.codec.encode(value) {
                let _ = self.store.write(key, bytes);
            }
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PersistentMapError::InvalidArgument("key must not be empty"));
    }

    Ok(())
}

impl<'a, Value> IntoIterator for &'a PersistentMap<Value> {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.delegate.iter()
    }
}

impl<Value: fmt::Debug> fmt::Debug for PersistentMap<Value> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.delegate.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::error::{CodecError, StoreError};
    use crate::store::memory::MemoryStore;
    use crate::store::KeyIterator;

    fn empty_map() -> PersistentMap<u32> {
        PersistentMap::new(Box::new(JsonCodec::new()), Box::new(MemoryStore::new())).unwrap()
    }

    /// Encodes everything fine except the value it was told to refuse.
    struct RefusingCodec(u32);

    impl Codec<u32> for RefusingCodec {
        fn encode(&self, value: &u32) -> std::result::Result<Vec<u8>, CodecError> {
            if *value == self.0 {
                return Err(CodecError::Json(
                    serde_json::from_str::<u32>("refused").unwrap_err(),
                ));
            }
            JsonCodec::new().encode(value)
        }

        fn decode(&self, bytes: &[u8]) -> std::result::Result<u32, CodecError> {
            JsonCodec::new().decode(bytes)
        }
    }

    /// Lists a key it can't read.
    struct DanglingKeyStore;

    impl PersistenceStore for DanglingKeyStore {
        fn enumerate_keys(&self) -> KeyIterator<'_, String> {
            Box::new(std::iter::once("ghost".to_string()))
        }

        fn read(&self, key: &str) -> std::result::Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound(key.to_string()))
        }

        fn write(&mut self, _: &str, _: Vec<u8>) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        fn remove(&mut self, _: &str) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        fn clear(&mut self) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn put_returns_previous_value() {
        let mut map = empty_map();

        assert_eq!(map.put("a", 1).unwrap(), None);
        assert_eq!(map.put("a", 2).unwrap(), Some(1));
        assert_eq!(map.get("a"), Some(&2));
        assert_eq!(map.store().read("a").unwrap(), b"2".to_vec());
    }

    #[test]
    fn empty_key_is_rejected_before_any_change() {
        let mut map = empty_map();
        map.put("a", 1).unwrap();

        assert!(matches!(
            map.put("", 2),
            Err(PersistentMapError::InvalidArgument(_))
        ));
        assert!(matches!(
            map.remove(""),
            Err(PersistentMapError::InvalidArgument(_))
        ));
        assert_eq!(map.len(), 1);
        assert_eq!(map.store().enumerate_keys().count(), 1);
    }

    #[test]
    fn put_all_stops_at_invalid_key() {
        let mut map = empty_map();

        let result = map.put_all(vec![("a", 1), ("", 2), ("c", 3)]);

        assert!(matches!(result, Err(PersistentMapError::InvalidArgument(_))));
        assert_eq!(map.get("a"), Some(&1));
        assert!(!map.contains_key("c"));
    }

    #[test]
    fn encode_failure_is_swallowed() {
        let mut map: PersistentMap<u32> =
            PersistentMap::new(Box::new(RefusingCodec(13)), Box::new(MemoryStore::new()))
                .unwrap();

        assert_eq!(map.put("unlucky", 13).unwrap(), None);
        assert_eq!(map.get("unlucky"), Some(&13));
        assert!(map.store().read("unlucky").is_err());
    }

    #[test]
    fn hydration_read_failure_aborts_construction() {
        let result: Result<PersistentMap<u32>> =
            PersistentMap::new(Box::new(JsonCodec::new()), Box::new(DanglingKeyStore));

        match result {
            Err(PersistentMapError::HydrationRead { key, source }) => {
                assert_eq!(key, "ghost");
                assert!(matches!(source, StoreError::NotFound(_)));
            }
            other => panic!("expected hydration read failure, got {:?}", other.err()),
        }
    }

    #[test]
    fn hydration_rejects_an_empty_persisted_key() {
        let store: MemoryStore = [("", b"1".to_vec())].into_iter().collect();

        let result: Result<PersistentMap<u32>> =
            PersistentMap::new(Box::new(JsonCodec::new()), Box::new(store));

        assert!(matches!(
            result,
            Err(PersistentMapError::HydrationKey { key }) if key.is_empty()
        ));
    }

    #[test]
    fn hydration_decode_failure_aborts_construction() {
        let store: MemoryStore = [("good", b"1".to_vec()), ("bad", b"not json".to_vec())]
            .into_iter()
            .collect();

        let result: Result<PersistentMap<u32>> =
            PersistentMap::new(Box::new(JsonCodec::new()), Box::new(store));

        assert!(matches!(
            result,
            Err(PersistentMapError::HydrationDecode { key, .. }) if key == "bad"
        ));
    }

    #[test]
    fn hydration_does_not_rewrite_the_store() {
        let store: MemoryStore = [("a", b" 1 ".to_vec())].into_iter().collect();

        let map: PersistentMap<u32> =
            PersistentMap::new(Box::new(JsonCodec::new()), Box::new(store)).unwrap();

        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.store().read("a").unwrap(), b" 1 ".to_vec());
    }

    #[test]
    fn non_empty_delegate_is_rejected() {
        let delegate = HashMap::from([("stale".to_string(), 1u32)]);

        let result = PersistentMap::with_delegate(
            delegate,
            Box::new(JsonCodec::new()),
            Box::new(MemoryStore::new()),
        );

        assert!(matches!(
            result,
            Err(PersistentMapError::InvalidArgument(_))
        ));
    }

    #[test]
    fn with_delegate_hydrates_into_supplied_map() {
        let store: MemoryStore = [("a", b"1".to_vec())].into_iter().collect();

        let map = PersistentMap::with_delegate(
            HashMap::with_capacity(64),
            Box::new(JsonCodec::<u32>::new()),
            Box::new(store),
        )
        .unwrap();

        let (delegate, _, _) = map.into_parts();
        assert!(delegate.capacity() >= 64);
        assert_eq!(delegate.get("a"), Some(&1));
    }

    #[test]
    fn reads_cover_every_entry() {
        let mut map = empty_map();
        map.put_all([("a", 1), ("b", 2), ("c", 3)]).unwrap();

        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(map.values().sum::<u32>(), 6);
        assert_eq!(map.iter().count(), 3);
        assert_eq!((&map).into_iter().filter(|(_, v)| **v > 1).count(), 2);
        assert!(!map.is_empty());
    }

    #[test]
    fn debug_lists_entries() {
        let mut map = empty_map();
        map.put("a", 1).unwrap();

        assert_eq!(format!("{:?}", map), r#"{"a": 1}"#);
    }
}
