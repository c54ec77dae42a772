//! A write-through map: an ordinary in-memory `HashMap<String, Value>` whose every mutation is
//! mirrored to a durable [`PersistenceStore`] through a pluggable [`Codec`].
//!
//! The in-memory map is always the authoritative read surface. Persistence is best effort:
//! failures while mirroring a mutation are swallowed so the map stays usable even when the
//! backing store is degraded. Failures while hydrating at construction are fatal.

pub mod codec;
pub mod error;
pub mod persistent_map;
pub mod store;

pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use error::{CodecError, PersistentMapError, Result, StoreError};
pub use persistent_map::PersistentMap;
pub use store::discrete_files::{DiscreteFileStore, DiscreteFileStoreOptions};
pub use store::memory::MemoryStore;
pub use store::{KeyIterator, PersistenceStore};
