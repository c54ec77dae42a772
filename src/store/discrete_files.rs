use crate::error::StoreError;
use crate::store::{KeyIterator, PersistenceStore};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persists each key in its own file under `cache_directory`. File names are random, the key
/// travels inside the file next to its bytes, so any string is a safe key.
///
/// Before reaching for the non-volatile flavour, consider whether the map really needs to
/// rehydrate across restarts. Keeping data around means giving up "restart to clear corruption"
/// and having to think about N vs N+1 value schemas when upgrading or downgrading.
pub struct DiscreteFileStore {
    cache_directory: PathBuf,
    index: HashMap<String, PathBuf>,
}

/// Deserialisable so deployments can keep it next to the rest of their configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteFileStoreOptions {
    pub directory: PathBuf,

    /// Wipe `directory` when the store is created instead of picking up what's there.
    #[serde(default)]
    pub volatile: bool,
}

#[derive(Serialize, Deserialize)]
struct Record {
    key: String,
    bytes: Vec<u8>,
}

impl DiscreteFileStore {
    /// Opens (creating if needed) `cache_directory` and indexes every record already in it.
    pub fn open(cache_directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self {
            cache_directory: cache_directory.into(),
            index: HashMap::new(),
        };
        store.rehydrate_index()?;

        Ok(store)
    }

    /// Starts from an empty `cache_directory`, deleting anything a previous run left behind.
    pub fn volatile(cache_directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let cache_directory = cache_directory.into();
        wipe(&cache_directory)?;
        fs::create_dir_all(&cache_directory)?;

        Ok(Self {
            cache_directory,
            index: HashMap::new(),
        })
    }

    pub fn from_options(options: &DiscreteFileStoreOptions) -> Result<Self, StoreError> {
        if options.volatile {
            Self::volatile(options.directory.clone())
        } else {
            Self::open(options.directory.clone())
        }
    }

    pub fn directory(&self) -> &Path {
        &self.cache_directory
    }

    fn rehydrate_index(&mut self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_directory)?;

        for entry in fs::read_dir(&self.cache_directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            match read_record(&path) {
                Ok(record) => {
                    if let Some(previous) = self.index.insert(record.key.clone(), path.clone()) {
                        warn!(
                            "key {} is persisted twice, using {} over {}",
                            record.key,
                            path.display(),
                            previous.display()
                        );
                    }
                }
                Err(e) => warn!("skipping unreadable record {}: {}", path.display(), e),
            }
        }

        debug!(
            "indexed {} records in {}",
            self.index.len(),
            self.cache_directory.display()
        );
        Ok(())
    }

    // Whatever survived a failed wipe is still on disk and must stay visible.
    fn reindex_after_wipe(&mut self, wiped: io::Result<()>) -> Result<(), StoreError> {
        self.index.clear();
        self.rehydrate_index()?;

        wiped.map_err(StoreError::from)
    }

    fn new_record_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        path.push(&self.cache_directory);
        path.push(Uuid::new_v4().hyphenated().to_string());
        path
    }
}

impl PersistenceStore for DiscreteFileStore {
    fn enumerate_keys(&self) -> KeyIterator<'_, String> {
        Box::new(self.index.keys().cloned())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self
            .index
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let record = read_record(path)?;

        if record.key != key {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("{} holds key {}", path.display(), record.key),
            });
        }

        Ok(record.bytes)
    }

    fn write(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        // Only index the path once the record actually made it to disk.
        let record = Record {
            key: key.to_string(),
            bytes,
        };
        let path = match self.index.get(key) {
            Some(path) => {
                replace_record(path, &self.new_record_path(), &record)?;
                path.clone()
            }
            None => {
                let path = self.new_record_path();
                write_record(&path, &record)?;
                path
            }
        };
        self.index.insert(record.key, path);

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if let Some(path) = self.index.remove(key) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    self.index.insert(key.to_string(), path);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let wiped = wipe(&self.cache_directory);
        self.reindex_after_wipe(wiped)
    }
}

fn read_record(path: &Path) -> Result<Record, StoreError> {
    let bytes = fs::read(path)?;

    bincode::deserialize(&bytes).map_err(|e| StoreError::Corrupt {
        key: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_record(path: &Path, record: &Record) -> Result<(), StoreError> {
    let encoded = bincode::serialize(record).map_err(|e| StoreError::Other(e.to_string()))?;
    let mut file = File::create(path)?;
    file.write_all(&encoded)?;
    file.sync_all()?;

    Ok(())
}

/// Writes the new record next to `path` first, so a failed write leaves the old one intact.
fn replace_record(path: &Path, staging: &Path, record: &Record) -> Result<(), StoreError> {
    if let Err(e) = write_record(staging, record) {
        let _ = fs::remove_file(staging);
        return Err(e);
    }
    if let Err(e) = fs::rename(staging, path) {
        let _ = fs::remove_file(staging);
        return Err(e.into());
    }

    Ok(())
}

fn wipe(directory: &Path) -> io::Result<()> {
    match fs::remove_dir_all(directory) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}
