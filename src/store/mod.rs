pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// Named collections, persisted in a fjall keyspace when one could be opened.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens the keyspace under `<data_path>/cache`. Persistent collections
    /// fall back to memory when it cannot be opened.
    pub fn open(data_path: &Path) -> Self {
        let cache_dir = data_path.join("cache");
        let keyspace = match fjall::Config::new(&cache_dir).open() {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!(
                    "Could not open cache at {}: {e}. Using in-memory cache.",
                    cache_dir.display()
                );
                None
            }
        };
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }

    fn create(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection> {
        if persist {
            if let Some(keyspace) = &self.keyspace {
                match keyspace.open_partition(name, PartitionCreateOptions::default()) {
                    Ok(partition) => return Arc::new(DiskCollection::new(partition)),
                    Err(e) => warn!("Could not open cache partition {name}: {e}"),
                }
            }
        }
        debug!("Creating in-memory collection {name}");
        Arc::new(MemoryCollection::new())
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        if let Some(existing) = self
            .collections
            .read()
            .ok()
            .and_then(|collections| collections.get(name).cloned())
        {
            return Some(existing);
        }
        if !create_if_missing {
            return None;
        }

        let mut collections = self.collections.write().ok()?;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| self.create(name, persist));
        Some(Arc::clone(collection))
    }
}
