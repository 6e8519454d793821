pub mod disk;
pub mod memory;

use crate::chain::ChainSnapshot;
use anyhow::{Context, Result};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

const CHAINS: &str = "chains";

/// Raw byte storage under string keys.
pub trait KeyValueCollection: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// A store holding named collections, on disk or in memory.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        debug!("Opened store at {}", path.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Some(keyspace),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }

    pub fn collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>> {
        if let Some(collection) = self.collections.read().unwrap().get(name) {
            return Ok(collection.clone());
        }

        let collection: Arc<dyn KeyValueCollection> = match &self.keyspace {
            Some(keyspace) => {
                let partition = keyspace
                    .open_partition(name, PartitionCreateOptions::default())
                    .with_context(|| format!("Failed to open partition: {name}"))?;
                Arc::new(DiskCollection::new(keyspace.clone(), partition))
            }
            None => Arc::new(MemoryCollection::new()),
        };
        let mut collections = self.collections.write().unwrap();
        Ok(collections
            .entry(name.to_string())
            .or_insert(collection)
            .clone())
    }

    pub fn get_json<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.collection(collection)?.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt entry {key} in {collection}"))?;
        Ok(Some(value))
    }

    pub fn put_json<T: Serialize>(&self, collection: &str, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.collection(collection)?.put(key, &bytes)
    }

    /// The saved state of the local chain for `network`, if any.
    pub fn load_chain(&self, network: &str) -> Result<Option<ChainSnapshot>> {
        self.get_json(CHAINS, network)
    }

    pub fn save_chain(&self, snapshot: &ChainSnapshot) -> Result<()> {
        debug!(network = %snapshot.network, "Saving chain state");
        self.put_json(CHAINS, &snapshot.network, snapshot)
    }

    /// Forgets everything saved for `network`.
    pub fn reset_chain(&self, network: &str) -> Result<()> {
        self.collection(CHAINS)?.remove(network)
    }
}
