use super::KeyValueCollection;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Collection that lives only as long as the process.
#[derive(Default)]
pub struct MemoryCollection {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueCollection for MemoryCollection {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.inner.read().unwrap().get(key).cloned();
        if value.is_some() {
            debug!(key, "Store HIT");
        } else {
            debug!(key, "Store MISS");
        }
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        debug!(key, bytes = value.len(), "Store PUT");
        self.inner
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        debug!(key, "Store REMOVE");
        self.inner.write().unwrap().remove(key);
        Ok(())
    }
}
