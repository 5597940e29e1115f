use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectStore;

/// in-memory object store, cheap to clone (clones share contents)
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<Hash, Arc<[u8]>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of distinct objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = Hash::of(bytes);
        self.objects
            .write()
            .entry(hash)
            .or_insert_with(|| Arc::from(bytes));
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(hash)
            .map(|b| b.to_vec())
            .ok_or(Error::ObjectNotFound(*hash))
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.objects.read().contains_key(hash)
    }

    fn list(&self) -> Result<Vec<Hash>> {
        Ok(self.objects.read().keys().copied().collect())
    }
}
