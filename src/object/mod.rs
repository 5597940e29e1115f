//! content store and the typed objects layered on top of it

pub mod changeset;
pub mod disk;
pub mod memory;
pub mod treenode;

pub use changeset::{decode_changeset, encode_changeset, read_changeset, write_changeset};
pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use treenode::{decode_treenode, encode_treenode, read_treenode, write_treenode};

use crate::error::Result;
use crate::hash::Hash;

/// content-addressed, write-once blob storage
///
/// `put` is idempotent: identical bytes always map to the same hash and
/// storing them again is a no-op. implementations must tolerate concurrent
/// puts of the same bytes.
pub trait ObjectStore: Send + Sync {
    /// store bytes, returning their hash
    fn put(&self, bytes: &[u8]) -> Result<Hash>;

    /// fetch bytes by hash, `Error::ObjectNotFound` if absent
    fn get(&self, hash: &Hash) -> Result<Vec<u8>>;

    /// check presence without reading
    fn contains(&self, hash: &Hash) -> bool;

    /// every stored hash, in no particular order
    fn list(&self) -> Result<Vec<Hash>>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        (**self).put(bytes)
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        (**self).get(hash)
    }

    fn contains(&self, hash: &Hash) -> bool {
        (**self).contains(hash)
    }

    fn list(&self) -> Result<Vec<Hash>> {
        (**self).list()
    }
}
