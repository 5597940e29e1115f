use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectStore;
use crate::types::Changeset;

pub fn encode_changeset(changeset: &Changeset) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(changeset, &mut bytes)?;
    Ok(bytes)
}

pub fn decode_changeset(bytes: &[u8]) -> Result<Changeset> {
    ciborium::from_reader(bytes)
        .map_err(|e| Error::CorruptObjectMessage(format!("invalid changeset encoding: {}", e)))
}

/// write a changeset to the store
pub fn write_changeset<S: ObjectStore + ?Sized>(store: &S, changeset: &Changeset) -> Result<Hash> {
    store.put(&encode_changeset(changeset)?)
}

/// read a changeset from the store
pub fn read_changeset<S: ObjectStore + ?Sized>(store: &S, hash: &Hash) -> Result<Changeset> {
    let bytes = store.get(hash)?;
    decode_changeset(&bytes).map_err(|e| match e {
        Error::CorruptObjectMessage(msg) => {
            Error::CorruptObjectMessage(format!("changeset {}: {}", hash, msg))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{write_treenode, MemoryStore};
    use crate::types::{Treenode, TreenodeEntry};

    #[test]
    fn test_write_and_read_changeset() {
        let store = MemoryStore::new();

        let changeset =
            Changeset::with_timestamp(Hash::ZERO, vec![], "author", 1234567890, "test commit");

        let hash = write_changeset(&store, &changeset).unwrap();
        assert_eq!(read_changeset(&store, &hash).unwrap(), changeset);
    }

    #[test]
    fn test_changeset_deduplication() {
        let store = MemoryStore::new();
        let changeset = Changeset::with_timestamp(Hash::ZERO, vec![], "author", 1, "test");

        let h1 = write_changeset(&store, &changeset).unwrap();
        let h2 = write_changeset(&store, &changeset).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_changeset_with_parents_and_metadata() {
        let store = MemoryStore::new();

        let p1 = Hash::of(b"p1");
        let p2 = Hash::of(b"p2");
        let changeset = Changeset::with_timestamp(Hash::ZERO, vec![p1, p2], "a", 1, "merge")
            .with_metadata("key1", "value1");

        let hash = write_changeset(&store, &changeset).unwrap();
        let read = read_changeset(&store, &hash).unwrap();

        assert!(read.is_merge());
        assert_eq!(read.parents, vec![p1, p2]);
        assert_eq!(read.metadata.get("key1"), Some(&"value1".to_string()));
    }

    #[test]
    fn test_treenode_is_not_a_changeset() {
        let store = MemoryStore::new();
        let node = Treenode::new(vec![TreenodeEntry::file("a", Hash::ZERO)]).unwrap();
        let hash = write_treenode(&store, &node).unwrap();

        assert!(read_changeset(&store, &hash).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_read_nonexistent_changeset() {
        let store = MemoryStore::new();
        let result = read_changeset(&store, &Hash::of(b"unknown"));
        assert!(matches!(result, Err(Error::ObjectNotFound(_))));
    }
}
