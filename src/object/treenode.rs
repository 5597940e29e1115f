use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectStore;
use crate::types::Treenode;

/// serialize a treenode to its canonical bytes
///
/// entries are always name-sorted inside a `Treenode`, so the same logical
/// listing encodes to the same bytes however it was assembled.
pub fn encode_treenode(node: &Treenode) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(node, &mut bytes)?;
    Ok(bytes)
}

/// parse treenode bytes, rejecting anything that is not a canonical listing
pub fn decode_treenode(bytes: &[u8]) -> Result<Treenode> {
    let decoded: Treenode = ciborium::from_reader(bytes)
        .map_err(|e| Error::CorruptObjectMessage(format!("invalid treenode encoding: {}", e)))?;

    let validated = Treenode::new(decoded.entries().to_vec())
        .map_err(|e| Error::CorruptObjectMessage(format!("invalid treenode: {}", e)))?;

    if validated != decoded {
        return Err(Error::CorruptObjectMessage(
            "treenode entries are not in canonical order".to_string(),
        ));
    }

    Ok(validated)
}

/// write a treenode to the store
pub fn write_treenode<S: ObjectStore + ?Sized>(store: &S, node: &Treenode) -> Result<Hash> {
    store.put(&encode_treenode(node)?)
}

/// read a treenode from the store
pub fn read_treenode<S: ObjectStore + ?Sized>(store: &S, hash: &Hash) -> Result<Treenode> {
    let bytes = store.get(hash)?;
    decode_treenode(&bytes).map_err(|e| match e {
        Error::CorruptObjectMessage(msg) => {
            Error::CorruptObjectMessage(format!("treenode {}: {}", hash, msg))
        }
        other => other,
    })
}
