use crate::builder::{lookup_path, resolve_root};
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{read_treenode, ObjectStore};
use crate::repo::Repo;
use crate::types::TreenodeEntry;

/// tree entry with full path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsTreeEntry {
    pub path: String,
    pub entry: TreenodeEntry,
}

/// list one directory of a changeset, the root when `path` is `None`
///
/// a path naming a file lists just that entry.
pub fn ls_tree(repo: &Repo, changeset: &Hash, path: Option<&str>) -> Result<Vec<LsTreeEntry>> {
    let root = resolve_root(repo.store(), changeset)?;

    let path = match path.map(|p| p.trim_matches('/')) {
        None | Some("") => return list_dir(repo.store(), &root, ""),
        Some(p) => p,
    };

    let entry = lookup_path(repo.store(), &root, path)?
        .ok_or_else(|| Error::PathNotFound(path.to_string()))?;

    if entry.is_directory() {
        list_dir(repo.store(), &entry.hid, path)
    } else {
        Ok(vec![LsTreeEntry {
            path: path.to_string(),
            entry,
        }])
    }
}

/// every entry in a changeset, directories included
pub fn ls_tree_recursive(repo: &Repo, changeset: &Hash) -> Result<Vec<LsTreeEntry>> {
    let root = resolve_root(repo.store(), changeset)?;
    manifest(repo.store(), &root)
}

/// flatten a tree into path-sorted entries
///
/// walks with an explicit stack so tree depth never grows the call stack.
pub fn manifest<S: ObjectStore + ?Sized>(store: &S, root: &Hash) -> Result<Vec<LsTreeEntry>> {
    let mut entries = Vec::new();
    let mut pending = vec![(String::new(), *root)];

    while let Some((prefix, hash)) = pending.pop() {
        for listed in list_dir(store, &hash, &prefix)? {
            if listed.entry.is_directory() {
                pending.push((listed.path.clone(), listed.entry.hid));
            }
            entries.push(listed);
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn list_dir<S: ObjectStore + ?Sized>(store: &S, hash: &Hash, prefix: &str) -> Result<Vec<LsTreeEntry>> {
    let node = read_treenode(store, hash)?;

    Ok(node
        .into_entries()
        .into_iter()
        .map(|entry| {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };
            LsTreeEntry { path, entry }
        })
        .collect())
}

impl std::fmt::Display for LsTreeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<9} {} {}    {}",
            self.entry.entry_type.type_name(),
            self.entry.hid.short(),
            self.entry.gid,
            self.path
        )
    }
}
