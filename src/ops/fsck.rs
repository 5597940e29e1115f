use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::leaves::get_leaves;
use crate::object::{read_changeset, read_treenode, ObjectStore};
use crate::repo::Repo;
use crate::types::EntryType;

/// fsck report
#[derive(Debug, Default)]
pub struct FsckReport {
    /// objects checked
    pub objects_checked: usize,
    /// objects whose bytes no longer match their hash, or fail to decode
    pub corrupt_objects: Vec<CorruptObject>,
    /// objects referenced by other objects but absent from the store
    pub missing_objects: Vec<MissingObject>,
    /// stored objects not reachable from any leaf
    pub dangling_objects: Vec<Hash>,
}

impl FsckReport {
    pub fn is_ok(&self) -> bool {
        self.corrupt_objects.is_empty() && self.missing_objects.is_empty()
    }
}

#[derive(Debug)]
pub struct CorruptObject {
    pub hash: Hash,
    pub object_type: Option<ObjectType>,
    pub message: String,
}

#[derive(Debug)]
pub struct MissingObject {
    pub hash: Hash,
    pub object_type: ObjectType,
    pub referenced_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Blob,
    Treenode,
    Changeset,
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Treenode => write!(f, "treenode"),
            ObjectType::Changeset => write!(f, "changeset"),
        }
    }
}

#[derive(Default)]
struct Reachable {
    blobs: HashSet<Hash>,
    treenodes: HashSet<Hash>,
    changesets: HashSet<Hash>,
}

impl Reachable {
    fn contains(&self, hash: &Hash) -> bool {
        self.blobs.contains(hash) || self.treenodes.contains(hash) || self.changesets.contains(hash)
    }
}

/// verify repository integrity
///
/// walks history from every leaf, then checks every stored object against
/// its hash. problems are collected into the report; only errors that stop
/// the walk itself (io, unreadable leaf file) are returned as `Err`.
pub fn fsck(repo: &Repo) -> Result<FsckReport> {
    let store = repo.store();
    let mut report = FsckReport::default();
    let mut reachable = Reachable::default();

    let mut changesets: Vec<(Hash, String)> = get_leaves(repo)?
        .into_iter()
        .map(|leaf| (leaf, "leaf".to_string()))
        .collect();

    while let Some((hash, referenced_by)) = changesets.pop() {
        if !reachable.changesets.insert(hash) {
            continue;
        }
        match read_changeset(store, &hash) {
            Ok(changeset) => {
                check_tree(store, &changeset.root, &hash, &mut reachable, &mut report)?;
                for parent in changeset.parents {
                    changesets.push((parent, format!("changeset {}", hash)));
                }
            }
            Err(e) => record_failure(&mut report, hash, ObjectType::Changeset, referenced_by, e)?,
        }
    }

    // every stored object: hash check, and reachability
    let mut all = store.list()?;
    all.sort();
    for hash in all {
        report.objects_checked += 1;

        // reachable objects were already read and verified during the walk
        if reachable.contains(&hash) {
            continue;
        }

        if let Err(e) = store.get(&hash) {
            if !e.is_corrupt() {
                return Err(e);
            }
            report.corrupt_objects.push(CorruptObject {
                hash,
                object_type: None,
                message: e.to_string(),
            });
        }
        report.dangling_objects.push(hash);
    }

    tracing::info!(
        checked = report.objects_checked,
        corrupt = report.corrupt_objects.len(),
        missing = report.missing_objects.len(),
        dangling = report.dangling_objects.len(),
        "fsck finished"
    );
    Ok(report)
}

fn check_tree<S: ObjectStore + ?Sized>(
    store: &S,
    root: &Hash,
    changeset: &Hash,
    reachable: &mut Reachable,
    report: &mut FsckReport,
) -> Result<()> {
    let mut pending = vec![(*root, format!("changeset {}", changeset))];

    while let Some((hash, referenced_by)) = pending.pop() {
        if !reachable.treenodes.insert(hash) {
            continue;
        }
        let node = match read_treenode(store, &hash) {
            Ok(node) => node,
            Err(e) => {
                record_failure(report, hash, ObjectType::Treenode, referenced_by, e)?;
                continue;
            }
        };

        for entry in node.entries() {
            let by = format!("treenode {} entry {}", hash, entry.name);
            match entry.entry_type {
                EntryType::Directory => pending.push((entry.hid, by)),
                EntryType::File | EntryType::Symlink => {
                    if !reachable.blobs.insert(entry.hid) {
                        continue;
                    }
                    match store.get(&entry.hid) {
                        Ok(_) => {}
                        Err(e) => record_failure(report, entry.hid, ObjectType::Blob, by, e)?,
                    }
                }
            }
        }
    }

    Ok(())
}

/// file a read failure under missing or corrupt, passing anything else through
fn record_failure(
    report: &mut FsckReport,
    hash: Hash,
    object_type: ObjectType,
    referenced_by: String,
    error: Error,
) -> Result<()> {
    match error {
        Error::ObjectNotFound(_) => report.missing_objects.push(MissingObject {
            hash,
            object_type,
            referenced_by,
        }),
        e if e.is_corrupt() => report.corrupt_objects.push(CorruptObject {
            hash,
            object_type: Some(object_type),
            message: e.to_string(),
        }),
        e => return Err(e),
    }
    Ok(())
}
