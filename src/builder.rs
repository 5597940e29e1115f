//! changeset builder
//!
//! turns a list of path edits against a parent changeset into new treenodes
//! and a new changeset. only directories with a changed descendant are
//! loaded and re-encoded; every other subtree keeps its hash.
//!
//! building happens in two phases: [`plan_commit`] does all reading and
//! validation and produces the encoded objects in memory, [`build_commit`]
//! writes them. a rejected diff therefore never touches the store.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{encode_treenode, read_changeset, read_treenode, write_changeset, ObjectStore};
use crate::types::{validate_entry_name, Change, Changeset, EntryType, Gid, Treenode, TreenodeEntry};

/// changeset fields supplied by the caller
#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub author: String,
    pub message: String,
    /// seconds since epoch, `None` for now
    pub timestamp: Option<i64>,
    pub metadata: BTreeMap<String, String>,
    /// accept an empty diff or one that leaves the root unchanged
    pub allow_empty: bool,
}

impl BuildOptions {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            timestamp: None,
            metadata: BTreeMap::new(),
            allow_empty: false,
        }
    }
}

/// everything a commit will write, computed without writing
#[derive(Debug)]
pub struct CommitPlan {
    /// encoded treenodes, children before parents, root last
    pub treenodes: Vec<(Hash, Vec<u8>)>,
    /// hash of the new root treenode
    pub root: Hash,
    pub changeset: Changeset,
}

/// the root treenode hash recorded in a changeset
pub fn resolve_root<S: ObjectStore + ?Sized>(store: &S, changeset: &Hash) -> Result<Hash> {
    Ok(read_changeset(store, changeset)?.root)
}

/// look up the entry at `path` below a root treenode
///
/// returns `Ok(None)` when any component is missing; a non-directory in
/// the middle of the path is `NotADirectory`.
pub fn lookup_path<S: ObjectStore + ?Sized>(
    store: &S,
    root: &Hash,
    path: &str,
) -> Result<Option<TreenodeEntry>> {
    let components = split_path(path)?;
    let mut node = read_treenode(store, root)?;

    for (i, name) in components.iter().enumerate() {
        let entry = match node.get(name) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };
        if i + 1 == components.len() {
            return Ok(Some(entry));
        }
        if !entry.is_directory() {
            return Err(Error::NotADirectory(components[..=i].join("/")));
        }
        node = read_treenode(store, &entry.hid)?;
    }

    Ok(None)
}

/// apply `diff` on top of `parent` and store the result
///
/// returns the hash of the new changeset. the leaf set is not touched;
/// that is the caller's job once the changeset is durable.
pub fn build_commit<S: ObjectStore + ?Sized>(
    store: &S,
    parent: &Hash,
    diff: &[Change],
    options: &BuildOptions,
) -> Result<Hash> {
    let plan = plan_commit(store, parent, diff, options)?;

    for (hash, bytes) in &plan.treenodes {
        let stored = store.put(bytes)?;
        debug_assert_eq!(&stored, hash);
    }
    let changeset_hash = write_changeset(store, &plan.changeset)?;

    tracing::info!(
        changeset = %changeset_hash,
        root = %plan.root,
        changes = diff.len(),
        treenodes = plan.treenodes.len(),
        "built changeset"
    );
    Ok(changeset_hash)
}

/// one directory being rebuilt
struct DirState {
    depth: usize,
    entries: BTreeMap<String, TreenodeEntry>,
}

impl DirState {
    fn from_treenode(depth: usize, node: Treenode) -> Self {
        let entries = node
            .into_entries()
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();
        Self { depth, entries }
    }

    fn empty(depth: usize) -> Self {
        Self {
            depth,
            entries: BTreeMap::new(),
        }
    }
}

/// validate `diff` against `parent` and compute every object to write
pub fn plan_commit<S: ObjectStore + ?Sized>(
    store: &S,
    parent: &Hash,
    diff: &[Change],
    options: &BuildOptions,
) -> Result<CommitPlan> {
    if diff.is_empty() && !options.allow_empty {
        return Err(Error::EmptyCommit);
    }

    let changes = index_changes(diff)?;

    for change in changes.values() {
        if let Change::Put { hid, .. } = change {
            if !store.contains(hid) {
                return Err(Error::ObjectNotFound(*hid));
            }
        }
    }

    let parent_root = resolve_root(store, parent)?;
    let mut dirs: HashMap<String, DirState> = HashMap::new();
    dirs.insert(
        String::new(),
        DirState::from_treenode(0, read_treenode(store, &parent_root)?),
    );

    // BTreeMap order visits a directory before anything beneath it
    for (path, change) in &changes {
        let components: Vec<&str> = path.split('/').collect();
        let (name, parents) = match components.split_last() {
            Some(split) => split,
            None => return Err(Error::InvalidEntryName(path.clone())),
        };
        let parent_key = ensure_dirs(store, &mut dirs, parents)?;
        apply_change(store, &mut dirs, &parent_key, path, name, change)?;
    }

    // explicit work list, deepest directories first
    let mut order: Vec<(usize, String)> = dirs.iter().map(|(k, d)| (d.depth, k.clone())).collect();
    order.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut treenodes = Vec::with_capacity(order.len());
    let mut root = parent_root;
    for (_, key) in order {
        let state = match dirs.remove(&key) {
            Some(state) => state,
            None => continue,
        };
        let node = Treenode::new(state.entries.into_values().collect())?;
        let bytes = encode_treenode(&node)?;
        let hash = Hash::of(&bytes);
        treenodes.push((hash, bytes));

        if key.is_empty() {
            root = hash;
            continue;
        }
        let (parent_key, name) = split_parent(&key);
        let entry = dirs
            .get_mut(parent_key)
            .and_then(|parent| parent.entries.get_mut(name))
            .ok_or_else(|| Error::PathNotFound(key.clone()))?;
        entry.hid = hash;
    }

    if root == parent_root && !options.allow_empty {
        return Err(Error::EmptyCommit);
    }

    let mut changeset = match options.timestamp {
        Some(ts) => Changeset::with_timestamp(
            root,
            vec![*parent],
            options.author.clone(),
            ts,
            options.message.clone(),
        ),
        None => Changeset::new(
            root,
            vec![*parent],
            options.author.clone(),
            options.message.clone(),
        ),
    };
    changeset.metadata = options.metadata.clone();

    tracing::debug!(root = %root, treenodes = treenodes.len(), "planned changeset");
    Ok(CommitPlan {
        treenodes,
        root,
        changeset,
    })
}

/// normalize paths and reject diffs that contradict themselves
fn index_changes(diff: &[Change]) -> Result<BTreeMap<String, &Change>> {
    let mut changes: BTreeMap<String, &Change> = BTreeMap::new();
    let mut gids: HashMap<Gid, String> = HashMap::new();

    for change in diff {
        let path = split_path(change.path())?.join("/");

        let gid = match change {
            Change::Put { gid, .. } | Change::Mkdir { gid, .. } => *gid,
            Change::Remove { .. } => None,
        };
        if let Some(gid) = gid {
            if let Some(first) = gids.insert(gid, path.clone()) {
                return Err(Error::ConflictingStableId {
                    gid: gid.to_string(),
                    first,
                    second: path,
                });
            }
        }

        if changes.insert(path.clone(), change).is_some() {
            return Err(Error::ConflictingChange(path));
        }
    }

    // nothing may change beneath a path that is replaced or removed
    for path in changes.keys() {
        let mut ancestor = path.as_str();
        while let Some(idx) = ancestor.rfind('/') {
            ancestor = &path[..idx];
            if let Some(Change::Put { .. } | Change::Remove { .. }) = changes.get(ancestor) {
                return Err(Error::ConflictingChange(path.clone()));
            }
        }
    }

    Ok(changes)
}

/// load (or create) every directory along `components`, returning the key
/// of the deepest one
fn ensure_dirs<S: ObjectStore + ?Sized>(
    store: &S,
    dirs: &mut HashMap<String, DirState>,
    components: &[&str],
) -> Result<String> {
    let mut key = String::new();

    for (depth, name) in components.iter().enumerate() {
        let child_key = join_key(&key, name);
        if !dirs.contains_key(&child_key) {
            let parent = dirs
                .get_mut(&key)
                .ok_or_else(|| Error::PathNotFound(key.clone()))?;

            let state = match parent.entries.get(*name) {
                Some(entry) if entry.is_directory() => {
                    DirState::from_treenode(depth + 1, read_treenode(store, &entry.hid)?)
                }
                Some(_) => return Err(Error::NotADirectory(child_key)),
                None => {
                    // implicit parent directory; hash filled in on rebuild
                    parent
                        .entries
                        .insert(name.to_string(), TreenodeEntry::directory(*name, Hash::ZERO));
                    DirState::empty(depth + 1)
                }
            };
            dirs.insert(child_key.clone(), state);
        }
        key = child_key;
    }

    Ok(key)
}

fn apply_change<S: ObjectStore + ?Sized>(
    store: &S,
    dirs: &mut HashMap<String, DirState>,
    parent_key: &str,
    path: &str,
    name: &str,
    change: &Change,
) -> Result<()> {
    let depth = dirs.get(parent_key).map(|d| d.depth + 1).unwrap_or(1);
    let parent = dirs
        .get_mut(parent_key)
        .ok_or_else(|| Error::PathNotFound(parent_key.to_string()))?;

    match change {
        Change::Put {
            entry_type,
            hid,
            gid,
            ..
        } => {
            let gid = match (gid, parent.entries.get(name)) {
                (Some(gid), _) => *gid,
                (None, Some(existing)) if !existing.is_directory() => existing.gid,
                (None, _) => Gid::new(),
            };
            parent
                .entries
                .insert(name.to_string(), TreenodeEntry::new(gid, name, *entry_type, *hid));
        }

        Change::Mkdir { gid, .. } => {
            let existing = parent.entries.get(name).cloned();
            let state = match existing {
                Some(entry) if entry.is_directory() => {
                    if let Some(gid) = gid {
                        if let Some(e) = parent.entries.get_mut(name) {
                            e.gid = *gid;
                        }
                    }
                    DirState::from_treenode(depth, read_treenode(store, &entry.hid)?)
                }
                _ => {
                    let gid = gid.unwrap_or_default();
                    parent.entries.insert(
                        name.to_string(),
                        TreenodeEntry::new(gid, name, EntryType::Directory, Hash::ZERO),
                    );
                    DirState::empty(depth)
                }
            };
            dirs.insert(path.to_string(), state);
        }

        Change::Remove { .. } => {
            if parent.entries.remove(name).is_none() {
                return Err(Error::PathNotFound(path.to_string()));
            }
        }
    }

    Ok(())
}

/// split a `/`-separated path into validated components
pub(crate) fn split_path(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidEntryName(format!("empty path: {:?}", path)));
    }
    let components: Vec<&str> = trimmed.split('/').collect();
    for component in &components {
        validate_entry_name(component)?;
    }
    Ok(components)
}

fn join_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn split_parent(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(idx) => (&key[..idx], &key[idx + 1..]),
        None => ("", key),
    }
}
