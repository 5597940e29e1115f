use crate::builder::resolve_root;
use crate::error::Result;
use crate::hash::Hash;
use crate::object::{read_treenode, ObjectStore};
use crate::repo::Repo;
use crate::types::{ChangeKind, DiffEntry, Treenode};

/// compare two changesets and return the paths that differ
pub fn diff(repo: &Repo, from: &Hash, to: &Hash) -> Result<Vec<DiffEntry>> {
    let tree1 = resolve_root(repo.store(), from)?;
    let tree2 = resolve_root(repo.store(), to)?;

    diff_trees(repo.store(), &tree1, &tree2, "")
}

/// compare two treenode hashes
///
/// identical hashes short-circuit, so unchanged subtrees are never read.
pub fn diff_trees<S: ObjectStore + ?Sized>(
    store: &S,
    tree1: &Hash,
    tree2: &Hash,
    prefix: &str,
) -> Result<Vec<DiffEntry>> {
    let mut changes = Vec::new();
    let mut pending = vec![(*tree1, *tree2, prefix.to_string())];

    while let Some((h1, h2, prefix)) = pending.pop() {
        if h1 == h2 {
            continue;
        }
        let t1 = read_treenode(store, &h1)?;
        let t2 = read_treenode(store, &h2)?;

        for (name, e1, e2) in merge_names(&t1, &t2) {
            let path = join(&prefix, name);

            match (e1, e2) {
                (None, Some(entry)) => {
                    changes.push(DiffEntry::new(path.clone(), ChangeKind::Added));
                    if entry.is_directory() {
                        report_all(store, &entry.hid, &path, ChangeKind::Added, &mut changes)?;
                    }
                }
                (Some(entry), None) => {
                    changes.push(DiffEntry::new(path.clone(), ChangeKind::Deleted));
                    if entry.is_directory() {
                        report_all(store, &entry.hid, &path, ChangeKind::Deleted, &mut changes)?;
                    }
                }
                (Some(e1), Some(e2)) => {
                    if e1.is_directory() && e2.is_directory() {
                        pending.push((e1.hid, e2.hid, path));
                    } else if e1.entry_type != e2.entry_type {
                        // type change: the old subtree goes, the new one arrives
                        changes.push(DiffEntry::new(path.clone(), ChangeKind::Modified));
                        if e1.is_directory() {
                            report_all(store, &e1.hid, &path, ChangeKind::Deleted, &mut changes)?;
                        }
                        if e2.is_directory() {
                            report_all(store, &e2.hid, &path, ChangeKind::Added, &mut changes)?;
                        }
                    } else if e1.hid != e2.hid {
                        changes.push(DiffEntry::new(path, ChangeKind::Modified));
                    }
                }
                (None, None) => {}
            }
        }
    }

    // sort by path
    changes.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(changes)
}

type Paired<'a> = (
    &'a str,
    Option<&'a crate::types::TreenodeEntry>,
    Option<&'a crate::types::TreenodeEntry>,
);

/// walk two sorted listings side by side
fn merge_names<'a>(t1: &'a Treenode, t2: &'a Treenode) -> Vec<Paired<'a>> {
    let (a, b) = (t1.entries(), t2.entries());
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len().max(b.len()));

    while i < a.len() || j < b.len() {
        let order = match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) => x.name.as_bytes().cmp(y.name.as_bytes()),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, _) => std::cmp::Ordering::Greater,
        };
        match order {
            std::cmp::Ordering::Less => {
                out.push((a[i].name.as_str(), Some(&a[i]), None));
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push((b[j].name.as_str(), None, Some(&b[j])));
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push((a[i].name.as_str(), Some(&a[i]), Some(&b[j])));
                i += 1;
                j += 1;
            }
        }
    }

    out
}

/// report every entry beneath a directory with the same kind
fn report_all<S: ObjectStore + ?Sized>(
    store: &S,
    tree: &Hash,
    prefix: &str,
    kind: ChangeKind,
    changes: &mut Vec<DiffEntry>,
) -> Result<()> {
    let mut pending = vec![(*tree, prefix.to_string())];

    while let Some((hash, prefix)) = pending.pop() {
        for entry in read_treenode(store, &hash)?.entries() {
            let path = join(&prefix, &entry.name);
            if entry.is_directory() {
                pending.push((entry.hid, path.clone()));
            }
            changes.push(DiffEntry::new(path, kind));
        }
    }

    Ok(())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
