//! the repository's current tips
//!
//! the leaf set is the only mutable state in a repository. every mutation
//! runs under the repository lock and states which leaves it expects to
//! replace, so two writers extending the same leaf cannot both win.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::fsync_dir;
use crate::hash::Hash;
use crate::object::ObjectStore;
use crate::repo::Repo;

/// read the current leaf set
pub fn get_leaves(repo: &Repo) -> Result<BTreeSet<Hash>> {
    let path = repo.leaves_path();

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(Error::Io { path, source: e }),
    };

    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            Hash::from_hex(l)
                .map_err(|_| Error::CorruptObjectMessage(format!("invalid leaf entry: {}", l)))
        })
        .collect()
}

/// the one leaf a linear commit extends
///
/// anything other than exactly one leaf is a precondition failure: the
/// caller has to merge (or pick a branch) first.
pub fn single_leaf(repo: &Repo) -> Result<Hash> {
    let leaves = get_leaves(repo)?;
    match leaves.len() {
        1 => Ok(*leaves.iter().next().ok_or(Error::LeafCount(0))?),
        n => Err(Error::LeafCount(n)),
    }
}

/// replace `expected` with its child `new`
///
/// with `expected = None` the leaf set must be empty (first changeset).
/// fails with `LeafRaceLost` if `expected` is no longer a leaf.
pub fn advance(repo: &Repo, expected: Option<&Hash>, new: &Hash) -> Result<()> {
    let expected: Vec<Hash> = expected.into_iter().copied().collect();
    advance_merge(repo, &expected, new)
}

/// replace every leaf in `expected` with the single leaf `new`
pub fn advance_merge(repo: &Repo, expected: &[Hash], new: &Hash) -> Result<()> {
    if !repo.store().contains(new) {
        return Err(Error::ObjectNotFound(*new));
    }

    let _lock = repo.lock()?;
    let mut leaves = get_leaves(repo)?;

    if expected.is_empty() && !leaves.is_empty() {
        return Err(Error::LeafRaceLost("(none)".to_string()));
    }
    for hash in expected {
        if !leaves.remove(hash) {
            return Err(Error::LeafRaceLost(hash.to_hex()));
        }
    }
    leaves.insert(*new);

    write_leaves(repo, &leaves)?;
    tracing::debug!(replaced = expected.len(), leaf = %new, "advanced leaf");
    Ok(())
}

/// record an additional tip, e.g. a changeset built on an older ancestor
pub fn add_leaf(repo: &Repo, new: &Hash) -> Result<()> {
    if !repo.store().contains(new) {
        return Err(Error::ObjectNotFound(*new));
    }

    let _lock = repo.lock()?;
    let mut leaves = get_leaves(repo)?;
    if leaves.insert(*new) {
        write_leaves(repo, &leaves)?;
        tracing::debug!(leaf = %new, total = leaves.len(), "added leaf");
    }
    Ok(())
}

/// persist the leaf set atomically; caller holds the repository lock
fn write_leaves(repo: &Repo, leaves: &BTreeSet<Hash>) -> Result<()> {
    let path = repo.leaves_path();

    // atomic write: temp -> fsync -> rename
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        for leaf in leaves {
            writeln!(tmp_file, "{}", leaf.to_hex()).with_path(&tmp_path)?;
        }
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, &path).with_path(&path)?;
    fsync_dir(repo.path())
}
