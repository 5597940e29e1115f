use crate::builder::{build_commit, BuildOptions};
use crate::error::{Error, Result};
use crate::fs::{file_type, read_content, FileType};
use crate::hash::Hash;
use crate::leaves::advance;
use crate::object::ObjectStore;
use crate::types::{Change, EntryType};
use crate::working::{Staged, WorkingCopy};

/// options for a working-copy commit
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    pub message: String,
    /// defaults to the repository's configured author
    pub author: Option<String>,
    /// commit even when nothing changed
    pub allow_empty: bool,
}

impl CommitOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// commit everything staged in the working copy
///
/// requires exactly one leaf. staged files are written to the store as
/// blobs, the new changeset is built on top of the leaf, and only then is the
/// leaf advanced. any failure leaves the leaf set untouched; blobs already
/// written stay behind as unreferenced objects.
pub fn commit(wc: &mut WorkingCopy<'_>, options: &CommitOptions) -> Result<Hash> {
    let repo = wc.repo();
    let parent = crate::leaves::single_leaf(repo)?;

    let diff = staged_changes(wc)?;

    let mut build = BuildOptions::new(
        options
            .author
            .clone()
            .unwrap_or_else(|| repo.config().author.clone()),
        options.message.clone(),
    );
    build.allow_empty = options.allow_empty;

    let changeset = build_commit(repo.store(), &parent, &diff, &build)?;
    advance(repo, Some(&parent), &changeset)?;
    wc.clear_staged();

    tracing::info!(changeset = %changeset, parent = %parent, changes = diff.len(), "committed");
    Ok(changeset)
}

/// stage every change in the working copy, then commit
pub fn commit_all(wc: &mut WorkingCopy<'_>, options: &CommitOptions) -> Result<Hash> {
    wc.scan_and_addremove()?;
    commit(wc, options)
}

/// read staged paths from disk, storing content as blobs
fn staged_changes(wc: &WorkingCopy<'_>) -> Result<Vec<Change>> {
    let store = wc.repo().store();
    let mut diff = Vec::with_capacity(wc.staged().len());

    for (path, staged) in wc.staged() {
        let gid = match staged {
            Staged::Remove => {
                diff.push(Change::remove(path.as_str()));
                continue;
            }
            Staged::Add { gid } => *gid,
        };

        let abs = wc.root().join(path);
        let change = match file_type(&abs)? {
            Some(FileType::Directory) => Change::Mkdir {
                path: path.clone(),
                gid,
            },
            Some(ft @ (FileType::Regular | FileType::Symlink)) => {
                let hid = store.put(&read_content(&abs, ft)?)?;
                let entry_type = if ft == FileType::Symlink {
                    EntryType::Symlink
                } else {
                    EntryType::File
                };
                Change::Put {
                    path: path.clone(),
                    entry_type,
                    hid,
                    gid,
                }
            }
            Some(FileType::Other) => return Err(Error::UnsupportedFileType(abs)),
            None => return Err(Error::PathNotFound(path.clone())),
        };
        diff.push(change);
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::lookup_path;
    use crate::leaves::{add_leaf, get_leaves, single_leaf};
    use crate::object::read_changeset;
    use crate::repo::Repo;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Repo, PathBuf) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();
        (dir, repo, work)
    }

    #[test]
    fn test_commit_advances_single_leaf() {
        let (_dir, repo, work) = setup();
        fs::write(work.join("file.txt"), "content").unwrap();

        let initial = single_leaf(&repo).unwrap();
        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        let cs = commit_all(&mut wc, &CommitOptions::new("first")).unwrap();

        assert_eq!(single_leaf(&repo).unwrap(), cs);
        let changeset = read_changeset(repo.store(), &cs).unwrap();
        assert_eq!(changeset.parents, vec![initial]);
        assert_eq!(changeset.author, repo.config().author);
        assert_eq!(changeset.message, "first");
        assert!(wc.staged().is_empty());
    }

    #[test]
    fn test_commit_author_override() {
        let (_dir, repo, work) = setup();
        fs::write(work.join("f"), "f").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        let options = CommitOptions {
            message: "m".to_string(),
            author: Some("someone".to_string()),
            allow_empty: false,
        };
        let cs = commit_all(&mut wc, &options).unwrap();

        assert_eq!(read_changeset(repo.store(), &cs).unwrap().author, "someone");
    }

    #[test]
    fn test_commit_nothing_staged() {
        let (_dir, repo, work) = setup();
        let initial = single_leaf(&repo).unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        assert!(matches!(
            commit(&mut wc, &CommitOptions::new("empty")),
            Err(Error::EmptyCommit)
        ));
        assert_eq!(single_leaf(&repo).unwrap(), initial);

        let mut options = CommitOptions::new("empty");
        options.allow_empty = true;
        let cs = commit(&mut wc, &options).unwrap();
        assert_eq!(single_leaf(&repo).unwrap(), cs);
    }

    #[test]
    fn test_commit_refuses_multiple_leaves() {
        let (_dir, repo, work) = setup();
        fs::write(work.join("f"), "one").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        let first = commit_all(&mut wc, &CommitOptions::new("one")).unwrap();

        // a second tip built off the initial changeset
        let initial = repo.initial_changeset().unwrap();
        let hid = repo.store().put(b"fork").unwrap();
        let fork = build_commit(
            repo.store(),
            &initial,
            &[Change::put_file("g", hid)],
            &BuildOptions::new("t", "fork"),
        )
        .unwrap();
        add_leaf(&repo, &fork).unwrap();

        fs::write(work.join("f"), "two").unwrap();
        let result = commit_all(&mut wc, &CommitOptions::new("two"));

        assert!(matches!(result, Err(Error::LeafCount(2))));
        assert_eq!(get_leaves(&repo).unwrap().len(), 2);
        assert!(get_leaves(&repo).unwrap().contains(&first));
    }

    #[test]
    fn test_failed_commit_keeps_leaf_and_staging() {
        let (_dir, repo, work) = setup();
        fs::write(work.join("f"), "f").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.stage_add(Path::new("f")).unwrap();
        fs::remove_file(work.join("f")).unwrap();

        let initial = single_leaf(&repo).unwrap();
        assert!(matches!(
            commit(&mut wc, &CommitOptions::new("x")),
            Err(Error::PathNotFound(_))
        ));
        assert_eq!(single_leaf(&repo).unwrap(), initial);
        assert_eq!(wc.staged().len(), 1);
    }

    #[test]
    fn test_appended_lines_change_hash() {
        let (_dir, repo, work) = setup();
        let lines: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        fs::write(work.join("a"), &lines).unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        let first = commit_all(&mut wc, &CommitOptions::new("one")).unwrap();
        let root = crate::builder::resolve_root(repo.store(), &first).unwrap();
        let h1 = lookup_path(repo.store(), &root, "a").unwrap().unwrap().hid;

        fs::write(work.join("a"), format!("{}line 21\n", lines)).unwrap();
        let second = commit_all(&mut wc, &CommitOptions::new("two")).unwrap();
        let root = crate::builder::resolve_root(repo.store(), &second).unwrap();
        let h2 = lookup_path(repo.store(), &root, "a").unwrap().unwrap().hid;

        assert_ne!(h1, h2);
        assert_eq!(repo.store().get(&h2).unwrap(), fs::read(work.join("a")).unwrap());
    }
}
