use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::{lookup_path, resolve_root};
use crate::error::{Error, IoResultExt, Result};
use crate::fs::{create_directory, create_symlink, file_type, write_file, FileType};
use crate::hash::Hash;
use crate::object::{read_treenode, ObjectStore};
use crate::repo::Repo;
use crate::types::EntryType;

/// export options
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// export into a non-empty target, replacing whatever is in the way
    pub force: bool,
}

/// what an export wrote
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub directories: usize,
    pub files: usize,
    pub symlinks: usize,
    /// file content bytes written
    pub bytes: u64,
}

/// materialize a changeset's tree into `target`
///
/// `target` must be missing or empty unless `options.force` is set. file
/// content is written verbatim; symlinks point at their stored target text.
/// a missing object anywhere in the tree aborts the export.
pub fn export(
    repo: &Repo,
    changeset: &Hash,
    target: &Path,
    options: &ExportOptions,
) -> Result<ExportStats> {
    let root = resolve_root(repo.store(), changeset)?;

    if target.exists() {
        if !options.force {
            let is_empty = target.read_dir().with_path(target)?.next().is_none();
            if !is_empty {
                return Err(Error::TargetNotEmpty(target.to_path_buf()));
            }
        }
    } else {
        create_directory(target)?;
    }

    let stats = export_tree(repo.store(), &root, target, options)?;

    tracing::info!(
        changeset = %changeset,
        target = %target.display(),
        files = stats.files,
        directories = stats.directories,
        symlinks = stats.symlinks,
        "exported"
    );
    Ok(stats)
}

/// write the tree rooted at `root` beneath `target`, which must exist
pub fn export_tree<S: ObjectStore + ?Sized>(
    store: &S,
    root: &Hash,
    target: &Path,
    options: &ExportOptions,
) -> Result<ExportStats> {
    let mut stats = ExportStats::default();
    let mut pending: Vec<(Hash, PathBuf)> = vec![(*root, target.to_path_buf())];

    while let Some((hash, dir)) = pending.pop() {
        let node = read_treenode(store, &hash)?;

        for entry in node.entries() {
            let dest = dir.join(&entry.name);
            match entry.entry_type {
                EntryType::Directory => {
                    if options.force {
                        clear_non_directory(&dest)?;
                    }
                    create_directory(&dest)?;
                    stats.directories += 1;
                    pending.push((entry.hid, dest));
                }
                EntryType::File => {
                    if options.force {
                        clear_directory(&dest)?;
                    }
                    stats.bytes += export_file(store, &dest, &entry.hid)?;
                    stats.files += 1;
                }
                EntryType::Symlink => {
                    if options.force {
                        clear_directory(&dest)?;
                    }
                    export_symlink(store, &dest, &entry.hid)?;
                    stats.symlinks += 1;
                }
            }
        }
    }

    Ok(stats)
}

/// export a single file or symlink from a changeset to `dest`
///
/// an existing file at `dest` is replaced; directories are rejected.
pub fn export_path(repo: &Repo, changeset: &Hash, path: &str, dest: &Path) -> Result<()> {
    let root = resolve_root(repo.store(), changeset)?;
    let entry = lookup_path(repo.store(), &root, path)?
        .ok_or_else(|| Error::PathNotFound(path.to_string()))?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    match entry.entry_type {
        EntryType::File => export_file(repo.store(), dest, &entry.hid).map(|_| ()),
        EntryType::Symlink => export_symlink(repo.store(), dest, &entry.hid),
        EntryType::Directory => Err(Error::InvalidObjectType(format!(
            "{} is a directory",
            path
        ))),
    }
}

fn export_file<S: ObjectStore + ?Sized>(store: &S, dest: &Path, hash: &Hash) -> Result<u64> {
    let content = store.get(hash)?;
    write_file(dest, &content)?;
    Ok(content.len() as u64)
}

fn export_symlink<S: ObjectStore + ?Sized>(store: &S, dest: &Path, hash: &Hash) -> Result<()> {
    let target = store.get(hash)?;
    create_symlink(dest, &target)
}

fn clear_directory(path: &Path) -> Result<()> {
    match file_type(path)? {
        Some(FileType::Directory) => fs::remove_dir_all(path).with_path(path),
        _ => Ok(()),
    }
}

fn clear_non_directory(path: &Path) -> Result<()> {
    match file_type(path)? {
        Some(FileType::Directory) | None => Ok(()),
        Some(_) => fs::remove_file(path).with_path(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_commit, BuildOptions};
    use crate::leaves::single_leaf;
    use crate::types::Change;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    fn commit_changes(repo: &Repo, diff: &[Change]) -> Hash {
        let parent = single_leaf(repo).unwrap();
        build_commit(repo.store(), &parent, diff, &BuildOptions::new("t", "m")).unwrap()
    }

    #[test]
    fn test_export_tree() {
        let (dir, repo) = test_repo();
        let store = repo.store();
        let diff = vec![
            Change::put_file("top.txt", store.put(b"top").unwrap()),
            Change::put_file("a/b/deep.txt", store.put(b"deep").unwrap()),
            Change::put_symlink("a/link", store.put(b"b/deep.txt").unwrap()),
            Change::mkdir("empty"),
        ];
        let cs = commit_changes(&repo, &diff);

        let out = dir.path().join("out");
        let stats = export(&repo, &cs, &out, &ExportOptions::default()).unwrap();

        assert_eq!(fs::read(out.join("top.txt")).unwrap(), b"top");
        assert_eq!(fs::read(out.join("a/b/deep.txt")).unwrap(), b"deep");
        assert_eq!(
            fs::read_link(out.join("a/link")).unwrap(),
            Path::new("b/deep.txt")
        );
        assert_eq!(fs::read_to_string(out.join("a/link")).unwrap(), "deep");
        assert!(out.join("empty").is_dir());

        assert_eq!(stats.files, 2);
        assert_eq!(stats.symlinks, 1);
        assert_eq!(stats.directories, 3);
        assert_eq!(stats.bytes, 7);
    }

    #[test]
    fn test_export_refuses_non_empty_target() {
        let (dir, repo) = test_repo();
        let cs = commit_changes(
            &repo,
            &[Change::put_file("f", repo.store().put(b"new").unwrap())],
        );

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("f"), "old").unwrap();

        assert!(matches!(
            export(&repo, &cs, &out, &ExportOptions::default()),
            Err(Error::TargetNotEmpty(_))
        ));
        assert_eq!(fs::read_to_string(out.join("f")).unwrap(), "old");

        export(&repo, &cs, &out, &ExportOptions { force: true }).unwrap();
        assert_eq!(fs::read_to_string(out.join("f")).unwrap(), "new");
    }

    #[test]
    fn test_export_force_replaces_file_with_directory() {
        let (dir, repo) = test_repo();
        let cs = commit_changes(
            &repo,
            &[Change::put_file("d/inner", repo.store().put(b"x").unwrap())],
        );

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("d"), "in the way").unwrap();
        symlink("nowhere", out.join("stale")).unwrap();

        export(&repo, &cs, &out, &ExportOptions { force: true }).unwrap();
        assert_eq!(fs::read(out.join("d/inner")).unwrap(), b"x");
    }

    #[test]
    fn test_export_force_replaces_directory_with_file_and_symlink() {
        let (dir, repo) = test_repo();
        let store = repo.store();
        let cs = commit_changes(
            &repo,
            &[
                Change::put_file("f", store.put(b"file").unwrap()),
                Change::put_symlink("l", store.put(b"f").unwrap()),
            ],
        );

        let out = dir.path().join("out");
        fs::create_dir_all(out.join("f/stale")).unwrap();
        fs::create_dir_all(out.join("l")).unwrap();
        fs::write(out.join("l/junk"), "x").unwrap();

        assert!(matches!(
            export(&repo, &cs, &out, &ExportOptions::default()),
            Err(Error::TargetNotEmpty(_))
        ));

        export(&repo, &cs, &out, &ExportOptions { force: true }).unwrap();
        assert_eq!(fs::read(out.join("f")).unwrap(), b"file");
        assert_eq!(fs::read_link(out.join("l")).unwrap(), Path::new("f"));
    }

    #[test]
    fn test_export_non_utf8_symlink_target() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, repo) = test_repo();
        let target: &[u8] = b"caf\xe9";
        let cs = commit_changes(
            &repo,
            &[Change::put_symlink("l", repo.store().put(target).unwrap())],
        );

        let out = dir.path().join("out");
        export(&repo, &cs, &out, &ExportOptions::default()).unwrap();
        assert_eq!(
            fs::read_link(out.join("l")).unwrap().as_os_str(),
            OsStr::from_bytes(target)
        );
    }

    #[test]
    fn test_export_missing_object() {
        let (dir, repo) = test_repo();
        let hid = repo.store().put(b"will vanish").unwrap();
        let cs = commit_changes(&repo, &[Change::put_file("f", hid)]);

        fs::remove_file(repo.store().object_path(&hid)).unwrap();

        let result = export(&repo, &cs, &dir.path().join("out"), &ExportOptions::default());
        assert!(matches!(result, Err(Error::ObjectNotFound(h)) if h == hid));
    }

    #[test]
    fn test_export_initial_changeset_is_empty() {
        let (dir, repo) = test_repo();
        let initial = single_leaf(&repo).unwrap();

        let out = dir.path().join("out");
        let stats = export(&repo, &initial, &out, &ExportOptions::default()).unwrap();

        assert_eq!(stats, ExportStats::default());
        assert!(out.is_dir());
    }

    #[test]
    fn test_export_path_file_and_symlink() {
        let (dir, repo) = test_repo();
        let store = repo.store();
        let cs = commit_changes(
            &repo,
            &[
                Change::put_file("dir/file.txt", store.put(b"content").unwrap()),
                Change::put_symlink("dir/link", store.put(b"file.txt").unwrap()),
            ],
        );

        let dest = dir.path().join("nested/out.txt");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, "existing").unwrap();
        export_path(&repo, &cs, "/dir/file.txt", &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "content");

        let link = dir.path().join("link");
        export_path(&repo, &cs, "dir/link", &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("file.txt"));

        assert!(matches!(
            export_path(&repo, &cs, "dir", &dir.path().join("x")),
            Err(Error::InvalidObjectType(_))
        ));
        assert!(matches!(
            export_path(&repo, &cs, "dir/nope", &dir.path().join("y")),
            Err(Error::PathNotFound(_))
        ));
    }
}
