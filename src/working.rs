//! working directory scanning and staging
//!
//! a [`WorkingCopy`] binds a live directory to a repository. `scan` compares
//! the directory with the tree of the current single leaf; staging records
//! which paths the next commit should pick up. staging lives in memory for
//! as long as the `WorkingCopy` does.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::builder::resolve_root;
use crate::error::{Error, IoResultExt, Result};
use crate::fs::{file_type, hash_content, walk_error, FileType};
use crate::hash::Hash;
use crate::leaves::single_leaf;
use crate::ops::manifest;
use crate::repo::Repo;
use crate::types::{ChangeKind, DiffEntry, EntryType, Gid, TreenodeEntry};

/// what the next commit does with a staged path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Staged {
    /// record whatever is on disk at commit time, optionally under a fixed stable id
    Add { gid: Option<Gid> },
    /// drop the path (and everything beneath it)
    Remove,
}

/// a versionable entry found on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DiskEntry {
    entry_type: EntryType,
    /// content hash for files and symlinks
    hash: Option<Hash>,
}

/// a directory tracked by a repository
pub struct WorkingCopy<'r> {
    repo: &'r Repo,
    root: PathBuf,
    /// repository directory relative to `root`, when nested inside it
    repo_rel: Option<String>,
    ignore: Vec<glob::Pattern>,
    staged: BTreeMap<String, Staged>,
}

impl<'r> WorkingCopy<'r> {
    pub fn new(repo: &'r Repo, dir: &Path) -> Result<Self> {
        let root = fs::canonicalize(dir).with_path(dir)?;
        let repo_abs = fs::canonicalize(repo.path()).with_path(repo.path())?;
        let repo_rel = repo_abs
            .strip_prefix(&root)
            .ok()
            .and_then(|p| p.to_str())
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self {
            repo,
            root,
            repo_rel,
            ignore: repo.config().ignore_patterns()?,
            staged: BTreeMap::new(),
        })
    }

    pub fn repo(&self) -> &'r Repo {
        self.repo
    }

    /// working directory root (canonical)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// staged paths in path order
    pub fn staged(&self) -> &BTreeMap<String, Staged> {
        &self.staged
    }

    /// forget everything staged
    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    /// the changeset this working copy is compared against, and its root treenode
    pub fn baseline(&self) -> Result<(Hash, Hash)> {
        let leaf = single_leaf(self.repo)?;
        let root = resolve_root(self.repo.store(), &leaf)?;
        Ok((leaf, root))
    }

    /// is a working-copy relative path excluded from versioning
    pub fn is_ignored(&self, rel: &str) -> bool {
        if let Some(repo_rel) = &self.repo_rel {
            if is_at_or_beneath(rel, repo_rel) {
                return true;
            }
        }
        // a match on any leading part of the path ignores the whole subtree
        prefixes(rel).any(|prefix| self.ignore.iter().any(|p| p.matches(prefix)))
    }

    /// added, modified and deleted paths relative to the baseline
    pub fn scan(&self) -> Result<Vec<DiffEntry>> {
        Ok(self.scan_entries()?.0)
    }

    /// same as `scan`
    pub fn status(&self) -> Result<Vec<DiffEntry>> {
        self.scan()
    }

    /// stage a file, symlink or directory (recursively) for the next commit
    pub fn stage_add(&mut self, path: &Path) -> Result<()> {
        let rel = self.relative(path)?;
        self.stage_tree(&rel, &HashMap::new())
    }

    /// stage removal of a tracked path, deleting it from disk if still present
    pub fn stage_remove(&mut self, path: &Path) -> Result<()> {
        let rel = self.relative(path)?;
        if rel.is_empty() {
            return Err(Error::InvalidEntryName(
                "cannot remove the working copy root".to_string(),
            ));
        }

        let tracked = self.baseline_entry(&rel)?.is_some();
        let staged = self.staged.keys().any(|p| is_at_or_beneath(p, &rel));
        if !tracked && !staged {
            return Err(Error::PathNotFound(rel));
        }

        let abs = self.root.join(&rel);
        match file_type(&abs)? {
            Some(FileType::Directory) => fs::remove_dir_all(&abs).with_path(&abs)?,
            Some(_) => fs::remove_file(&abs).with_path(&abs)?,
            None => {}
        }

        self.unstage_beneath(&rel);
        if tracked {
            self.insert_staged(rel, Staged::Remove)?;
        }
        Ok(())
    }

    /// rename a path on disk and stage the move
    ///
    /// every tracked entry under `from` keeps its stable id at its new
    /// location, so history can follow the objects across the rename.
    pub fn stage_move(&mut self, from: &Path, to: &Path) -> Result<()> {
        let from_rel = self.relative(from)?;
        let to_rel = self.relative(to)?;
        if from_rel.is_empty() || to_rel.is_empty() {
            return Err(Error::InvalidEntryName(
                "cannot move the working copy root".to_string(),
            ));
        }
        if is_at_or_beneath(&to_rel, &from_rel) {
            return Err(Error::ConflictingChange(to_rel));
        }

        let from_abs = self.root.join(&from_rel);
        let to_abs = self.root.join(&to_rel);
        if file_type(&from_abs)?.is_none() {
            return Err(Error::PathNotFound(from_rel));
        }
        if file_type(&to_abs)?.is_some() {
            return Err(Error::TargetNotEmpty(to_abs));
        }

        // stable ids to carry, keyed by destination path
        let mut carry: HashMap<String, Gid> = HashMap::new();
        let (_, baseline_root) = self.baseline()?;
        for listed in manifest(self.repo.store(), &baseline_root)? {
            if let Some(moved) = rebase(&listed.path, &from_rel, &to_rel) {
                carry.insert(moved, listed.entry.gid);
            }
        }
        for (path, staged) in &self.staged {
            if let Staged::Add { gid: Some(gid) } = staged {
                if let Some(moved) = rebase(path, &from_rel, &to_rel) {
                    carry.insert(moved, *gid);
                }
            }
        }

        if let Some(parent) = to_abs.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        fs::rename(&from_abs, &to_abs).with_path(&from_abs)?;

        let tracked = self.baseline_entry(&from_rel)?.is_some();
        self.unstage_beneath(&from_rel);
        if tracked {
            self.insert_staged(from_rel.clone(), Staged::Remove)?;
        }
        self.stage_tree(&to_rel, &carry)?;

        tracing::debug!(from = %from_rel, to = %to_rel, carried = carry.len(), "staged move");
        Ok(())
    }

    /// stage every addition, modification and deletion the scan reports
    pub fn scan_and_addremove(&mut self) -> Result<Vec<DiffEntry>> {
        let (diff, disk) = self.scan_entries()?;

        // paths whose whole subtree is already decided by a staged change
        let mut covered: BTreeSet<String> = BTreeSet::new();

        for entry in &diff {
            if ancestors(&entry.path).any(|a| covered.contains(a)) {
                continue;
            }
            match entry.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    let is_dir = disk
                        .get(&entry.path)
                        .map(|d| d.entry_type == EntryType::Directory)
                        .unwrap_or(false);
                    self.insert_staged(entry.path.clone(), Staged::Add { gid: None })?;
                    if !is_dir {
                        covered.insert(entry.path.clone());
                    }
                }
                ChangeKind::Deleted => {
                    self.insert_staged(entry.path.clone(), Staged::Remove)?;
                    covered.insert(entry.path.clone());
                }
            }
        }

        tracing::info!(changes = diff.len(), staged = self.staged.len(), "addremove");
        Ok(diff)
    }

    /// scan the directory and compare with the baseline manifest
    fn scan_entries(&self) -> Result<(Vec<DiffEntry>, BTreeMap<String, DiskEntry>)> {
        let (_, baseline_root) = self.baseline()?;
        let baseline: BTreeMap<String, TreenodeEntry> = manifest(self.repo.store(), &baseline_root)?
            .into_iter()
            .filter(|listed| !self.is_ignored(&listed.path))
            .map(|listed| (listed.path, listed.entry))
            .collect();
        let disk = self.scan_disk()?;

        let paths: BTreeSet<&String> = baseline.keys().chain(disk.keys()).collect();
        let mut diff = Vec::new();

        for path in paths {
            let kind = match (baseline.get(path), disk.get(path)) {
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Deleted,
                (Some(old), Some(new)) => {
                    if old.entry_type != new.entry_type {
                        ChangeKind::Modified
                    } else if new.hash.is_some_and(|h| h != old.hid) {
                        ChangeKind::Modified
                    } else {
                        continue;
                    }
                }
                (None, None) => continue,
            };
            diff.push(DiffEntry::new(path.as_str(), kind));
        }

        tracing::debug!(
            tracked = baseline.len(),
            on_disk = disk.len(),
            changed = diff.len(),
            "scanned working copy"
        );
        Ok((diff, disk))
    }

    /// every versionable, non-ignored path under the root
    fn scan_disk(&self) -> Result<BTreeMap<String, DiskEntry>> {
        self.walk(&self.root)
    }

    fn walk(&self, start: &Path) -> Result<BTreeMap<String, DiskEntry>> {
        let mut found = BTreeMap::new();

        let walker = WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| match self.rel_of(e.path()) {
                Some(rel) => rel.is_empty() || !self.is_ignored(&rel),
                None => true,
            });

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(start, e))?;
            let path = entry.path();
            let rel = self.rel_of(path).ok_or_else(|| {
                Error::InvalidEntryName(path.to_string_lossy().into_owned())
            })?;
            if rel.is_empty() {
                continue;
            }

            let ft = match file_type(path)? {
                Some(ft) => ft,
                None => continue,
            };
            let entry_type = match ft.entry_type() {
                Some(t) => t,
                None => {
                    tracing::warn!(path = %path.display(), "skipping unsupported file type");
                    continue;
                }
            };
            let hash = match entry_type {
                EntryType::Directory => None,
                _ => Some(hash_content(path, ft)?),
            };

            found.insert(rel, DiskEntry { entry_type, hash });
        }

        Ok(found)
    }

    /// stage `rel` and, for directories, everything beneath it
    fn stage_tree(&mut self, rel: &str, carry: &HashMap<String, Gid>) -> Result<()> {
        let abs = self.root.join(rel);
        let found = match file_type(&abs)? {
            None => return Err(Error::PathNotFound(rel.to_string())),
            Some(FileType::Other) => return Err(Error::UnsupportedFileType(abs)),
            Some(FileType::Directory) => self.walk(&abs)?,
            Some(ft) => {
                let entry_type = ft
                    .entry_type()
                    .ok_or_else(|| Error::UnsupportedFileType(abs.clone()))?;
                let entry = DiskEntry {
                    entry_type,
                    hash: None,
                };
                BTreeMap::from([(rel.to_string(), entry)])
            }
        };

        for path in found.keys() {
            let gid = carry.get(path).copied();
            self.insert_staged(path.clone(), Staged::Add { gid })?;
        }
        Ok(())
    }

    fn insert_staged(&mut self, rel: String, staged: Staged) -> Result<()> {
        if rel.is_empty() || self.is_ignored(&rel) {
            return Ok(());
        }
        if ancestors(&rel).any(|a| self.staged.get(a) == Some(&Staged::Remove)) {
            return Err(Error::ConflictingChange(rel));
        }
        if staged == Staged::Remove {
            self.unstage_beneath(&rel);
        }
        self.staged.insert(rel, staged);
        Ok(())
    }

    fn unstage_beneath(&mut self, rel: &str) {
        self.staged.retain(|p, _| !is_at_or_beneath(p, rel));
    }

    fn baseline_entry(&self, rel: &str) -> Result<Option<TreenodeEntry>> {
        let (_, root) = self.baseline()?;
        crate::builder::lookup_path(self.repo.store(), &root, rel)
    }

    /// working-copy relative, `/`-separated form of a caller-supplied path
    fn relative(&self, path: &Path) -> Result<String> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| Error::OutsideWorkingCopy(path.to_path_buf()))?
        } else {
            path
        };

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| Error::InvalidEntryName(name.to_string_lossy().into_owned()))?;
                    parts.push(name);
                }
                Component::CurDir => {}
                _ => return Err(Error::OutsideWorkingCopy(path.to_path_buf())),
            }
        }
        Ok(parts.join("/"))
    }

    fn rel_of(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

/// `a`, `a/b`, `a/b/c` for `a/b/c`
fn prefixes(rel: &str) -> impl Iterator<Item = &str> {
    rel.match_indices('/')
        .map(move |(idx, _)| &rel[..idx])
        .chain(std::iter::once(rel))
}

/// proper ancestors of a path, nearest first
fn ancestors(rel: &str) -> impl Iterator<Item = &str> {
    rel.rmatch_indices('/').map(move |(idx, _)| &rel[..idx])
}

fn is_at_or_beneath(path: &str, base: &str) -> bool {
    path == base || (path.starts_with(base) && path.as_bytes().get(base.len()) == Some(&b'/'))
}

/// `path` relocated from under `from` to under `to`
fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if is_at_or_beneath(path, from) {
        Some(format!("{}{}", to, &path[from.len()..]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{commit, CommitOptions};
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Repo, PathBuf) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();
        (dir, repo, work)
    }

    fn kinds(diff: &[DiffEntry]) -> Vec<String> {
        diff.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_scan_new_files() {
        let (_dir, repo, work) = setup();
        fs::create_dir(work.join("sub")).unwrap();
        fs::write(work.join("a"), "a").unwrap();
        fs::write(work.join("sub/b"), "b").unwrap();

        let wc = WorkingCopy::new(&repo, &work).unwrap();
        assert_eq!(kinds(&wc.scan().unwrap()), vec!["A a", "A sub", "A sub/b"]);
    }

    #[test]
    fn test_scan_after_commit() {
        let (_dir, repo, work) = setup();
        fs::write(work.join("keep"), "same").unwrap();
        fs::write(work.join("edit"), "v1").unwrap();
        fs::write(work.join("gone"), "bye").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.scan_and_addremove().unwrap();
        commit(&mut wc, &CommitOptions::new("first")).unwrap();
        assert!(wc.scan().unwrap().is_empty());

        fs::write(work.join("edit"), "v2").unwrap();
        fs::remove_file(work.join("gone")).unwrap();
        fs::write(work.join("new"), "hi").unwrap();

        assert_eq!(
            kinds(&wc.status().unwrap()),
            vec!["M edit", "D gone", "A new"]
        );
    }

    #[test]
    fn test_ignore_patterns_and_repo_dir() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();

        let mut config = crate::Config::new("nested");
        config.ignore.push("*.o".to_string());
        config.ignore.push("build".to_string());
        let repo = Repo::init_with_config(&work.join(".sprig"), config).unwrap();

        fs::write(work.join("main.c"), "int main;").unwrap();
        fs::write(work.join("main.o"), "obj").unwrap();
        fs::create_dir(work.join("build")).unwrap();
        fs::write(work.join("build/out"), "out").unwrap();

        let wc = WorkingCopy::new(&repo, &work).unwrap();
        assert_eq!(kinds(&wc.scan().unwrap()), vec!["A main.c"]);
        assert!(wc.is_ignored(".sprig/objects"));
        assert!(wc.is_ignored("build/out"));
    }

    #[test]
    fn test_nested_repo_dir_excluded() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();
        let repo = Repo::init(&work.join("store")).unwrap();
        fs::write(work.join("f"), "f").unwrap();

        // not matched by the default pattern, still excluded as the repo itself
        let wc = WorkingCopy::new(&repo, &work).unwrap();
        assert_eq!(kinds(&wc.scan().unwrap()), vec!["A f"]);
    }

    #[test]
    fn test_symlink_scanned_by_target() {
        let (_dir, repo, work) = setup();
        symlink("does/not/exist", work.join("link")).unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.scan_and_addremove().unwrap();
        commit(&mut wc, &CommitOptions::new("link")).unwrap();
        assert!(wc.scan().unwrap().is_empty());

        fs::remove_file(work.join("link")).unwrap();
        symlink("elsewhere", work.join("link")).unwrap();
        assert_eq!(kinds(&wc.scan().unwrap()), vec!["M link"]);
    }

    #[test]
    fn test_stage_add_directory_recursive() {
        let (_dir, repo, work) = setup();
        fs::create_dir_all(work.join("d/e")).unwrap();
        fs::write(work.join("d/e/f"), "f").unwrap();
        fs::write(work.join("other"), "o").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.stage_add(Path::new("d")).unwrap();

        let staged: Vec<_> = wc.staged().keys().cloned().collect();
        assert_eq!(staged, vec!["d", "d/e", "d/e/f"]);
    }

    #[test]
    fn test_stage_add_absolute_and_outside() {
        let (dir, repo, work) = setup();
        fs::write(work.join("f"), "f").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.stage_add(&wc.root().join("f")).unwrap();
        assert!(wc.staged().contains_key("f"));

        assert!(matches!(
            wc.stage_add(&dir.path().join("elsewhere")),
            Err(Error::OutsideWorkingCopy(_))
        ));
        assert!(matches!(
            wc.stage_add(Path::new("../escape")),
            Err(Error::OutsideWorkingCopy(_))
        ));
        assert!(matches!(
            wc.stage_add(Path::new("missing")),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn test_stage_remove() {
        let (_dir, repo, work) = setup();
        fs::create_dir(work.join("d")).unwrap();
        fs::write(work.join("d/a"), "a").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.scan_and_addremove().unwrap();
        commit(&mut wc, &CommitOptions::new("one")).unwrap();

        wc.stage_remove(Path::new("d")).unwrap();
        assert!(!work.join("d").exists());
        assert_eq!(wc.staged().get("d"), Some(&Staged::Remove));

        assert!(matches!(
            wc.stage_remove(Path::new("never")),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn test_addremove_collapses_deleted_subtree() {
        let (_dir, repo, work) = setup();
        fs::create_dir_all(work.join("d/e")).unwrap();
        fs::write(work.join("d/e/f"), "f").unwrap();
        fs::write(work.join("d/g"), "g").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.scan_and_addremove().unwrap();
        commit(&mut wc, &CommitOptions::new("one")).unwrap();

        fs::remove_dir_all(work.join("d")).unwrap();
        let diff = wc.scan_and_addremove().unwrap();

        assert_eq!(diff.len(), 4);
        let staged: Vec<_> = wc.staged().iter().collect();
        assert_eq!(staged, vec![(&"d".to_string(), &Staged::Remove)]);
    }

    #[test]
    fn test_addremove_directory_replaced_by_file() {
        let (_dir, repo, work) = setup();
        fs::create_dir(work.join("x")).unwrap();
        fs::write(work.join("x/inner"), "i").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.scan_and_addremove().unwrap();
        commit(&mut wc, &CommitOptions::new("one")).unwrap();

        fs::remove_dir_all(work.join("x")).unwrap();
        fs::write(work.join("x"), "now a file").unwrap();

        assert_eq!(kinds(&wc.scan().unwrap()), vec!["M x", "D x/inner"]);
        wc.scan_and_addremove().unwrap();
        assert_eq!(wc.staged().len(), 1);

        commit(&mut wc, &CommitOptions::new("two")).unwrap();
        assert!(wc.scan().unwrap().is_empty());
    }

    #[test]
    fn test_stage_move_carries_stable_ids() {
        let (_dir, repo, work) = setup();
        fs::create_dir(work.join("src")).unwrap();
        fs::write(work.join("src/lib"), "code").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        wc.scan_and_addremove().unwrap();
        commit(&mut wc, &CommitOptions::new("one")).unwrap();

        let (_, root) = wc.baseline().unwrap();
        let before = manifest(repo.store(), &root).unwrap();

        wc.stage_move(Path::new("src"), Path::new("pkg/source")).unwrap();
        assert!(work.join("pkg/source/lib").is_file());
        assert!(!work.join("src").exists());

        commit(&mut wc, &CommitOptions::new("move")).unwrap();

        let (_, root) = wc.baseline().unwrap();
        let after: BTreeMap<_, _> = manifest(repo.store(), &root)
            .unwrap()
            .into_iter()
            .map(|l| (l.path, l.entry))
            .collect();

        for listed in before {
            let moved = rebase(&listed.path, "src", "pkg/source").unwrap();
            assert_eq!(after[&moved].gid, listed.entry.gid, "gid lost for {}", moved);
        }
        assert!(!after.contains_key("src"));
    }

    #[test]
    fn test_stage_move_refuses_existing_target() {
        let (_dir, repo, work) = setup();
        fs::write(work.join("a"), "a").unwrap();
        fs::write(work.join("b"), "b").unwrap();

        let mut wc = WorkingCopy::new(&repo, &work).unwrap();
        assert!(matches!(
            wc.stage_move(Path::new("a"), Path::new("b")),
            Err(Error::TargetNotEmpty(_))
        ));
        assert!(matches!(
            wc.stage_move(Path::new("a"), Path::new("a/inside")),
            Err(Error::ConflictingChange(_))
        ));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(prefixes("a/b/c").collect::<Vec<_>>(), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(ancestors("a/b/c").collect::<Vec<_>>(), vec!["a/b", "a"]);
        assert!(is_at_or_beneath("a/b", "a"));
        assert!(!is_at_or_beneath("ab", "a"));
        assert_eq!(rebase("x/y", "x", "z").as_deref(), Some("z/y"));
        assert_eq!(rebase("xy", "x", "z"), None);
    }
}
