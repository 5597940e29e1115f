use std::fs::File;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{write_changeset, write_treenode, DiskStore};
use crate::types::{Changeset, Treenode};

/// a sprig repository: object store, leaf set and configuration
pub struct Repo {
    path: PathBuf,
    config: Config,
    store: DiskStore,
}

impl Repo {
    /// initialize a new repository at the given path
    ///
    /// the repository starts with one changeset (an empty root) as its only leaf.
    pub fn init(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::init_with_config(path, Config::new(name))
    }

    /// initialize a new repository with an explicit configuration
    pub fn init_with_config(path: &Path, config: Config) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        std::fs::create_dir_all(path.join("objects")).with_path(path)?;
        std::fs::create_dir_all(path.join("tmp")).with_path(path)?;

        // reject bad patterns before anything is persisted
        config.ignore_patterns()?;
        config.save(&config_path)?;

        let repo = Self::from_parts(path, config);

        let root = write_treenode(repo.store(), &Treenode::empty())?;
        let initial = Changeset::new(root, vec![], repo.config.author.clone(), "initial");
        let hash = write_changeset(repo.store(), &initial)?;
        crate::leaves::advance(&repo, None, &hash)?;

        tracing::info!(path = %path.display(), initial = %hash, "initialized repository");
        Ok(repo)
    }

    /// open an existing repository
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;
        Ok(Self::from_parts(path, config))
    }

    fn from_parts(path: &Path, config: Config) -> Self {
        let store = DiskStore::new(
            path.join("objects"),
            path.join("tmp"),
            config.compression_level,
        );
        Self {
            path: path.to_path_buf(),
            config,
            store,
        }
    }

    /// repository root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// the content store
    pub fn store(&self) -> &DiskStore {
        &self.store
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.path.join("config.toml")
    }

    /// path to the leaf set file
    pub fn leaves_path(&self) -> PathBuf {
        self.path.join("leaves")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// path to lock file
    pub fn lock_path(&self) -> PathBuf {
        self.path.join(".lock")
    }

    /// hash of the changeset recorded at init time, found by walking any leaf's ancestry
    pub fn initial_changeset(&self) -> Result<Hash> {
        let leaves = crate::leaves::get_leaves(self)?;
        let mut current = leaves
            .into_iter()
            .next()
            .ok_or(Error::LeafCount(0))?;
        loop {
            let changeset = crate::object::read_changeset(self.store(), &current)?;
            match changeset.parents.first() {
                Some(parent) => current = *parent,
                None => return Ok(current),
            }
        }
    }

    /// acquire exclusive lock on repository, waiting for other holders
    /// returns a guard that releases the lock on drop
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| Error::Io {
            path: lock_path.clone(),
            source: std::io::Error::from(errno),
        })?;

        Ok(RepoLock { _flock: flock })
    }

    /// try to acquire exclusive lock, returning None if already locked
    pub fn try_lock(&self) -> Result<Option<RepoLock>> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(RepoLock { _flock: flock })),
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err(_) => Err(Error::LockContention),
        }
    }
}

/// guard that holds repository lock until dropped
pub struct RepoLock {
    _flock: Flock<File>,
}
