//! sprig - content-addressed version-control storage
//!
//! a tree-structured store for versioned directory trees. every version is a
//! changeset pointing at a root treenode; unchanged subtrees are shared
//! between versions by hash.
//!
//! # Core concepts
//!
//! - **Blob**: raw file content or symlink target, addressed by hash (zstd on disk)
//! - **Treenode**: one directory level, a sorted list of named entries (CBOR)
//! - **Changeset**: a root treenode plus parents, author, time and message (CBOR)
//! - **Leaf**: a changeset with no children; the set of leaves is the frontier
//!   of history
//! - **Gid**: a stable identity that follows an entry across moves and edits
//!
//! # Hash format
//!
//! hid = SHA256(uncompressed object bytes)
//!
//! the same bytes always produce the same hid, so writing an object twice is
//! a no-op.
//!
//! # Example usage
//!
//! ```no_run
//! use sprig::{ops, Repo, WorkingCopy};
//! use std::path::Path;
//!
//! // initialize a repository
//! let repo = Repo::init(Path::new("/path/to/repo")).unwrap();
//!
//! // track a directory and commit everything in it
//! let mut wc = WorkingCopy::new(&repo, Path::new("/source")).unwrap();
//! let hash = ops::commit_all(&mut wc, &ops::CommitOptions::new("initial import")).unwrap();
//!
//! // materialize that version somewhere else
//! ops::export(&repo, &hash, Path::new("/destination"), &ops::ExportOptions::default()).unwrap();
//! ```

mod config;
mod error;
mod hash;
mod repo;

pub mod builder;
pub mod fs;
pub mod leaves;
pub mod object;
pub mod ops;
pub mod types;
pub mod working;

pub use builder::{build_commit, plan_commit, BuildOptions, CommitPlan};
pub use config::Config;
pub use error::{Error, Result};
pub use hash::{Hash, StreamHasher};
pub use leaves::{advance, get_leaves, single_leaf};
pub use object::{DiskStore, MemoryStore, ObjectStore};
pub use repo::{Repo, RepoLock};
pub use types::{
    Change, ChangeKind, Changeset, DiffEntry, EntryType, Gid, Treenode, TreenodeEntry,
};
pub use working::{Staged, WorkingCopy};
