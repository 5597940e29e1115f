use std::fmt;

use crate::hash::Hash;
use crate::types::{EntryType, Gid};

/// one edit handed to the changeset builder
///
/// paths are `/`-separated and relative to the tree root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// place an entry at `path`, replacing whatever is there.
    /// a directory entry grafts an already-stored treenode.
    Put {
        path: String,
        entry_type: EntryType,
        hid: Hash,
        gid: Option<Gid>,
    },
    /// ensure a directory exists at `path`
    Mkdir { path: String, gid: Option<Gid> },
    /// drop the entry at `path` (whole subtree for directories)
    Remove { path: String },
}

impl Change {
    pub fn put_file(path: impl Into<String>, hid: Hash) -> Self {
        Change::Put {
            path: path.into(),
            entry_type: EntryType::File,
            hid,
            gid: None,
        }
    }

    pub fn put_symlink(path: impl Into<String>, hid: Hash) -> Self {
        Change::Put {
            path: path.into(),
            entry_type: EntryType::Symlink,
            hid,
            gid: None,
        }
    }

    pub fn mkdir(path: impl Into<String>) -> Self {
        Change::Mkdir {
            path: path.into(),
            gid: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Change::Remove { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Change::Put { path, .. } | Change::Mkdir { path, .. } | Change::Remove { path } => path,
        }
    }

    /// carry an explicit stable id
    pub fn with_gid(mut self, new_gid: Gid) -> Self {
        match &mut self {
            Change::Put { gid, .. } | Change::Mkdir { gid, .. } => *gid = Some(new_gid),
            Change::Remove { .. } => {}
        }
        self
    }
}

/// diff entry change kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "A"),
            ChangeKind::Modified => write!(f, "M"),
            ChangeKind::Deleted => write!(f, "D"),
        }
    }
}

/// entry in a diff or status result
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    pub path: String,
    pub kind: ChangeKind,
}

impl DiffEntry {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}
