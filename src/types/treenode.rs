use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hash::Hash;

/// stable identity of a versioned object
///
/// survives edits (content hash changes) and moves (name changes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gid(Uuid);

impl Gid {
    /// allocate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Gid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gid({})", &self.0.simple().to_string()[..8])
    }
}

/// one directory's contents at one moment, sorted by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treenode {
    entries: Vec<TreenodeEntry>,
}

impl Treenode {
    /// create a new treenode, validating and sorting entries
    pub fn new(mut entries: Vec<TreenodeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        // sort by name (byte-wise)
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::DuplicateEntryName(window[0].name.clone()));
            }
        }

        let mut seen: HashMap<Gid, &str> = HashMap::with_capacity(entries.len());
        for entry in &entries {
            if let Some(first) = seen.insert(entry.gid, &entry.name) {
                return Err(Error::ConflictingStableId {
                    gid: entry.gid.to_string(),
                    first: first.to_string(),
                    second: entry.name.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// create an empty treenode
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// get entries slice
    pub fn entries(&self) -> &[TreenodeEntry] {
        &self.entries
    }

    /// consume and return entries
    pub fn into_entries(self) -> Vec<TreenodeEntry> {
        self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: &str) -> Option<&TreenodeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is treenode empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// validate an entry name
pub(crate) fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

/// a single child reference inside a treenode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreenodeEntry {
    pub gid: Gid,
    pub name: String,
    pub entry_type: EntryType,
    /// content hash of the blob (file, symlink) or treenode (directory)
    pub hid: Hash,
}

impl TreenodeEntry {
    pub fn new(gid: Gid, name: impl Into<String>, entry_type: EntryType, hid: Hash) -> Self {
        Self {
            gid,
            name: name.into(),
            entry_type,
            hid,
        }
    }

    pub fn file(name: impl Into<String>, hid: Hash) -> Self {
        Self::new(Gid::new(), name, EntryType::File, hid)
    }

    pub fn symlink(name: impl Into<String>, hid: Hash) -> Self {
        Self::new(Gid::new(), name, EntryType::Symlink, hid)
    }

    pub fn directory(name: impl Into<String>, hid: Hash) -> Self {
        Self::new(Gid::new(), name, EntryType::Directory, hid)
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

/// kind of treenode entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Directory,
    File,
    Symlink,
}

impl EntryType {
    /// get the type name for display and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryType::Directory => "directory",
            EntryType::File => "file",
            EntryType::Symlink => "symlink",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
