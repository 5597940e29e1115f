use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// an immutable record of one commit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// root treenode hash
    pub root: Hash,
    /// parent changeset hashes (empty for the initial changeset, 2+ for merges)
    pub parents: Vec<Hash>,
    /// author identity
    pub author: String,
    /// unix timestamp (seconds since epoch)
    pub timestamp: i64,
    /// commit message
    pub message: String,
    /// optional key-value metadata (BTreeMap keeps serialization deterministic)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Changeset {
    /// create a new changeset stamped with the current time
    pub fn new(
        root: Hash,
        parents: Vec<Hash>,
        author: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::with_timestamp(root, parents, author, timestamp, message)
    }

    /// create a new changeset with explicit timestamp
    pub fn with_timestamp(
        root: Hash,
        parents: Vec<Hash>,
        author: impl Into<String>,
        timestamp: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            root,
            parents,
            author: author.into(),
            timestamp,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// add metadata key-value pair
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// is this the initial changeset (no parents)
    pub fn is_initial(&self) -> bool {
        self.parents.is_empty()
    }

    /// is this a merge changeset (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}
