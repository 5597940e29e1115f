use std::collections::HashSet;

use chrono::DateTime;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::leaves::single_leaf;
use crate::object::{decode_changeset, read_changeset, ObjectStore};
use crate::repo::Repo;
use crate::types::Changeset;

/// changeset with its hash for log output
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub hash: Hash,
    pub changeset: Changeset,
}

/// history reachable from `start`, newest first
pub fn log(repo: &Repo, start: &Hash, max_count: Option<usize>) -> Result<Vec<LogEntry>> {
    let mut entries = Vec::new();
    let mut to_visit = vec![*start];
    let mut visited = HashSet::new();

    while let Some(hash) = to_visit.pop() {
        if !visited.insert(hash) {
            continue;
        }

        let changeset = read_changeset(repo.store(), &hash)?;

        // first parent on top of the stack
        for parent in changeset.parents.iter().rev() {
            to_visit.push(*parent);
        }

        entries.push(LogEntry { hash, changeset });
    }

    // stable sort keeps walk order for equal timestamps
    entries.sort_by(|a, b| b.changeset.timestamp.cmp(&a.changeset.timestamp));

    if let Some(max) = max_count {
        entries.truncate(max);
    }

    Ok(entries)
}

/// turn a user-supplied revision into a changeset hash
///
/// `None` means the single leaf. otherwise a full hash or a unique hex
/// prefix of a stored changeset.
pub fn resolve_changeset(repo: &Repo, rev: Option<&str>) -> Result<Hash> {
    let rev = match rev {
        None => return single_leaf(repo),
        Some(rev) => rev.trim().to_ascii_lowercase(),
    };

    if rev.len() == 64 {
        let hash = Hash::from_hex(&rev)?;
        read_changeset(repo.store(), &hash)?;
        return Ok(hash);
    }
    if rev.len() < 4 || !rev.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::UnknownRevision(rev));
    }

    let mut found = None;
    for hash in repo.store().list()? {
        if !hash.to_hex().starts_with(&rev) {
            continue;
        }
        let is_changeset = repo
            .store()
            .get(&hash)
            .ok()
            .and_then(|bytes| decode_changeset(&bytes).ok())
            .is_some();
        if !is_changeset {
            continue;
        }
        if found.replace(hash).is_some() {
            return Err(Error::UnknownRevision(rev));
        }
    }

    found.ok_or(Error::UnknownRevision(rev))
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "changeset {}", self.hash)?;
        if self.changeset.is_merge() {
            let parents: Vec<String> = self.changeset.parents.iter().map(|p| p.short()).collect();
            writeln!(f, "Merge:  {}", parents.join(" "))?;
        }
        writeln!(f, "Author: {}", self.changeset.author)?;
        writeln!(f, "Date:   {}", format_timestamp(self.changeset.timestamp))?;
        for (key, value) in &self.changeset.metadata {
            writeln!(f, "{}: {}", key, value)?;
        }

        writeln!(f)?;
        for line in self.changeset.message.lines() {
            writeln!(f, "    {}", line)?;
        }

        Ok(())
    }
}

/// unix seconds as `YYYY-MM-DD HH:MM:SS` UTC
fn format_timestamp(timestamp: i64) -> String {
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        // outside chrono's range; show the raw value
        None => timestamp.to_string(),
    }
}
