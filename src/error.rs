use std::path::PathBuf;

use crate::Hash;

/// error type for sprig operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    NoRepo(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("unknown or ambiguous revision: {0}")]
    UnknownRevision(String),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("corrupt object: {0}")]
    CorruptObjectMessage(String),

    #[error("stable id {gid} claimed by both {first} and {second}")]
    ConflictingStableId {
        gid: String,
        first: String,
        second: String,
    },

    #[error("conflicting changes for path: {0}")]
    ConflictingChange(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("nothing to commit")]
    EmptyCommit,

    #[error("expected exactly one leaf, found {0}")]
    LeafCount(usize),

    #[error("leaf {0} was advanced by another writer")]
    LeafRaceLost(String),

    #[error("export target not empty: {0}")]
    TargetNotEmpty(PathBuf),

    #[error("path is outside the working copy: {0}")]
    OutsideWorkingCopy(PathBuf),

    #[error("lock contention on repository")]
    LockContention,

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("unsupported file type at {0}")]
    UnsupportedFileType(PathBuf),

    #[error("invalid ignore pattern: {0}")]
    InvalidIgnorePattern(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("invalid object type: {0}")]
    InvalidObjectType(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// true for the "referenced thing does not exist" family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ObjectNotFound(_) | Error::PathNotFound(_) | Error::UnknownRevision(_)
        )
    }

    /// true when the object store returned bytes that cannot be trusted
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::CorruptObject(_) | Error::CorruptObjectMessage(_))
    }
}

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
