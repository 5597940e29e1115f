use std::fs::{self, File, Metadata};
use std::os::unix::ffi::OsStringExt;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::types::EntryType;

/// file type of a working-copy path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    /// device, fifo, socket: never versioned
    Other,
}

impl FileType {
    /// detect file type from metadata
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        if ft.is_file() {
            FileType::Regular
        } else if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::Other
        }
    }

    /// the treenode entry type this maps to, if versionable
    pub fn entry_type(&self) -> Option<EntryType> {
        match self {
            FileType::Regular => Some(EntryType::File),
            FileType::Directory => Some(EntryType::Directory),
            FileType::Symlink => Some(EntryType::Symlink),
            FileType::Other => None,
        }
    }
}

/// file type of a path, without following symlinks; `None` if absent
pub fn file_type(path: &Path) -> Result<Option<FileType>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(FileType::from_metadata(&meta))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// raw bytes of a symlink target, not required to be utf-8
pub fn read_symlink_target(path: &Path) -> Result<Vec<u8>> {
    let target = fs::read_link(path).with_path(path)?;
    Ok(target.into_os_string().into_vec())
}

/// the bytes that represent a file or symlink in the store
///
/// regular files are their content; symlinks are their target text.
pub fn read_content(path: &Path, file_type: FileType) -> Result<Vec<u8>> {
    match file_type {
        FileType::Regular => fs::read(path).with_path(path),
        FileType::Symlink => read_symlink_target(path),
        _ => Err(Error::UnsupportedFileType(path.to_path_buf())),
    }
}

/// hash what `read_content` would return, streaming regular files
pub fn hash_content(path: &Path, file_type: FileType) -> Result<Hash> {
    match file_type {
        FileType::Regular => {
            let mut file = File::open(path).with_path(path)?;
            Hash::of_reader(&mut file).with_path(path)
        }
        FileType::Symlink => Ok(Hash::of(&read_symlink_target(path)?)),
        _ => Err(Error::UnsupportedFileType(path.to_path_buf())),
    }
}
