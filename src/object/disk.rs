use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{fsync_dir, walk_error};
use crate::hash::Hash;
use crate::object::ObjectStore;

/// object store backed by a directory of zstd-compressed files
///
/// layout is `<root>/<first 2 hex>/<remaining 62 hex>`. the hash covers the
/// uncompressed bytes, so the compression level never changes identities.
#[derive(Clone, Debug)]
pub struct DiskStore {
    root: PathBuf,
    tmp: PathBuf,
    level: i32,
}

impl DiskStore {
    /// open a store rooted at `root`, staging writes through `tmp`
    ///
    /// `tmp` must live on the same filesystem as `root` so renames stay atomic.
    pub fn new(root: impl Into<PathBuf>, tmp: impl Into<PathBuf>, level: i32) -> Self {
        Self {
            root: root.into(),
            tmp: tmp.into(),
            level,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// get the filesystem path of an object
    pub fn object_path(&self, hash: &Hash) -> PathBuf {
        let (dir, file) = hash.to_path_components();
        self.root.join(dir).join(file)
    }
}

impl ObjectStore for DiskStore {
    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = Hash::of(bytes);

        let (dir, file) = hash.to_path_components();
        let object_dir = self.root.join(&dir);
        let object_path = object_dir.join(&file);

        // deduplication: if the object already exists, we're done
        if object_path.exists() {
            return Ok(hash);
        }

        let compressed = zstd::encode_all(bytes, self.level).map_err(|e| Error::Io {
            path: PathBuf::from("<zstd>"),
            source: e,
        })?;

        fs::create_dir_all(&object_dir).with_path(&object_dir)?;

        // atomic write: temp -> fsync -> rename
        let tmp_path = self.tmp.join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(&compressed).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }

        // a racing writer may have landed the same object; rename replaces it
        // with identical content
        fs::rename(&tmp_path, &object_path).with_path(&object_path)?;
        fsync_dir(&object_dir)?;

        tracing::trace!(hid = %hash, size = bytes.len(), "stored object");
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>> {
        let path = self.object_path(hash);

        let compressed = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ObjectNotFound(*hash)
            } else {
                Error::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let bytes = zstd::decode_all(&compressed[..]).map_err(|e| {
            Error::CorruptObjectMessage(format!("{}: cannot decompress: {}", hash, e))
        })?;

        // verify hash
        if Hash::of(&bytes) != *hash {
            return Err(Error::CorruptObject(*hash));
        }

        Ok(bytes)
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.object_path(hash).exists()
    }

    fn list(&self) -> Result<Vec<Hash>> {
        let mut hashes = Vec::new();

        if !self.root.exists() {
            return Ok(hashes);
        }

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| walk_error(&self.root, e))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let parent_name = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("");

            let hex = format!("{}{}", parent_name, file_name);
            if let Ok(hash) = Hash::from_hex(&hex) {
                hashes.push(hash);
            }
        }

        Ok(hashes)
    }
}
