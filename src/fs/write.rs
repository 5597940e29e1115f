use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};

/// write a regular file, atomically replacing any existing non-directory entry
///
/// content goes to a sibling temp file which is fsynced and renamed over
/// `path`, so readers see either the old entry or the complete new file.
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    refuse_directory(path)?;

    let tmp_path = sibling_tmp(path)?;
    let written = write_synced(&tmp_path, content)
        .and_then(|()| fs::rename(&tmp_path, path).with_path(path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).with_path(path)?;
    file.write_all(content).with_path(path)?;
    file.sync_all().with_path(path)
}

/// create a symlink, atomically replacing any existing non-directory entry
///
/// `target` is taken as raw bytes and need not be utf-8.
pub fn create_symlink(path: &Path, target: &[u8]) -> Result<()> {
    refuse_directory(path)?;

    let tmp_path = sibling_tmp(path)?;
    symlink(OsStr::from_bytes(target), &tmp_path).with_path(&tmp_path)?;
    fs::rename(&tmp_path, path).with_path(path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

/// create a directory (and parents)
pub fn create_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_path(path)
}

fn refuse_directory(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Err(Error::TargetNotEmpty(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// hidden temp name in the same directory, so the final rename stays on one filesystem
fn sibling_tmp(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::InvalidEntryName(path.to_string_lossy().into_owned()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    Ok(path.with_file_name(tmp_name))
}

/// fsync a directory
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)
}

/// convert a walkdir error into an io error with path context
pub fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(root).to_path_buf();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walkdir error"));
    Error::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_file_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");

        write_file(&path, b"one").unwrap();
        write_file(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn test_write_file_replaces_symlink_not_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        fs::write(&target, "keep").unwrap();
        symlink(&target, &link).unwrap();

        write_file(&link, b"new").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "keep");
        assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_create_symlink() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("link");

        create_symlink(&link, b"../somewhere").unwrap();
        create_symlink(&link, b"../elsewhere").unwrap();

        assert_eq!(
            fs::read_link(&link).unwrap().to_string_lossy(),
            "../elsewhere"
        );
    }

    #[test]
    fn test_write_file_leaves_no_temp_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "old").unwrap();

        write_file(&path, b"new").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("f")]);
    }

    #[test]
    fn test_write_file_replaces_by_rename() {
        use std::io::Read;

        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "old").unwrap();
        let mut before = File::open(&path).unwrap();

        write_file(&path, b"new").unwrap();

        // the old inode is untouched; the name now points at a complete new file
        let mut old = String::new();
        before.read_to_string(&mut old).unwrap();
        assert_eq!(old, "old");
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_write_file_missing_parent_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("f");

        assert!(write_file(&path, b"x").is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_create_symlink_non_utf8_target() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        create_symlink(&link, b"\xff\xfe/x").unwrap();

        assert_eq!(fs::read_link(&link).unwrap().as_os_str().as_bytes(), b"\xff\xfe/x");
    }

    #[test]
    fn test_refuses_to_clobber_directory() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        assert!(matches!(
            write_file(&sub, b"x"),
            Err(Error::TargetNotEmpty(_))
        ));
    }
}
