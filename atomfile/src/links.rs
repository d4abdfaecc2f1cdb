//! Hard link counting.

use std::io;
use std::path::Path;

use crate::{Error, Result};

/// Number of directory entries referencing the file at `path`.
///
/// A final symlink component is not followed: the count is for the link
/// itself.
#[cfg(unix)]
pub fn hardlink_count(path: &Path) -> Result<u64> {
    use std::os::unix::fs::MetadataExt;

    match std::fs::symlink_metadata(path) {
        Ok(md) => Ok(md.nlink()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(path.to_path_buf())),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(not(unix))]
pub fn hardlink_count(path: &Path) -> Result<u64> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Err(Error::Unsupported(format!(
            "hard link count for {}",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(path.to_path_buf())),
        Err(e) => Err(Error::Io(e)),
    }
}

/// True if more than one directory entry shares the file at `path`.
pub fn is_shared(path: &Path) -> Result<bool> {
    Ok(hardlink_count(path)? > 1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_link() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("one.txt");
        fs::write(&path, b"x").unwrap();

        assert_eq!(hardlink_count(&path).unwrap(), 1);
        assert!(!is_shared(&path).unwrap());
    }

    #[test]
    fn test_hard_links_are_counted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("orig.txt");
        fs::write(&path, b"x").unwrap();
        fs::hard_link(&path, tmp.path().join("alias.txt")).unwrap();

        assert_eq!(hardlink_count(&path).unwrap(), 2);
        assert!(is_shared(&path).unwrap());
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = hardlink_count(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_symlink_is_not_followed() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target.txt");
        fs::write(&target, b"x").unwrap();
        fs::hard_link(&target, tmp.path().join("second.txt")).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(hardlink_count(&link).unwrap(), 1);
    }

    #[test]
    fn test_dangling_symlink_still_counts() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        std::os::unix::fs::symlink(tmp.path().join("gone"), &link).unwrap();

        assert_eq!(hardlink_count(&link).unwrap(), 1);
    }
}
