//! Ownership and permission snapshots.
//!
//! A snapshot is taken from the file being replaced, or, when there is no
//! such file yet, from a throwaway probe file created in the same directory.
//! The probe tells us what owner and mode a freshly created file gets there
//! (umask, setgid directories and so on) without guessing.

use std::fs;
use std::io;
use std::path::Path;

#[cfg(unix)]
use crate::tmpname::{make_tmpname, NameSeed};
use crate::{Error, Result};

/// Only these bits of a caller-supplied override mode are honored.
pub const SAFETY_MASK: u32 = 0o666;

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// Owner and permission bits captured before a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataSnapshot {
    pub uid: u32,
    pub gid: u32,
    /// Permission bits, including set-id and sticky bits.
    pub mode: u32,
}

#[cfg(unix)]
impl MetadataSnapshot {
    fn from_metadata(md: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            uid: md.uid(),
            gid: md.gid(),
            mode: md.mode() & 0o7777,
        }
    }
}

/// Mode to apply after install: the masked override if given, else the
/// snapshot's bits.
pub fn effective_mode(override_mode: Option<u32>, snapshot: Option<&MetadataSnapshot>) -> Option<u32> {
    match override_mode {
        Some(mode) => Some(mode & SAFETY_MASK),
        None => snapshot.map(|s| s.mode),
    }
}

/// Stat `path` (following symlinks) into a snapshot.
#[cfg(unix)]
pub fn stat_snapshot(path: &Path) -> Result<Lookup<MetadataSnapshot>> {
    match fs::metadata(path) {
        Ok(md) => Ok(Lookup::Found(MetadataSnapshot::from_metadata(&md))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Lookup::NotFound),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
pub fn stat_snapshot(path: &Path) -> Result<Lookup<MetadataSnapshot>> {
    match fs::metadata(path) {
        Ok(_) => Err(Error::Unsupported(format!(
            "ownership metadata for {}",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Lookup::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Discover the owner and mode a new file in `dir` would receive.
///
/// Creates a probe file, stats it and removes it again. The probe is
/// removed even when the stat fails.
#[cfg(unix)]
pub fn probe_defaults(dir: &Path) -> Result<MetadataSnapshot> {
    let probe = dir.join(make_tmpname(NameSeed::Affixes {
        prefix: ".permissions_check.",
        suffix: "",
    }));
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)?;

    let stat = fs::metadata(&probe);
    let removed = fs::remove_file(&probe);
    let md = stat?;
    removed?;

    tracing::debug!(dir = %dir.display(), "probed default file permissions");
    Ok(MetadataSnapshot::from_metadata(&md))
}

#[cfg(not(unix))]
pub fn probe_defaults(_dir: &Path) -> Result<MetadataSnapshot> {
    Err(Error::Unsupported("default permission probe".to_string()))
}

/// Snapshot `path`, falling back to probed defaults in its directory when
/// it does not exist.
pub fn capture(path: &Path) -> Result<MetadataSnapshot> {
    match stat_snapshot(path)? {
        Lookup::Found(snapshot) => Ok(snapshot),
        Lookup::NotFound => {
            let dir = parent_dir(path);
            probe_defaults(dir)
        }
    }
}

/// Create `dir` and its ancestors if missing, applying `mode` to any
/// directory created.
pub fn ensure_dir(dir: &Path, mode: Option<u32>) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir)?;
    Ok(())
}

/// Set the owner and group of `path` from `snapshot`.
#[cfg(unix)]
pub fn restore_owner(path: &Path, snapshot: &MetadataSnapshot) -> Result<()> {
    std::os::unix::fs::chown(path, Some(snapshot.uid), Some(snapshot.gid))
        .map_err(|e| permission_error(path, "chown", e))
}

#[cfg(not(unix))]
pub fn restore_owner(path: &Path, _snapshot: &MetadataSnapshot) -> Result<()> {
    Err(Error::Unsupported(format!("chown of {}", path.display())))
}

/// Set the permission bits of `path`.
#[cfg(unix)]
pub fn restore_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| permission_error(path, "chmod", e))
}

#[cfg(not(unix))]
pub fn restore_mode(path: &Path, _mode: u32) -> Result<()> {
    Err(Error::Unsupported(format!("chmod of {}", path.display())))
}

/// Set the permission bits of a still-open staged file, before it is
/// renamed into place.
#[cfg(unix)]
pub fn apply_mode_to_open(file: &fs::File, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn apply_mode_to_open(_file: &fs::File, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn permission_error(path: &Path, op: &'static str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::PermissionDenied {
        Error::Permission {
            path: path.to_path_buf(),
            op,
            source: e,
        }
    } else {
        Error::Io(e)
    }
}

/// Parent directory of `path`, `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use tempfile::TempDir;

    #[test]
    fn test_effective_mode_prefers_masked_override() {
        let snap = MetadataSnapshot { uid: 1, gid: 1, mode: 0o600 };
        assert_eq!(effective_mode(Some(0o4755), Some(&snap)), Some(0o644));
        assert_eq!(effective_mode(None, Some(&snap)), Some(0o600));
        assert_eq!(effective_mode(None, None), None);
    }

    #[test]
    fn test_stat_snapshot_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        fs::write(&path, b"x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let snap = stat_snapshot(&path).unwrap().found().unwrap();
        let md = fs::metadata(&path).unwrap();
        assert_eq!(snap.mode, 0o640);
        assert_eq!(snap.uid, md.uid());
        assert_eq!(snap.gid, md.gid());
    }

    #[test]
    fn test_stat_snapshot_missing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(stat_snapshot(&tmp.path().join("nope")).unwrap(), Lookup::NotFound);
    }

    #[test]
    fn test_probe_matches_fresh_file_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let reference = tmp.path().join("reference");
        fs::write(&reference, b"").unwrap();
        let expected = fs::metadata(&reference).unwrap().mode() & 0o7777;

        let snap = probe_defaults(tmp.path()).unwrap();

        assert_eq!(snap.mode, expected);
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".permissions_check."))
            .collect();
        assert!(leftovers.is_empty(), "probe file should be removed");
    }

    #[test]
    fn test_capture_falls_back_to_probe() {
        let tmp = TempDir::new().unwrap();
        let reference = tmp.path().join("reference");
        fs::write(&reference, b"").unwrap();
        let md = fs::metadata(&reference).unwrap();

        let snap = capture(&tmp.path().join("absent.txt")).unwrap();

        assert_eq!((snap.uid, snap.gid), (md.uid(), md.gid()));
        assert_eq!(snap.mode, md.mode() & 0o7777);
        assert!(!tmp.path().join("absent.txt").exists());
    }

    #[test]
    fn test_ensure_dir_creates_nested_with_mode() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");

        ensure_dir(&dir, Some(0o750)).unwrap();

        assert!(dir.is_dir());
        // umask can only clear bits
        let mode = fs::metadata(&dir).unwrap().mode() & 0o777;
        assert_eq!(mode & !0o750, 0);
    }

    #[test]
    fn test_ensure_dir_existing_is_untouched() {
        let tmp = TempDir::new().unwrap();
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o700)).unwrap();

        ensure_dir(tmp.path(), Some(0o755)).unwrap();

        assert_eq!(fs::metadata(tmp.path()).unwrap().mode() & 0o777, 0o700);
    }

    #[test]
    fn test_restore_mode_and_owner_to_self() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        fs::write(&path, b"x").unwrap();
        let md = fs::metadata(&path).unwrap();
        let snap = MetadataSnapshot { uid: md.uid(), gid: md.gid(), mode: 0o604 };

        restore_owner(&path, &snap).unwrap();
        restore_mode(&path, snap.mode).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().mode() & 0o7777, 0o604);
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("file.txt")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/etc/hosts")), Path::new("/etc"));
    }
}
