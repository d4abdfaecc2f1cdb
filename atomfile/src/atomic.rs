//! Atomic file write operations.
//!
//! New content is written to a temp file in a scratch directory and renamed
//! over the target, so readers see either the old file or the new one and
//! never a partial write. Owner and permission bits of the replaced file
//! (or the directory's defaults for a new file) are restored afterwards.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::meta::{self, MetadataSnapshot};
use crate::tmpname::{make_tmpname, NameSeed};
use crate::{links, rename, Error, Result};

/// How the temp file is opened for the writer callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Start from an empty file.
    #[default]
    Write,

    /// Start from the current content; writes go to the end.
    Append,

    /// Start from the current content; read/write with the cursor at 0.
    Update,
}

impl WriteMode {
    /// Whether the temp file is seeded with the target's current content.
    pub fn preserves_content(self) -> bool {
        !matches!(self, WriteMode::Write)
    }

    fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            WriteMode::Write => options.write(true).create_new(true),
            WriteMode::Append => options.append(true).create(true),
            WriteMode::Update => options.read(true).write(true).create(true),
        };
        // Staged content stays owner-only until the final mode is applied
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
    }
}

/// Options for [`atomic_write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub mode: WriteMode,
    /// Permission bits to apply instead of the captured ones. Masked with
    /// [`meta::SAFETY_MASK`].
    pub override_mode: Option<u32>,
    /// Staging directory; resolved through [`Config`] when unset.
    pub scratch_dir: Option<PathBuf>,
    pub fsync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self {
            mode: WriteMode::Write,
            override_mode: None,
            scratch_dir: None,
            fsync: true,
        }
    }

    /// Options seeded from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: WriteMode::Write,
            override_mode: config.default_mode,
            scratch_dir: Some(config.resolved_scratch_dir()),
            fsync: config.fsync,
        }
    }

    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn override_mode(mut self, mode: u32) -> Self {
        self.override_mode = Some(mode);
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    fn resolved_scratch_dir(&self) -> PathBuf {
        match &self.scratch_dir {
            Some(dir) => dir.clone(),
            None => Config::default().resolved_scratch_dir(),
        }
    }
}

/// Removes the temp file on drop unless it was installed.
struct TempGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> TempGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}

/// Replace `target` with whatever `write` produces, atomically.
///
/// `write` receives the open temp file. If it fails, `target` is left
/// exactly as it was and the temp file is removed. On success the callback's
/// value is returned.
pub fn atomic_write<T, E, F>(target: &Path, options: &WriteOptions, write: F) -> Result<T>
where
    F: FnOnce(&mut File) -> std::result::Result<T, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let file_name = target
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(format!("no file name in {}", target.display())))?;
    let parent = meta::parent_dir(target);
    fs::create_dir_all(parent)?;

    let scratch = options.resolved_scratch_dir();
    meta::ensure_dir(&scratch, None)?;
    let temp_path = scratch.join(make_tmpname(NameSeed::Base(&file_name)));
    let mut guard = TempGuard::new(&temp_path);
    tracing::debug!(path = %target.display(), temp = %temp_path.display(), "staging atomic write");

    if options.mode.preserves_content() {
        seed_from_target(target, &temp_path)?;
    }

    // The handle is closed at the end of this block on every path
    let (value, snapshot, mode) = {
        let mut file = options.mode.open_options().open(&temp_path)?;
        let value = write(&mut file).map_err(|e| Error::Callback(e.into()))?;
        file.flush()?;

        let snapshot = capture_snapshot(target)?;

        match links::hardlink_count(target) {
            Ok(count) if count > 1 => {
                tracing::warn!(
                    path = %target.display(),
                    links = count,
                    "replacing hardlinked file; other links keep the previous content"
                );
            }
            Ok(0) => meta::ensure_dir(parent, options.override_mode)?,
            Ok(_) => {}
            Err(e) if e.is_recoverable_lookup() => meta::ensure_dir(parent, options.override_mode)?,
            Err(e) => return Err(e),
        }

        let mode = meta::effective_mode(options.override_mode, snapshot.as_ref());
        if let Some(mode) = mode {
            meta::apply_mode_to_open(&file, mode)?;
        }
        if options.fsync {
            file.sync_all()?;
        }
        (value, snapshot, mode)
    };

    // A staged source that outlives the install is reported only after the
    // metadata of the installed file has been restored
    let leftover = match rename::force_rename(&temp_path, target) {
        Ok(()) => None,
        Err(e @ Error::SourceLeftBehind { .. }) => Some(e),
        Err(e) => return Err(e),
    };
    if leftover.is_none() {
        guard.disarm();
    }
    tracing::debug!(path = %target.display(), "installed new content");

    if let Some(snapshot) = &snapshot {
        meta::restore_owner(target, snapshot)?;
    }
    if let Some(mode) = mode {
        match meta::restore_mode(target, mode) {
            Err(Error::Unsupported(_)) => {}
            other => other?,
        }
    }

    match leftover {
        Some(e) => Err(e),
        None => Ok(value),
    }
}

/// Write `bytes` to `path` atomically with default options.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_bytes_with(path, bytes, &WriteOptions::default())
}

/// Write `bytes` to `path` atomically.
pub fn write_bytes_with(path: &Path, bytes: &[u8], options: &WriteOptions) -> Result<()> {
    atomic_write(path, options, |file| file.write_all(bytes))
}

fn seed_from_target(target: &Path, temp_path: &Path) -> Result<()> {
    match fs::copy(target, temp_path) {
        Ok(_) => {
            // fs::copy carries the target's mode over; a read-only target
            // would leave us unable to open the copy for writing
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(temp_path, fs::Permissions::from_mode(0o600))?;
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn capture_snapshot(target: &Path) -> Result<Option<MetadataSnapshot>> {
    match meta::capture(target) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(Error::Unsupported(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
