//! Forced rename: move a file over an existing destination.

use std::fs;
use std::io;
use std::path::Path;

use crate::tmpname::{make_tmpname, NameSeed};
use crate::{Error, Result};

/// Move `source` to `destination`, replacing whatever is there.
///
/// A missing `source` is a no-op. When the two paths live on different
/// filesystems the content is staged next to `destination` and renamed
/// into place, so the install is still a single rename on the destination
/// filesystem.
pub fn force_rename(source: &Path, destination: &Path) -> Result<()> {
    force_rename_via(source, destination, replace)
}

/// [`force_rename`] with the same-filesystem rename step supplied by the
/// caller.
fn force_rename_via<R>(source: &Path, destination: &Path, rename_step: R) -> Result<()>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    match fs::symlink_metadata(source) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    match rename_step(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(
                source = %source.display(),
                destination = %destination.display(),
                "cross-device rename, staging copy next to destination"
            );
            stage_across_devices(source, destination)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn replace(source: &Path, destination: &Path) -> io::Result<()> {
    // rename(2) swaps an existing destination in one step
    fs::rename(source, destination)
}

#[cfg(not(unix))]
fn replace(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(md) if !md.is_dir() => fs::remove_file(destination)?,
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(source, destination)
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

/// Copy `source` into a staged file beside `destination`, rename the staged
/// file over `destination`, then remove `source`.
///
/// The copy keeps `source`'s permission bits. If `source` cannot be removed
/// once `destination` holds the new content, the result is
/// [`Error::SourceLeftBehind`].
pub(crate) fn stage_across_devices(source: &Path, destination: &Path) -> Result<()> {
    let file_name = destination
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let prefix = format!(".{}.", file_name);
    let staged = destination.with_file_name(make_tmpname(NameSeed::Affixes {
        prefix: &prefix,
        suffix: ".staged",
    }));

    if let Err(e) = fs::copy(source, &staged) {
        let _ = fs::remove_file(&staged);
        return Err(e.into());
    }
    if let Err(e) = replace(&staged, destination) {
        let _ = fs::remove_file(&staged);
        return Err(e.into());
    }
    fs::remove_file(source).map_err(|e| Error::SourceLeftBehind {
        installed: destination.to_path_buf(),
        staged: source.to_path_buf(),
        source: e,
    })
}
