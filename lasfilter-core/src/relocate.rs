//! Moving produced files to a well-known directory.
//!
//! Independent of the processing pipeline; collaborators use it to hand the
//! output over to the user.

use log::{debug, info};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while relocating a file.
#[derive(Error, Debug)]
pub enum RelocateError {
    #[error("file does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("cannot locate the home directory")]
    NoHomeDir,

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The user's download directory, `~/Downloads`.
pub fn downloads_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join("Downloads"))
}

/// Moves `file` into [`downloads_dir`], creating it if needed.
pub fn move_to_downloads<P: AsRef<Path>>(file: P) -> Result<PathBuf, RelocateError> {
    let target_dir = downloads_dir().ok_or(RelocateError::NoHomeDir)?;
    relocate(file, target_dir)
}

/// Moves `file` into `target_dir` keeping its file name, creating the
/// directory if it is missing. Returns the new path.
pub fn relocate<P: AsRef<Path>, Q: AsRef<Path>>(
    file: P,
    target_dir: Q,
) -> Result<PathBuf, RelocateError> {
    let file = file.as_ref();
    let target_dir = target_dir.as_ref();

    let file_name = match file.file_name() {
        Some(name) if file.is_file() => name,
        _ => return Err(RelocateError::SourceMissing(file.to_path_buf())),
    };
    let target = target_dir.join(file_name);
    let io_error = |source: io::Error| RelocateError::Io {
        from: file.to_path_buf(),
        to: target.clone(),
        source,
    };

    if !target_dir.is_dir() {
        debug!("creating {}", target_dir.display());
        fs::create_dir_all(target_dir).map_err(io_error)?;
    }

    if let Err(rename_err) = fs::rename(file, &target) {
        // rename cannot cross filesystems
        debug!("rename failed ({}), falling back to copy", rename_err);
        fs::copy(file, &target).map_err(|_| io_error(rename_err))?;
        fs::remove_file(file).map_err(io_error)?;
    }

    info!("moved {} to {}", file.display(), target.display());
    Ok(target)
}
