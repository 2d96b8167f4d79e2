//! Creation of trusted directories (`mkdir -p` with an ownership check).
//!
//! Every directory the sandbox relies on (its root, the install base, output trees) is created
//! through [`make_directories`]. An existing directory is only accepted if the link itself (not
//! what it resolves to) is owned by the effective user, so another local user cannot pre-create
//! the path and have its contents trusted.

use std::io;
use std::path::{Path, PathBuf};

use rustix::fs::{FileType, Mode, chmod, lstat, mkdir, stat};
use rustix::io::Errno;
use rustix::process::{geteuid, umask};
use thiserror::Error;
use tracing::{debug, trace};

use crate::path::{dirname, is_root_directory};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Refusing to create `{}`: the path is empty or the filesystem root", _0.display())]
    InvalidPath(PathBuf),

    #[error("`{}` exists but is not a directory", _0.display())]
    NotADirectory(PathBuf),

    #[error(
        "`{}` is owned by uid {owner}, but the current user is uid {euid}",
        path.display()
    )]
    NotOwned { path: PathBuf, owner: u32, euid: u32 },

    #[error("Failed to {operation} `{}`", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DirectoryError {
    fn io(operation: &'static str, path: &Path, errno: Errno) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source: io::Error::from(errno),
        }
    }

    /// Returns `true` if the error means some component of the path does not exist.
    fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl From<DirectoryError> for io::Error {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Io { source, .. } => source,
            err @ (DirectoryError::InvalidPath(_) | DirectoryError::NotOwned { .. }) => {
                Self::new(io::ErrorKind::PermissionDenied, err)
            }
            err @ DirectoryError::NotADirectory(_) => Self::new(io::ErrorKind::NotADirectory, err),
        }
    }
}

/// Create `path` and any missing parents, then make sure the final directory is owned by the
/// effective user and carries exactly `mode` (after applying the umask).
///
/// An existing final directory with different permission bits is `chmod`-ed into compliance. If
/// the final component is a symlink to a directory, ownership is checked on the link while the
/// permission bits are enforced on its target.
///
/// Parent directories are created with `mode` as well but are never checked or adjusted; only the
/// final directory's trust matters. If another process creates the final directory concurrently,
/// it is re-validated rather than assumed to be fine.
pub fn make_directories(path: impl AsRef<Path>, mode: u32) -> Result<(), DirectoryError> {
    make_directories_impl(path.as_ref(), mode, true)
}

fn make_directories_impl(path: &Path, mode: u32, childmost: bool) -> Result<(), DirectoryError> {
    if path.as_os_str().is_empty() || is_root_directory(path) {
        return Err(DirectoryError::InvalidPath(path.to_path_buf()));
    }

    match check_directory(path, mode, childmost) {
        Ok(()) => return Ok(()),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    make_directories_impl(dirname(path), mode, false)?;

    match mkdir(path, Mode::from_raw_mode(mode)) {
        Ok(()) => {
            debug!("Created directory: `{}`", path.display());
            Ok(())
        }
        Err(Errno::EXIST) if childmost => {
            // Somebody else created it between our `stat` and `mkdir`.
            trace!(
                "Directory `{}` appeared concurrently, re-checking",
                path.display()
            );
            check_directory(path, mode, true)
        }
        // A parent that turns out not to be a directory fails on the next `mkdir` down the chain.
        Err(Errno::EXIST) => Ok(()),
        Err(errno) => Err(DirectoryError::io("create directory", path, errno)),
    }
}

/// Verify that `path` is a directory and, if `check_perms` is set, enforce its trust record.
fn check_directory(path: &Path, mode: u32, check_perms: bool) -> Result<(), DirectoryError> {
    let target = stat(path).map_err(|errno| DirectoryError::io("stat", path, errno))?;
    if FileType::from_raw_mode(target.st_mode) != FileType::Directory {
        return Err(DirectoryError::NotADirectory(path.to_path_buf()));
    }

    if !check_perms {
        return Ok(());
    }

    // Ownership is checked on the link, never on what it points to.
    let link = lstat(path).map_err(|errno| DirectoryError::io("lstat", path, errno))?;
    let euid = geteuid().as_raw();
    if link.st_uid != euid {
        return Err(DirectoryError::NotOwned {
            path: path.to_path_buf(),
            owner: link.st_uid,
            euid,
        });
    }

    let desired = mode & !current_umask();
    let actual = u32::from(target.st_mode) & 0o777;
    if actual != desired {
        debug!(
            "Changing mode of `{}` from {actual:o} to {desired:o}",
            path.display()
        );
        chmod(path, Mode::from_raw_mode(desired))
            .map_err(|errno| DirectoryError::io("change permissions of", path, errno))?;
    }

    Ok(())
}

/// Read the process umask.
///
/// The umask can only be read by replacing it, so it is restored immediately. It is re-read on
/// every call since other code in the process may change it.
fn current_umask() -> u32 {
    let mask = umask(Mode::from_raw_mode(0o022));
    umask(mask);
    u32::from(mask.as_raw_mode())
}
