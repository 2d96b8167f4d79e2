use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs_err::os::unix::fs::OpenOptionsExt;
use rustix::fs::{Access, access};
use tracing::{debug, trace, warn};

pub use crate::directories::{DirectoryError, make_directories};
pub use crate::mtime::FileMtime;
pub use crate::path::*;

mod directories;
mod mtime;
mod path;

/// Replace the file at `path` with `data`.
///
/// Any existing file is unlinked first, then a new executable (`0o755` before umask) file is
/// created and the whole buffer is written with a single `write`. A short write is an error, as
/// is a failure to close the file, which is where network filesystems report errors they
/// deferred at `write` time. The data is not forced to storage.
///
/// This is not atomic: a crash between the unlink and the write leaves no file or a partial one.
/// Use [`write_file`] only where that is acceptable.
pub fn write_file(path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> std::io::Result<()> {
    let path = path.as_ref();
    let data = data.as_ref();

    // Absence is fine; any real problem resurfaces when creating the file.
    if !unlink_path(path) {
        trace!("Nothing to remove at `{}`", path.display());
    }

    let mut file = fs_err::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o755)
        .open(path)?;

    let written = file.write(data)?;
    if written != data.len() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            format!(
                "Short write to `{}`: wrote {written} of {} bytes",
                path.display(),
                data.len()
            ),
        ));
    }

    // Dropping a `File` discards the result of `close`.
    nix::unistd::close(file.into_file()).map_err(|errno| {
        let err = std::io::Error::from(errno);
        std::io::Error::new(
            err.kind(),
            format!("failed to close file `{}`: {err}", path.display()),
        )
    })?;
    Ok(())
}

/// Read the contents of `path`, returning at most `max_size` bytes.
///
/// A `max_size` of `0` reads the whole file.
pub fn read_file(path: impl AsRef<Path>, max_size: usize) -> std::io::Result<Vec<u8>> {
    let mut file = fs_err::File::open(path.as_ref())?;
    let mut content = Vec::new();
    if max_size == 0 {
        file.read_to_end(&mut content)?;
    } else {
        let limit = u64::try_from(max_size).unwrap_or(u64::MAX);
        file.take(limit).read_to_end(&mut content)?;
    }
    Ok(content)
}

/// Remove the file at `path`, returning `true` if it was removed.
pub fn unlink_path(path: impl AsRef<Path>) -> bool {
    std::fs::remove_file(path.as_ref()).is_ok()
}

/// Returns `true` if anything exists at `path` (following symlinks).
pub fn path_exists(path: impl AsRef<Path>) -> bool {
    access(path.as_ref(), Access::EXISTS).is_ok()
}

/// Returns `true` if `path` is a directory (following symlinks).
pub fn is_directory(path: impl AsRef<Path>) -> bool {
    fs_err::metadata(path.as_ref()).is_ok_and(|metadata| metadata.is_dir())
}

/// Returns `true` if `path` is not a directory and the current user may read it.
pub fn can_read_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    !is_directory(path) && access(path, Access::READ_OK).is_ok()
}

/// Returns `true` if `path` is not a directory and the current user may execute it.
pub fn can_execute_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    !is_directory(path) && access(path, Access::EXEC_OK).is_ok()
}

/// Returns `true` if `path` is a directory the current user may list, modify and enter.
pub fn can_access_directory(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    is_directory(path)
        && access(path, Access::READ_OK | Access::WRITE_OK | Access::EXEC_OK).is_ok()
}

/// Resolve `path` to an absolute path without symlinks, or `None` if that fails.
pub fn make_canonical(path: impl AsRef<Path>) -> Option<PathBuf> {
    match fs_err::canonicalize(path.as_ref()) {
        Ok(canonical) => Some(canonical),
        Err(err) => {
            debug!("Failed to canonicalize: {err}");
            None
        }
    }
}

/// Flush the contents of the file at `path` to storage.
pub fn sync_file(path: impl AsRef<Path>) -> std::io::Result<()> {
    fs_err::File::open(path.as_ref())?.sync_all()
}

/// Recursively collect every entry below `path` that is not a directory.
///
/// Symlinks are not followed; a symlink to a directory is reported like a file. Entries that
/// cannot be read are skipped.
pub fn files_under(path: impl AsRef<Path>) -> Vec<PathBuf> {
    walkdir::WalkDir::new(path.as_ref())
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Failed to read entry: {err}");
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn read_file_respects_max_size() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("test.readfile");
        fs_err::write(&path, "hello world").unwrap();

        assert_eq!(read_file(&path, 0).unwrap(), b"hello world");
        assert_eq!(read_file(&path, 5).unwrap(), b"hello");
        assert_eq!(read_file(&path, 100).unwrap(), b"hello world");
        assert!(read_file("/dev/null", 42).unwrap().is_empty());
    }

    #[test]
    fn read_file_missing() {
        let temp = tempfile::tempdir().unwrap();
        let err = read_file(temp.path().join("missing"), 0).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn write_file_replaces_contents() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("test.writefile");

        write_file(&path, &b"hello"[..3]).unwrap();
        assert_eq!(read_file(&path, 0).unwrap(), b"hel");

        write_file(&path, b"hello").unwrap();
        assert_eq!(read_file(&path, 0).unwrap(), b"hello");

        // No residue of the longer previous content.
        write_file(&path, b"hi").unwrap();
        assert_eq!(read_file(&path, 0).unwrap(), b"hi");
    }

    #[test]
    fn write_file_is_executable() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("script");
        write_file(&path, b"#!/bin/sh\n").unwrap();

        let mode = fs_err::metadata(&path).unwrap().permissions().mode();
        assert_ne!(mode & 0o100, 0, "owner execute bit should be set: {mode:o}");
    }

    #[test]
    fn write_file_replaces_read_only_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("readonly");
        fs_err::write(&path, "old").unwrap();
        fs_err::set_permissions(&path, std::fs::Permissions::from_mode(0o444)).unwrap();

        // The old file is unlinked, so its mode does not matter.
        write_file(&path, b"new").unwrap();
        assert_eq!(read_file(&path, 0).unwrap(), b"new");
    }

    #[test]
    fn write_file_into_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let err = write_file(temp.path().join("missing").join("file"), b"x").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn unlink_and_exists() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("file");
        assert!(!path_exists(&path));
        assert!(!unlink_path(&path));

        write_file(&path, b"").unwrap();
        assert!(path_exists(&path));
        assert!(unlink_path(&path));
        assert!(!path_exists(&path));
    }

    #[test]
    fn access_predicates() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("file");
        fs_err::write(&file, "").unwrap();
        fs_err::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(can_read_file(&file));
        assert!(!can_access_directory(&file));
        assert!(can_access_directory(temp.path()));
        assert!(!can_read_file(temp.path()));
        assert!(!can_execute_file(temp.path()));

        write_file(&file, b"").unwrap();
        assert!(can_execute_file(&file));
    }

    #[test]
    fn canonical_paths() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("dir");
        fs_err::create_dir(&dir).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).unwrap();

        assert_eq!(make_canonical(&link), make_canonical(&dir));
        assert_eq!(make_canonical(temp.path().join("missing")), None);
    }

    #[test]
    fn sync_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("file");
        write_file(&path, b"data").unwrap();
        sync_file(&path).unwrap();
        assert!(sync_file(temp.path().join("missing")).is_err());
    }

    #[test]
    fn collects_files_recursively() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a").join("b");
        make_directories(&nested, 0o755).unwrap();
        write_file(temp.path().join("top"), b"").unwrap();
        write_file(nested.join("leaf"), b"").unwrap();
        std::os::unix::fs::symlink(&nested, temp.path().join("link")).unwrap();

        let mut files = files_under(temp.path());
        files.sort();
        assert_eq!(
            files,
            vec![
                nested.join("leaf"),
                temp.path().join("link"),
                temp.path().join("top"),
            ]
        );
        assert!(files_under(temp.path().join("missing")).is_empty());
    }
}
