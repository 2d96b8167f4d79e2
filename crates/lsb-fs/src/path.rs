use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Split a path at its last `/` into a directory part and a final component.
///
/// Unlike [`Path::parent`], this operates on the raw bytes of the path, so a trailing slash
/// yields an empty final component and a path without any slash yields an empty directory.
///
/// ```text
/// "/foo/bar" -> ("/foo", "bar")
/// "/foo"     -> ("/", "foo")
/// "foo"      -> ("", "foo")
/// "foo/"     -> ("foo", "")
/// ```
pub fn split_path(path: &Path) -> (&Path, &Path) {
    let bytes = path.as_os_str().as_bytes();
    match bytes.iter().rposition(|&byte| byte == b'/') {
        None => (Path::new(""), path),
        // A single leading slash belongs to the directory part.
        Some(0) => (Path::new("/"), Path::new(OsStr::from_bytes(&bytes[1..]))),
        Some(pos) => (
            Path::new(OsStr::from_bytes(&bytes[..pos])),
            Path::new(OsStr::from_bytes(&bytes[pos + 1..])),
        ),
    }
}

/// Return the directory part of `path`, as computed by [`split_path`].
pub fn dirname(path: &Path) -> &Path {
    split_path(path).0
}

/// Return the final component of `path`, as computed by [`split_path`].
pub fn basename(path: &Path) -> &Path {
    split_path(path).1
}

/// Concatenate two paths with exactly one `/` between them.
///
/// In contrast to [`Path::join`], an absolute `right` does not replace `left`.
pub fn join_path(left: impl AsRef<Path>, right: impl AsRef<Path>) -> PathBuf {
    let left = left.as_ref().as_os_str().as_bytes();
    let right = right.as_ref().as_os_str().as_bytes();

    if left.is_empty() {
        return PathBuf::from(OsStr::from_bytes(right));
    }

    let mut joined = Vec::with_capacity(left.len() + right.len() + 1);
    joined.extend_from_slice(left);
    match (left.ends_with(b"/"), right.starts_with(b"/")) {
        (true, true) => joined.extend_from_slice(&right[1..]),
        (false, false) => {
            joined.push(b'/');
            joined.extend_from_slice(right);
        }
        _ => joined.extend_from_slice(right),
    }
    PathBuf::from(OsStr::from_bytes(&joined))
}

/// Returns `true` if `path` is exactly the filesystem root.
pub fn is_root_directory(path: &Path) -> bool {
    path.as_os_str().as_bytes() == b"/"
}

/// Returns `true` if `path` is non-empty and starts with `/`.
pub fn is_absolute(path: &Path) -> bool {
    path.as_os_str().as_bytes().first() == Some(&b'/')
}

#[cfg(test)]
mod tests;
