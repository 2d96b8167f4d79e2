use super::*;

#[test]
fn test_split_path() {
    assert_eq!(
        split_path(Path::new("/foo/bar")),
        (Path::new("/foo"), Path::new("bar"))
    );
    assert_eq!(
        split_path(Path::new("/foo")),
        (Path::new("/"), Path::new("foo"))
    );
    assert_eq!(split_path(Path::new("foo")), (Path::new(""), Path::new("foo")));
    assert_eq!(split_path(Path::new("foo/")), (Path::new("foo"), Path::new("")));
    assert_eq!(split_path(Path::new("/")), (Path::new("/"), Path::new("")));
    assert_eq!(split_path(Path::new("")), (Path::new(""), Path::new("")));
}

#[test]
fn test_dirname_basename() {
    assert_eq!(dirname(Path::new("/a/b/c")), Path::new("/a/b"));
    assert_eq!(basename(Path::new("/a/b/c")), Path::new("c"));
    assert_eq!(dirname(Path::new("/a")), Path::new("/"));
    assert_eq!(dirname(Path::new("a")), Path::new(""));
    // Walking up with `dirname` ends at the root or at the empty path.
    assert_eq!(dirname(dirname(Path::new("/a/b"))), Path::new("/"));
    assert_eq!(dirname(dirname(Path::new("a/b"))), Path::new(""));
}

#[test]
fn test_join_path() {
    assert_eq!(join_path("", "/bar"), PathBuf::from("/bar"));
    assert_eq!(join_path("", "bar"), PathBuf::from("bar"));
    assert_eq!(join_path("foo/", "/bar"), PathBuf::from("foo/bar"));
    assert_eq!(join_path("foo/", "bar"), PathBuf::from("foo/bar"));
    assert_eq!(join_path("foo", "/bar"), PathBuf::from("foo/bar"));
    assert_eq!(join_path("foo", "bar"), PathBuf::from("foo/bar"));
    assert_eq!(join_path("/", "bar"), PathBuf::from("/bar"));
}

#[test]
fn test_root_and_absolute() {
    assert!(is_root_directory(Path::new("/")));
    assert!(!is_root_directory(Path::new("//")));
    assert!(!is_root_directory(Path::new("")));
    assert!(!is_root_directory(Path::new("/tmp")));

    assert!(is_absolute(Path::new("/")));
    assert!(is_absolute(Path::new("/usr/bin")));
    assert!(!is_absolute(Path::new("")));
    assert!(!is_absolute(Path::new("usr/bin")));
    assert!(!is_absolute(Path::new("./usr")));
}
