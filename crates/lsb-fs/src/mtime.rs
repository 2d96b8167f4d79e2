use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use tracing::trace;

const SECONDS_PER_YEAR: u64 = 3600 * 24 * 365;

/// Marks files by moving their modification time into one of two bands.
///
/// A file is either stamped with the current time or with a time ten years ahead. Because real
/// files never carry a timestamp that far in the future, a distant-future mtime is a cheap
/// out-of-band signal (e.g., "this file has already been validated").
///
/// Both thresholds are fixed when the marker is created, so repeated queries never consult the
/// clock again.
#[derive(Debug, Clone, Copy)]
pub struct FileMtime {
    /// Nine years in the future; anything newer counts as "distant future".
    near_future: FileTime,
    /// Ten years in the future.
    distant_future: FileTime,
}

impl Default for FileMtime {
    fn default() -> Self {
        Self::new()
    }
}

impl FileMtime {
    pub fn new() -> Self {
        let now = SystemTime::now();
        Self {
            near_future: FileTime::from_system_time(years_after(now, 9)),
            distant_future: FileTime::from_system_time(years_after(now, 10)),
        }
    }

    /// Returns `true` if the modification time of `path` lies in the distant-future band.
    ///
    /// The mtime is compared against the near-future threshold rather than the exact
    /// distant-future stamp, which avoids any reliance on exact timestamp equality.
    pub fn is_in_distant_future(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        let metadata = fs_err::metadata(path.as_ref())?;
        Ok(FileTime::from_last_modification_time(&metadata) > self.near_future)
    }

    /// Set the access and modification time of `path` to now.
    pub fn set_to_now(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let now = FileTime::now();
        trace!("Marking `{}` as current", path.as_ref().display());
        filetime::set_file_times(path.as_ref(), now, now)
    }

    /// Set the access and modification time of `path` ten years into the future.
    pub fn set_to_distant_future(&self, path: impl AsRef<Path>) -> io::Result<()> {
        trace!("Marking `{}` as distant future", path.as_ref().display());
        filetime::set_file_times(path.as_ref(), self.distant_future, self.distant_future)
    }
}

fn years_after(time: SystemTime, years: u64) -> SystemTime {
    time + Duration::from_secs(SECONDS_PER_YEAR * years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write_file;

    #[test]
    fn mtime_handling() {
        let temp = tempfile::tempdir().unwrap();
        let mtime = FileMtime::new();

        assert!(!mtime.is_in_distant_future(temp.path()).unwrap());

        // A freshly written file is not in the future.
        let file = temp.path().join("foo.txt");
        write_file(&file, b"hello").unwrap();
        assert!(!mtime.is_in_distant_future(&file).unwrap());

        mtime.set_to_distant_future(&file).unwrap();
        assert!(mtime.is_in_distant_future(&file).unwrap());

        // Overwriting the file resets its mtime.
        write_file(&file, b"world").unwrap();
        assert!(!mtime.is_in_distant_future(&file).unwrap());

        mtime.set_to_distant_future(&file).unwrap();
        assert!(mtime.is_in_distant_future(&file).unwrap());
        mtime.set_to_now(&file).unwrap();
        assert!(!mtime.is_in_distant_future(&file).unwrap());

        // Once the file is gone, nothing can be set or queried.
        fs_err::remove_file(&file).unwrap();
        assert!(mtime.set_to_now(&file).is_err());
        assert!(mtime.set_to_distant_future(&file).is_err());
        assert!(mtime.is_in_distant_future(&file).is_err());
    }

    #[test]
    fn bands_are_disjoint_across_markers() {
        let temp = tempfile::tempdir().unwrap();
        let now_file = temp.path().join("now");
        let future_file = temp.path().join("future");
        write_file(&now_file, b"").unwrap();
        write_file(&future_file, b"").unwrap();

        let first = FileMtime::new();
        first.set_to_now(&now_file).unwrap();
        first.set_to_distant_future(&future_file).unwrap();

        // A second marker created later in the process agrees with the first.
        let second = FileMtime::new();
        assert!(!second.is_in_distant_future(&now_file).unwrap());
        assert!(second.is_in_distant_future(&future_file).unwrap());
        assert!(first.near_future < first.distant_future);
    }
}
