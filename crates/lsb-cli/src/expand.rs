//! Inline `@file` argument files into the argument list.

use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use lsb_static::EnvVars;
use lsb_warnings::warn_user;

/// The default bound on how many argument files may be open at the same time.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("Failed to open argument file `{}`", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read from argument file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Argument file `{}` includes itself", path.display())]
    Cycle { path: PathBuf },
    #[error(
        "Argument file `{}` is nested more than {max_depth} levels deep",
        path.display()
    )]
    TooDeep { path: PathBuf, max_depth: usize },
}

/// Replaces every `@file` argument with the non-empty lines of `file`.
///
/// Lines are expanded again, so argument files may reference other argument files. Expansion
/// stops at the first `--` in the top-level list; it and everything after it are copied as-is.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentExpander {
    max_depth: usize,
}

impl Default for ArgumentExpander {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ArgumentExpander {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Read the depth bound from [`EnvVars::LSB_MAX_ARGUMENT_FILE_DEPTH`].
    pub fn from_env() -> Self {
        let Some(value) = std::env::var_os(EnvVars::LSB_MAX_ARGUMENT_FILE_DEPTH) else {
            return Self::default();
        };
        match value.to_str().and_then(|value| value.parse::<usize>().ok()) {
            Some(max_depth) => Self::new(max_depth),
            None => {
                warn_user!(
                    "Ignoring invalid value for `{}`: `{}` (expected a non-negative integer)",
                    EnvVars::LSB_MAX_ARGUMENT_FILE_DEPTH,
                    value.to_string_lossy()
                );
                Self::default()
            }
        }
    }

    pub fn expand<I>(&self, args: I) -> Result<Vec<OsString>, ExpandError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args = args.into_iter();
        let mut expanded = Vec::new();
        let mut chain = Vec::new();

        while let Some(arg) = args.next() {
            if arg == "--" {
                expanded.push(arg);
                expanded.extend(args);
                break;
            }
            self.expand_argument(arg, &mut chain, &mut expanded)?;
        }

        Ok(expanded)
    }

    /// Expand a single argument, where `chain` holds the argument files currently being read.
    fn expand_argument(
        &self,
        arg: OsString,
        chain: &mut Vec<PathBuf>,
        expanded: &mut Vec<OsString>,
    ) -> Result<(), ExpandError> {
        let Some(path) = argument_file(&arg) else {
            expanded.push(arg);
            return Ok(());
        };

        let file = fs_err::File::open(path).map_err(|source| ExpandError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let identity = fs_err::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if chain.contains(&identity) {
            return Err(ExpandError::Cycle {
                path: path.to_path_buf(),
            });
        }
        if chain.len() >= self.max_depth {
            return Err(ExpandError::TooDeep {
                path: path.to_path_buf(),
                max_depth: self.max_depth,
            });
        }

        debug!("Expanding argument file: `{}`", path.display());
        chain.push(identity);
        for line in BufReader::new(file).split(b'\n') {
            let line = line.map_err(|source| ExpandError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            if line.is_empty() {
                continue;
            }
            trace!("Read argument: {}", String::from_utf8_lossy(&line));
            self.expand_argument(OsString::from_vec(line), chain, expanded)?;
        }
        chain.pop();

        Ok(())
    }
}

/// The file named by an `@file` argument.
fn argument_file(arg: &OsStr) -> Option<&Path> {
    arg.as_bytes()
        .strip_prefix(b"@")
        .map(|path| Path::new(OsStr::from_bytes(path)))
}
