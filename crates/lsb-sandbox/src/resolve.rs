//! Validate [`SandboxOptions`] into a concrete [`SandboxConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::{BindMount, SandboxConfig};
use crate::settings::{MountToken, SandboxOptions};

/// A directory that is always mounted as an empty tmpfs.
const DEFAULT_TMPFS_DIR: &str = "/tmp";

/// Error returned when the command line describes an invalid sandbox.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Multiple root directories (-S) specified, expected one.")]
    MultipleRootDirectories,
    #[error("Multiple working directories (-W) specified, expected one.")]
    MultipleWorkingDirectories,
    #[error("Cannot redirect stdout to more than one destination.")]
    MultipleStdoutPaths,
    #[error("Cannot redirect stderr to more than one destination.")]
    MultipleStderrPaths,
    #[error("The -{flag} option must be used with absolute paths only.")]
    RelativePath { flag: char, path: PathBuf },
    #[error("The -m option must be strictly preceded by an -M option.")]
    UnpairedMountTarget,
    #[error("No command specified.")]
    NoCommand,
    #[error("Merging commands not supported.")]
    MergingCommands,
}

/// Build a [`SandboxConfig`] from [`SandboxOptions`].
///
/// `cwd` becomes the working directory when `-W` was not given. `/tmp` is appended to the tmpfs
/// directories.
pub fn resolve_sandbox_config(
    options: &SandboxOptions,
    cwd: &Path,
) -> Result<SandboxConfig, ResolveError> {
    let CheckedOptions {
        sandbox_root_dir,
        working_dir,
        stdout_path,
        stderr_path,
        writable_paths,
        inaccessible_paths,
        mut tmpfs_dirs,
        bind_mounts,
    } = CheckedOptions::from_options(options)?;

    let mut command = Vec::new();
    set_command(&mut command, &options.command)?;

    tmpfs_dirs.push(PathBuf::from(DEFAULT_TMPFS_DIR));
    let working_dir = working_dir.unwrap_or_else(|| {
        debug!("No working directory given, using `{}`", cwd.display());
        cwd.to_path_buf()
    });

    Ok(SandboxConfig {
        working_dir,
        sandbox_root_dir,
        timeout: Duration::from_secs(options.timeout.unwrap_or(0)),
        kill_delay: Duration::from_secs(options.kill_delay.unwrap_or(0)),
        stdout_path,
        stderr_path,
        writable_paths,
        inaccessible_paths,
        tmpfs_dirs,
        bind_mounts,
        create_network_namespace: options.create_network_namespace,
        fake_root: options.fake_root,
        debug: options.debug,
        command,
    })
}

/// Check every option value without requiring a command.
///
/// Used for the options that precede `-C`, which are validated as they are reached even though
/// no sandbox is prepared.
pub fn check_sandbox_options(options: &SandboxOptions) -> Result<(), ResolveError> {
    CheckedOptions::from_options(options).map(drop)
}

/// The option values that hold on their own, before the command and defaults are applied.
struct CheckedOptions {
    sandbox_root_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    stdout_path: Option<PathBuf>,
    stderr_path: Option<PathBuf>,
    writable_paths: Vec<PathBuf>,
    inaccessible_paths: Vec<PathBuf>,
    tmpfs_dirs: Vec<PathBuf>,
    bind_mounts: Vec<BindMount>,
}

impl CheckedOptions {
    fn from_options(options: &SandboxOptions) -> Result<Self, ResolveError> {
        let sandbox_root_dir = single_absolute(
            &options.sandbox_root_dirs,
            'S',
            ResolveError::MultipleRootDirectories,
        )?;
        let working_dir = single_absolute(
            &options.working_dirs,
            'W',
            ResolveError::MultipleWorkingDirectories,
        )?;
        let stdout_path = single(&options.stdout_paths, ResolveError::MultipleStdoutPaths)?;
        let stderr_path = single(&options.stderr_paths, ResolveError::MultipleStderrPaths)?;

        let writable_paths = all_absolute(&options.writable_paths, 'w')?;
        let inaccessible_paths = all_absolute(&options.inaccessible_paths, 'i')?;
        let tmpfs_dirs = all_absolute(&options.tmpfs_dirs, 'e')?;

        let mut plan = BindMountPlan::default();
        for token in &options.mount_tokens {
            match token {
                MountToken::Source(path) => plan.source(require_absolute(path, 'M')?),
                MountToken::Target(path) => plan.target(require_absolute(path, 'm')?)?,
                MountToken::Other => plan.close(),
            }
        }

        Ok(Self {
            sandbox_root_dir,
            working_dir,
            stdout_path,
            stderr_path,
            writable_paths,
            inaccessible_paths,
            tmpfs_dirs,
            bind_mounts: plan.into_mounts(),
        })
    }
}

/// Whether the most recent `-M` may still be retargeted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum PairState {
    #[default]
    NoOpenPair,
    OpenPair,
}

/// Collects bind mounts while enforcing the `-M`/`-m` pairing.
#[derive(Debug, Default)]
struct BindMountPlan {
    mounts: Vec<BindMount>,
    state: PairState,
}

impl BindMountPlan {
    /// Open a new pair whose target defaults to `source`.
    fn source(&mut self, source: PathBuf) {
        self.mounts.push(BindMount::identity(source));
        self.state = PairState::OpenPair;
    }

    /// Retarget the open pair and close it.
    fn target(&mut self, target: PathBuf) -> Result<(), ResolveError> {
        match (self.state, self.mounts.last_mut()) {
            (PairState::OpenPair, Some(mount)) => {
                mount.target = target;
                self.state = PairState::NoOpenPair;
                Ok(())
            }
            _ => Err(ResolveError::UnpairedMountTarget),
        }
    }

    fn close(&mut self) {
        self.state = PairState::NoOpenPair;
    }

    fn into_mounts(self) -> Vec<BindMount> {
        self.mounts
    }
}

fn require_absolute(path: &Path, flag: char) -> Result<PathBuf, ResolveError> {
    if lsb_fs::is_absolute(path) {
        Ok(path.to_path_buf())
    } else {
        Err(ResolveError::RelativePath {
            flag,
            path: path.to_path_buf(),
        })
    }
}

fn all_absolute(paths: &[PathBuf], flag: char) -> Result<Vec<PathBuf>, ResolveError> {
    paths
        .iter()
        .map(|path| require_absolute(path, flag))
        .collect()
}

/// Accept at most one value, checking the first one before rejecting a repeat.
fn single_absolute(
    paths: &[PathBuf],
    flag: char,
    repeated: ResolveError,
) -> Result<Option<PathBuf>, ResolveError> {
    match paths {
        [] => Ok(None),
        [first, rest @ ..] => {
            let first = require_absolute(first, flag)?;
            if rest.is_empty() {
                Ok(Some(first))
            } else {
                Err(repeated)
            }
        }
    }
}

fn single(paths: &[PathBuf], repeated: ResolveError) -> Result<Option<PathBuf>, ResolveError> {
    match paths {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        _ => Err(repeated),
    }
}

fn set_command(command: &mut Vec<String>, args: &[String]) -> Result<(), ResolveError> {
    if args.is_empty() {
        return Err(ResolveError::NoCommand);
    }
    if !command.is_empty() {
        return Err(ResolveError::MergingCommands);
    }
    command.extend_from_slice(args);
    Ok(())
}
