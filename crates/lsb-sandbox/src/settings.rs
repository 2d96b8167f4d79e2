use std::path::PathBuf;

/// The raw values collected from the command line, before any validation.
///
/// Single-valued options are kept as lists so that repetition can be diagnosed during resolution
/// rather than silently resolved by the argument parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxOptions {
    /// Every `-S` value, in order.
    pub sandbox_root_dirs: Vec<PathBuf>,
    /// Every `-W` value, in order.
    pub working_dirs: Vec<PathBuf>,
    /// Timeout in seconds (`-T`); the last occurrence wins.
    pub timeout: Option<u64>,
    /// Kill delay in seconds (`-t`); the last occurrence wins.
    pub kill_delay: Option<u64>,
    /// Every `-l` value, in order.
    pub stdout_paths: Vec<PathBuf>,
    /// Every `-L` value, in order.
    pub stderr_paths: Vec<PathBuf>,
    pub writable_paths: Vec<PathBuf>,
    pub inaccessible_paths: Vec<PathBuf>,
    pub tmpfs_dirs: Vec<PathBuf>,
    /// The `-M`/`-m` values in command-line order, with a marker wherever other options intervene.
    pub mount_tokens: Vec<MountToken>,
    pub create_network_namespace: bool,
    pub fake_root: bool,
    pub debug: bool,
    /// Everything after the options.
    pub command: Vec<String>,
}

/// A command-line option as seen by the bind-mount pairing rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountToken {
    /// `-M`: opens a new pair.
    Source(PathBuf),
    /// `-m`: retargets the open pair.
    Target(PathBuf),
    /// One or more other options, which close the open pair.
    Other,
}
