use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// A fully resolved sandbox configuration.
///
/// Constructed once per invocation by [`crate::resolve_sandbox_config`] and never mutated
/// afterwards. It holds only paths and strings; it owns no OS resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxConfig {
    /// The directory the command starts in (absolute).
    pub working_dir: PathBuf,
    /// The directory to use as the sandbox root, if any (absolute).
    pub sandbox_root_dir: Option<PathBuf>,
    /// How long the command may run; zero means no limit.
    #[serde(serialize_with = "as_seconds")]
    pub timeout: Duration,
    /// How long to wait after the timeout before sending `SIGKILL`.
    #[serde(serialize_with = "as_seconds")]
    pub kill_delay: Duration,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    /// Paths that stay writable inside the sandbox.
    pub writable_paths: Vec<PathBuf>,
    /// Paths hidden from the sandboxed process.
    pub inaccessible_paths: Vec<PathBuf>,
    /// Directories mounted as empty tmpfs; always ends with `/tmp`.
    pub tmpfs_dirs: Vec<PathBuf>,
    pub bind_mounts: Vec<BindMount>,
    pub create_network_namespace: bool,
    pub fake_root: bool,
    pub debug: bool,
    /// The argv to execute; never empty.
    pub command: Vec<String>,
}

/// A path exposed at `target` inside the sandbox with the contents of `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl BindMount {
    /// A mount of `source` onto itself.
    pub(crate) fn identity(source: PathBuf) -> Self {
        Self {
            target: source.clone(),
            source,
        }
    }
}

fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}
