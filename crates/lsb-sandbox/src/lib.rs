//! Resolution of raw `linux-sandbox` options into the configuration consumed by the isolation
//! executor, plus the kernel capability check.

pub use config::{BindMount, SandboxConfig};
#[cfg(target_os = "linux")]
pub use linux::{NamespaceError, check_namespaces_supported};
pub use resolve::{ResolveError, check_sandbox_options, resolve_sandbox_config};
pub use settings::{MountToken, SandboxOptions};

mod config;
#[cfg(target_os = "linux")]
mod linux;
mod resolve;
mod settings;
