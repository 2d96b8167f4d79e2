//! Check whether the kernel lets this user create the namespaces a sandbox needs.

use std::io;

use nix::errno::Errno;
use nix::sched::{CloneFlags, clone};
use nix::sys::signal::Signal;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::debug;

/// Stack size for the child, which returns immediately.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("Failed to create a process in new user, mount, UTS, IPC, network and PID namespaces")]
    Clone(#[source] io::Error),
    #[error("Failed to wait for namespace check process {pid}")]
    Wait {
        pid: Pid,
        #[source]
        source: io::Error,
    },
}

/// The namespaces every sandboxed process is started in.
fn sandbox_namespaces() -> CloneFlags {
    CloneFlags::CLONE_NEWUSER
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWIPC
        | CloneFlags::CLONE_NEWNET
        | CloneFlags::CLONE_NEWPID
}

/// Start a child in fresh namespaces, let it exit at once, and reap it.
///
/// Succeeds if the kernel allowed the namespaces to be created. The child is always waited for
/// once it exists, retrying on `EINTR`.
pub fn check_namespaces_supported() -> Result<(), NamespaceError> {
    let mut stack = vec![0u8; CHILD_STACK_SIZE];

    // SAFETY: Without `CLONE_VM` the child runs on a copy of our address space, and the callback
    // only returns a constant.
    #[allow(unsafe_code)]
    let pid = unsafe {
        clone(
            Box::new(|| 0),
            &mut stack,
            sandbox_namespaces(),
            Some(Signal::SIGCHLD as i32),
        )
    }
    .map_err(|errno| NamespaceError::Clone(io::Error::from(errno)))?;
    debug!("Started namespace check process {pid}");

    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                debug!("Namespace check finished: {status:?}");
                return Ok(());
            }
            Err(Errno::EINTR) => {}
            Err(errno) => {
                return Err(NamespaceError::Wait {
                    pid,
                    source: io::Error::from(errno),
                });
            }
        }
    }
}
