//! An anonymous pipe for signaling between a launcher and the child it supervises.
//!
//! Both ends are created with `O_CLOEXEC` in a single `pipe2` call, so neither descriptor can
//! leak into an unrelated process spawned concurrently. A child that should keep one end must
//! clear the flag explicitly (e.g., via `dup2` in a `pre_exec` hook).

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tracing::trace;

/// A unidirectional byte channel. Dropping it closes both ends.
#[derive(Debug)]
pub struct Pipe {
    receiver: File,
    sender: File,
}

impl Pipe {
    /// Create a new pipe with both ends marked close-on-exec.
    pub fn new() -> io::Result<Self> {
        let (receiver, sender) = pipe2(OFlag::O_CLOEXEC).map_err(io::Error::from)?;
        trace!("Created pipe: {receiver:?} -> {sender:?}");
        Ok(Self {
            receiver: File::from(receiver),
            sender: File::from(sender),
        })
    }

    /// Write the whole of `buffer` with a single `write`.
    ///
    /// A partial write is reported as [`io::ErrorKind::WriteZero`]; the bytes that were accepted
    /// remain in the pipe.
    pub fn send(&self, buffer: &[u8]) -> io::Result<()> {
        let written = (&self.sender).write(buffer)?;
        if written == buffer.len() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("pipe accepted {written} of {} bytes", buffer.len()),
            ))
        }
    }

    /// Read up to `buffer.len()` bytes, returning how many were read.
    ///
    /// Blocks until data is available. Returns `0` only for an empty `buffer`, since the write
    /// end is held open for as long as the pipe exists.
    pub fn receive(&self, buffer: &mut [u8]) -> io::Result<usize> {
        (&self.receiver).read(buffer)
    }

    /// The read end of the pipe.
    pub fn receiver(&self) -> BorrowedFd<'_> {
        self.receiver.as_fd()
    }

    /// The write end of the pipe.
    pub fn sender(&self) -> BorrowedFd<'_> {
        self.sender.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nix::fcntl::{FcntlArg, FdFlag, fcntl};

    use super::*;

    #[test]
    fn single_threaded() {
        let pipe = Pipe::new().unwrap();
        let mut buffer = [0u8; 50];

        pipe.send(b"hello").unwrap();
        assert_eq!(pipe.receive(&mut buffer[..3]).unwrap(), 3);
        pipe.send(b" world").unwrap();
        assert_eq!(pipe.receive(&mut buffer[3..8]).unwrap(), 5);
        assert_eq!(pipe.receive(&mut buffer[8..48]).unwrap(), 3);
        assert_eq!(&buffer[..11], b"hello world");
    }

    #[test]
    fn multi_threaded() {
        let pipe = Arc::new(Pipe::new().unwrap());
        let mut buffer = [0u8; 50];

        let writer = {
            let pipe = Arc::clone(&pipe);
            std::thread::spawn(move || {
                pipe.send(b"hello").unwrap();
                pipe.send(b" world").unwrap();
            })
        };
        // Wait for all data to be fully written to the pipe.
        writer.join().unwrap();

        assert_eq!(pipe.receive(&mut buffer[..3]).unwrap(), 3);
        assert_eq!(pipe.receive(&mut buffer[3..8]).unwrap(), 5);
        assert_eq!(pipe.receive(&mut buffer[8..48]).unwrap(), 3);
        assert_eq!(&buffer[..11], b"hello world");
    }

    #[test]
    fn empty_buffers() {
        let pipe = Pipe::new().unwrap();
        pipe.send(b"").unwrap();
        assert_eq!(pipe.receive(&mut []).unwrap(), 0);
    }

    #[test]
    fn both_ends_close_on_exec() {
        let pipe = Pipe::new().unwrap();
        for fd in [pipe.receiver(), pipe.sender()] {
            let flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD).unwrap());
            assert!(flags.contains(FdFlag::FD_CLOEXEC));
        }
    }
}
