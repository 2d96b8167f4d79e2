//! Unix-specific functionality for linux-sandbox.
//!
//! This crate is only functional on Unix platforms.

#![cfg(unix)]

mod pipe;

pub use pipe::Pipe;
