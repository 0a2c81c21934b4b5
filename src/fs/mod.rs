//! Filesystem utilities for objlock.
//!
//! Attribute files are always replaced atomically so that a crash mid-write
//! can never leave a half-written lock record behind.

mod atomic;

pub use atomic::atomic_write;
