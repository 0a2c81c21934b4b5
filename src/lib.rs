//! objlock: advisory locks on objects in a key-attribute store.
//!
//! The library is organised around [`lock::LockManager`], which runs lock
//! requests against one object's attributes through the
//! [`store::ObjectStore`] capability. The `objlock` binary wraps it in a
//! command line host backed by [`store::FileStore`].

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod lock;
pub mod logging;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Conflict, LockError, Result};
pub use lock::LockManager;
pub use store::{FileStore, MemoryStore, ObjectStore, StoreError};
