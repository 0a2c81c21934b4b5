//! Advisory locks on objects in an attribute store.
//!
//! Each object may carry any number of named locks. A lock is one attribute
//! (`lock.<name>`) holding a [`LockRecord`]: the lock type, a tag shared by
//! all holders, and the set of lockers with their expirations.
//!
//! # Lock Types
//!
//! - `exclusive`: at most one locker
//! - `shared`: any number of lockers, all with the same tag
//! - `exclusive_ephemeral`: exclusive, and the record disappears with its
//!   last locker
//!
//! # Expiry
//!
//! Lockers may carry an expiration. Expired lockers are dropped every time a
//! record is read, so they never influence a decision or show up in a reply.
//!
//! # Bidding
//!
//! Exclusive requests may carry a bid. Among contending requests for the same
//! lock, only one with the lowest live bid can take it. Bids live in a
//! [`BidRegistry`] owned by the [`LockManager`], not in the store.
//!
//! # Concurrency
//!
//! The manager assumes the [`ObjectStore`](crate::store::ObjectStore) it is
//! handed is exclusive to the current request. The bid registry is the only
//! state shared between requests and is internally synchronized.

mod bids;
mod codec;
mod grant;
mod manager;
mod query;
mod release;
mod types;


// Re-export public API
pub use bids::{Bid, BidRegistry};
pub use codec::{DecodeError, LOCK_PREFIX, decode, encode, lock_key, read_lock, write_lock};
pub use manager::LockManager;
pub use types::{
    BidRequest, HeldLock, LockFlags, LockKind, LockRecord, LockRequest, LockerId, LockerInfo,
    Origin,
};
