//! Exit code constants for the objlock CLI.
//!
//! Each error class of the lock manager gets its own code:
//! - 0: Success
//! - 1: User error (bad config, unusable arguments)
//! - 2: Invalid lock request
//! - 3: Lock unavailable (contention, tag/kind mismatch, lost bid, or another
//!   request holding the object past the guard timeout)
//! - 4: No such lock
//! - 5: Attribute store failure or corrupt lock record

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: unreadable or invalid configuration, unusable CLI input.
pub const USER_ERROR: i32 = 1;

/// The lock request itself was malformed and was rejected before touching state.
pub const INVALID_REQUEST: i32 = 2;

/// The lock is held in a way that makes the request impossible right now.
pub const LOCK_BUSY: i32 = 3;

/// The named locker does not hold the lock.
pub const NOT_FOUND: i32 = 4;

/// The attribute store failed or held undecodable bytes.
pub const IO_FAILURE: i32 = 5;
