//! Error types for the lock manager.
//!
//! Uses thiserror for derive macros. The variants follow the four request
//! outcomes a caller has to tell apart: a malformed request, contention on the
//! lock, a locker that does not exist, and a failing attribute store.

use crate::exit_codes;
use crate::lock::DecodeError;
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

/// Why a lock request could not be satisfied right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// The record is held under a different tag.
    TagMismatch,
    /// The same locker already holds the lock and renewal was not allowed.
    AlreadyLocked,
    /// Renewal was required but the locker holds nothing to renew.
    NotLocked,
    /// An exclusive lock was requested while other lockers remain.
    Exclusive,
    /// The remaining lockers hold the lock with a different kind.
    KindMismatch,
    /// A lower live bid exists for this lock.
    OutBid,
    /// The replacement cookie is already in use by the same identity.
    CookieInUse,
    /// The asserted lock is not held as described.
    NotHeld,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Conflict::TagMismatch => "conflicting tag",
            Conflict::AlreadyLocked => "already locked by this locker",
            Conflict::NotLocked => "no existing lock to renew",
            Conflict::Exclusive => "held by another locker",
            Conflict::KindMismatch => "conflicting lock type",
            Conflict::OutBid => "a lower bid is outstanding",
            Conflict::CookieInUse => "cookie already in use",
            Conflict::NotHeld => "not held as asserted",
        };
        f.write_str(msg)
    }
}

/// Main error type for lock manager operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The request was malformed; nothing was read or written.
    #[error("invalid lock request: {0}")]
    Invalid(String),

    /// The lock is unavailable for this request.
    #[error("lock unavailable: {0}")]
    Busy(Conflict),

    /// The named locker does not hold the lock.
    #[error("no such lock: {0}")]
    NotFound(String),

    /// The attribute store failed.
    #[error("attribute store failure: {0}")]
    Store(#[from] StoreError),

    /// A stored lock record could not be decoded.
    #[error("corrupt lock record '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: DecodeError,
    },

    /// Host configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(String),
}

impl LockError {
    /// Returns the CLI exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Invalid(_) => exit_codes::INVALID_REQUEST,
            LockError::Busy(_) | LockError::Store(StoreError::Busy { .. }) => exit_codes::LOCK_BUSY,
            LockError::NotFound(_) => exit_codes::NOT_FOUND,
            LockError::Store(_) | LockError::Corrupt { .. } => exit_codes::IO_FAILURE,
            LockError::Config(_) => exit_codes::USER_ERROR,
        }
    }

    /// True for contention outcomes, which callers are expected to retry.
    /// Includes timing out while another request holds the object.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            LockError::Busy(_) | LockError::Store(StoreError::Busy { .. })
        )
    }

    /// True for store failures and undecodable records.
    pub fn is_io(&self) -> bool {
        match self {
            LockError::Store(StoreError::Busy { .. }) => false,
            LockError::Store(_) | LockError::Corrupt { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for lock manager operations.
pub type Result<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_has_correct_exit_code() {
        let err = LockError::Invalid("empty lock name".to_string());
        assert_eq!(err.exit_code(), exit_codes::INVALID_REQUEST);
    }

    #[test]
    fn busy_has_correct_exit_code() {
        let err = LockError::Busy(Conflict::Exclusive);
        assert_eq!(err.exit_code(), exit_codes::LOCK_BUSY);
        assert!(err.is_busy());
        assert!(!err.is_io());
    }

    #[test]
    fn not_found_has_correct_exit_code() {
        let err = LockError::NotFound("foo".to_string());
        assert_eq!(err.exit_code(), exit_codes::NOT_FOUND);
    }

    #[test]
    fn store_error_is_io_class() {
        let err = LockError::from(StoreError::Backend("disk on fire".to_string()));
        assert_eq!(err.exit_code(), exit_codes::IO_FAILURE);
        assert!(err.is_io());
    }

    #[test]
    fn object_busy_is_contention_not_io() {
        let err = LockError::from(StoreError::Busy {
            object: "obj".to_string(),
            holder: String::new(),
        });
        assert_eq!(err.exit_code(), exit_codes::LOCK_BUSY);
        assert!(err.is_busy());
        assert!(!err.is_io());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = LockError::Busy(Conflict::TagMismatch);
        assert_eq!(err.to_string(), "lock unavailable: conflicting tag");

        let err = LockError::NotFound("lock 'foo' has no locker client.1/c1".to_string());
        assert_eq!(
            err.to_string(),
            "no such lock: lock 'foo' has no locker client.1/c1"
        );
    }
}
