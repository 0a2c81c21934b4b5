//! The lock manager service object.

use super::bids::BidRegistry;
use super::types::LockKind;
use crate::clock::{Clock, SystemClock};
use crate::error::{LockError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Adjudicates lock requests against one object at a time.
///
/// The manager owns the two pieces of state that outlive a request: the
/// clock and the bid registry. Everything else (the object's attributes and
/// the caller's identity) is passed into each operation.
#[derive(Debug)]
pub struct LockManager<C = SystemClock> {
    pub(super) clock: C,
    pub(super) bids: Arc<BidRegistry>,
}

impl Default for LockManager<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> LockManager<C> {
    /// A manager with its own, empty bid registry.
    pub fn new(clock: C) -> Self {
        Self::with_bids(clock, Arc::new(BidRegistry::new()))
    }

    /// A manager sharing an existing bid registry.
    pub fn with_bids(clock: C, bids: Arc<BidRegistry>) -> Self {
        Self { clock, bids }
    }

    pub fn bids(&self) -> &Arc<BidRegistry> {
        &self.bids
    }

    /// Purge expired bids from the registry. Returns how many were dropped.
    pub fn sweep_bids(&self) -> usize {
        self.bids.sweep(self.clock.now())
    }
}

pub(super) fn validate_kind(kind: LockKind) -> Result<()> {
    if !kind.is_valid() {
        return Err(LockError::Invalid(format!("invalid lock type '{}'", kind)));
    }
    Ok(())
}

pub(super) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockError::Invalid("lock name must not be empty".to_string()));
    }
    Ok(())
}

/// `now + duration`, rejecting negative durations and overflow.
pub(super) fn deadline(now: DateTime<Utc>, duration: Duration, what: &str) -> Result<DateTime<Utc>> {
    if duration < Duration::zero() {
        return Err(LockError::Invalid(format!("{} must not be negative", what)));
    }
    now.checked_add_signed(duration)
        .ok_or_else(|| LockError::Invalid(format!("{} is out of range", what)))
}
