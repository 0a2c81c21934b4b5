//! Taking and renewing locks.

use super::bids::Bid;
use super::codec::{read_lock, write_lock};
use super::manager::{LockManager, deadline, validate_kind, validate_name};
use super::types::{LockRecord, LockRequest, LockerId, LockerInfo, Origin};
use crate::clock::Clock;
use crate::error::{Conflict, LockError, Result};
use crate::store::ObjectStore;
use tracing::debug;

/// Expired bids dropped from the whole registry each time a bid comes in.
const BID_SWEEP_LIMIT: usize = 2;

impl<C: Clock> LockManager<C> {
    /// Take or renew a lock on the object for `origin`.
    ///
    /// The request is validated in full before any state is touched. A bid,
    /// if present, is then recorded before the lock is even read, so it keeps
    /// standing whether or not this call wins. Checks run in this order:
    ///
    /// 1. tag: an occupied record only admits its own tag
    /// 2. renewal flags against whether this exact locker already holds it
    /// 3. capacity and kind against the remaining lockers
    /// 4. for fresh exclusive requests with a bid, lowest live bid wins
    ///
    /// # Errors
    ///
    /// * `LockError::Invalid` - bad kind, empty name, both renewal flags,
    ///   negative duration, or a bid on a shared lock
    /// * `LockError::Busy` - any check above failed
    /// * `LockError::Store` / `LockError::Corrupt` - the record could not be
    ///   read or written
    pub fn lock<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        origin: &Origin,
        req: &LockRequest,
    ) -> Result<()> {
        let exclusive = req.kind.is_exclusive();
        debug!(
            object = store.object_id(),
            lock = %req.name,
            kind = %req.kind,
            may_renew = req.flags.may_renew,
            must_renew = req.flags.must_renew,
            bid = ?req.bid.map(|b| b.amount),
            "lock requested"
        );

        validate_kind(req.kind)?;
        validate_name(&req.name)?;
        if req.flags.may_renew && req.flags.must_renew {
            // They disagree on what to do when the lock does not exist yet.
            return Err(LockError::Invalid(
                "may-renew and must-renew are mutually exclusive".to_string(),
            ));
        }

        let now = self.clock.now();
        let expiration = if req.duration.is_zero() {
            None
        } else {
            Some(deadline(now, req.duration, "lock duration")?)
        };

        let bid = match req.bid {
            Some(bid) => {
                if !exclusive {
                    debug!(lock = %req.name, "bid on a lock that is not exclusive");
                    return Err(LockError::Invalid(
                        "bids are only accepted for exclusive locks".to_string(),
                    ));
                }
                if bid.amount < 0 {
                    return Err(LockError::Invalid("bid amount must not be negative".to_string()));
                }
                Some(Bid {
                    amount: bid.amount,
                    expiration: deadline(now, bid.duration, "bid duration")?,
                })
            }
            None => None,
        };

        if let Some(bid) = bid {
            self.bids.sweep_some(now, BID_SWEEP_LIMIT);
            self.bids
                .record(store.object_id(), &req.name, &origin.name, bid);
        }

        let mut record = read_lock(store, &req.name, now)?;
        let id = LockerId::new(origin.name.as_str(), req.cookie.as_str());

        // Before the renewal checks, so a mismatch is never reported as a
        // missing lock.
        if !record.is_empty() && req.tag != record.tag {
            debug!(lock = %req.name, "cannot take lock, conflicting tag");
            return Err(LockError::Busy(Conflict::TagMismatch));
        }

        let existing_kind = record.lock_type;
        let is_renewal = record.lockers.contains_key(&id);
        if is_renewal {
            if !req.flags.may_renew && !req.flags.must_renew {
                return Err(LockError::Busy(Conflict::AlreadyLocked));
            }
            record.lockers.remove(&id);
        } else if req.flags.must_renew {
            debug!(lock = %req.name, locker = %id, "no existing lock to renew");
            return Err(LockError::Busy(Conflict::NotLocked));
        }

        if !record.is_empty() {
            if exclusive {
                debug!(
                    lock = %req.name,
                    lockers = %describe_lockers(&record),
                    "cannot exclusive-lock, already locked"
                );
                return Err(LockError::Busy(Conflict::Exclusive));
            }
            if existing_kind != req.kind {
                debug!(lock = %req.name, existing = %existing_kind, "cannot take lock, conflicting lock type");
                return Err(LockError::Busy(Conflict::KindMismatch));
            }
        }

        if !is_renewal
            && let Some(bid) = bid
            && !self.bids.is_lowest(store.object_id(), &req.name, bid.amount, now)
        {
            debug!(lock = %req.name, amount = bid.amount, "cannot take lock, lower bid outstanding");
            return Err(LockError::Busy(Conflict::OutBid));
        }

        record.lock_type = req.kind;
        record.tag = req.tag.clone();
        record.lockers.insert(
            id,
            LockerInfo {
                expiration,
                addr: origin.legacy_addr(),
                description: req.description.clone(),
            },
        );

        write_lock(store, &req.name, &record)
    }
}

fn describe_lockers(record: &LockRecord) -> String {
    record
        .lockers
        .keys()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
