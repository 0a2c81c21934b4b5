//! Read-only lock queries and cookie rotation.

use super::codec::{lock_name, read_lock, write_lock};
use super::manager::{LockManager, validate_kind, validate_name};
use super::types::{HeldLock, LockRecord, LockerId, Origin};
use crate::clock::Clock;
use crate::error::{Conflict, LockError, Result};
use crate::store::ObjectStore;
use tracing::debug;

impl<C: Clock> LockManager<C> {
    /// Current state of a lock, with expired lockers already dropped.
    ///
    /// A lock that was never taken reads as the empty record.
    pub fn get_info<S: ObjectStore + ?Sized>(&self, store: &mut S, name: &str) -> Result<LockRecord> {
        read_lock(store, name, self.clock.now())
    }

    /// Names of every lock record on the object, held or not.
    pub fn list_locks<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<Vec<String>> {
        Ok(store
            .list_attrs()?
            .iter()
            .filter_map(|key| lock_name(key))
            .map(str::to_string)
            .collect())
    }

    /// Succeed only if the caller holds `held` exactly as described.
    pub fn assert_locked<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        origin: &Origin,
        held: &HeldLock,
    ) -> Result<()> {
        let record = self.read_held(store, held)?;
        check_held(&record, origin, held)?;
        Ok(())
    }

    /// Move the caller's hold from `held.cookie` to `new_cookie`, keeping its
    /// expiration, address and description.
    pub fn set_cookie<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        origin: &Origin,
        held: &HeldLock,
        new_cookie: &str,
    ) -> Result<()> {
        let mut record = self.read_held(store, held)?;
        let id = check_held(&record, origin, held)?;

        let new_id = LockerId::new(origin.name.as_str(), new_cookie);
        if record.lockers.contains_key(&new_id) {
            debug!(lock = %held.name, cookie = new_cookie, "lock cookie in use");
            return Err(LockError::Busy(Conflict::CookieInUse));
        }

        let Some(info) = record.lockers.remove(&id) else {
            return Err(LockError::Busy(Conflict::NotHeld));
        };
        record.lockers.insert(new_id, info);

        write_lock(store, &held.name, &record)
    }

    fn read_held<S: ObjectStore + ?Sized>(&self, store: &mut S, held: &HeldLock) -> Result<LockRecord> {
        validate_kind(held.kind)?;
        validate_name(&held.name)?;
        read_lock(store, &held.name, self.clock.now())
    }
}

fn check_held(record: &LockRecord, origin: &Origin, held: &HeldLock) -> Result<LockerId> {
    if record.is_empty() {
        debug!(lock = %held.name, "object not locked");
        return Err(LockError::Busy(Conflict::NotHeld));
    }

    if record.lock_type != held.kind {
        debug!(
            lock = %held.name,
            current = %record.lock_type,
            asserted = %held.kind,
            "lock type mismatch"
        );
        return Err(LockError::Busy(Conflict::KindMismatch));
    }

    if record.tag != held.tag {
        debug!(lock = %held.name, current = %record.tag, asserted = %held.tag, "lock tag mismatch");
        return Err(LockError::Busy(Conflict::TagMismatch));
    }

    let id = LockerId::new(origin.name.as_str(), held.cookie.as_str());
    if !record.lockers.contains_key(&id) {
        debug!(lock = %held.name, locker = %id, "not locked by caller");
        return Err(LockError::Busy(Conflict::NotHeld));
    }

    Ok(id)
}
