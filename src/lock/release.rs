//! Releasing locks, by their holder or by an administrator.

use super::codec::{read_lock, remove_lock, write_lock};
use super::manager::LockManager;
use super::types::{LockerId, Origin};
use crate::clock::Clock;
use crate::error::{LockError, Result};
use crate::store::ObjectStore;
use tracing::debug;

impl<C: Clock> LockManager<C> {
    /// Release a lock held by the caller under `cookie`.
    ///
    /// # Errors
    ///
    /// * `LockError::NotFound` - the caller holds no such lock (wrong name,
    ///   cookie, or the hold already expired)
    /// * `LockError::Store` / `LockError::Corrupt` - store failure
    pub fn unlock<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        origin: &Origin,
        name: &str,
        cookie: &str,
    ) -> Result<()> {
        debug!(object = store.object_id(), lock = name, locker = %origin.name, "unlock requested");
        self.remove_locker(store, name, LockerId::new(origin.name.as_str(), cookie))
    }

    /// Break someone else's lock.
    ///
    /// Identical to [`LockManager::unlock`] except the holder is named
    /// explicitly instead of taken from the request origin.
    pub fn break_lock<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        name: &str,
        locker: &str,
        cookie: &str,
    ) -> Result<()> {
        debug!(object = store.object_id(), lock = name, locker, "break_lock requested");
        self.remove_locker(store, name, LockerId::new(locker, cookie))
    }

    fn remove_locker<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        name: &str,
        id: LockerId,
    ) -> Result<()> {
        let mut record = read_lock(store, name, self.clock.now())?;

        if record.lockers.remove(&id).is_none() {
            return Err(LockError::NotFound(format!(
                "lock '{}' is not held by {}",
                name, id
            )));
        }

        if record.lock_type.is_ephemeral() {
            debug_assert!(record.is_empty(), "ephemeral lock had more than one locker");
            remove_lock(store, name)
        } else {
            write_lock(store, name, &record)
        }
    }
}
