//! Reading and writing lock records as object attributes.
//!
//! Each lock lives in its own attribute named `lock.<name>`. Reading a record
//! always sweeps expired lockers first, and an ephemeral record left with no
//! locker is deleted from the store on the spot.

use super::types::LockRecord;
use crate::error::{LockError, Result};
use crate::store::{ObjectStore, StoreError};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, trace};

/// Attribute name prefix reserved for lock records.
pub const LOCK_PREFIX: &str = "lock.";

/// Stored bytes are not a valid lock record.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct DecodeError(#[from] serde_json::Error);

/// Attribute key for a lock name.
pub fn lock_key(name: &str) -> String {
    format!("{}{}", LOCK_PREFIX, name)
}

/// Lock name for an attribute key, if the key belongs to a lock.
pub fn lock_name(key: &str) -> Option<&str> {
    key.strip_prefix(LOCK_PREFIX)
}

pub fn encode(record: &LockRecord) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(record)
}

pub fn decode(bytes: &[u8]) -> std::result::Result<LockRecord, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read a lock record with expired lockers removed.
///
/// A missing attribute yields the empty record. Any other store failure, and
/// bytes that do not decode, are errors. If the sweep leaves an ephemeral
/// record empty, its attribute is removed and the empty record is returned;
/// failing to remove it is logged and otherwise ignored.
pub fn read_lock<S: ObjectStore + ?Sized>(
    store: &mut S,
    name: &str,
    now: DateTime<Utc>,
) -> Result<LockRecord> {
    let key = lock_key(name);

    let bytes = match store.get_attr(&key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Ok(LockRecord::default()),
        Err(e) => {
            error!(object = store.object_id(), key = %key, error = %e, "error reading lock attribute");
            return Err(e.into());
        }
    };

    let mut record = decode(&bytes).map_err(|source| {
        error!(object = store.object_id(), key = %key, error = %source, "error decoding lock record");
        LockError::Corrupt {
            key: key.clone(),
            source,
        }
    })?;

    let expired = record.sweep_expired(now);
    if expired > 0 {
        trace!(object = store.object_id(), key = %key, expired, "expired lockers");
    }

    if record.is_empty() && record.lock_type.is_ephemeral() {
        if let Err(e) = store.remove_attr(&key) {
            error!(
                object = store.object_id(),
                key = %key,
                error = %e,
                "error cleaning up empty ephemeral lock on read"
            );
        }
        return Ok(LockRecord::default());
    }

    Ok(record)
}

/// Persist a lock record.
pub fn write_lock<S: ObjectStore + ?Sized>(store: &mut S, name: &str, record: &LockRecord) -> Result<()> {
    let key = lock_key(name);
    let bytes = encode(record).map_err(|e| {
        StoreError::Backend(format!("failed to encode lock record '{}': {}", key, e))
    })?;
    store.set_attr(&key, &bytes)?;
    Ok(())
}

/// Delete a lock record outright.
pub fn remove_lock<S: ObjectStore + ?Sized>(store: &mut S, name: &str) -> Result<()> {
    store.remove_attr(&lock_key(name))?;
    Ok(())
}
