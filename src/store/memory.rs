//! In-memory attribute store.

use super::{ObjectStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Attrs = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Attrs>,
    fail_reads: bool,
    fail_writes: bool,
    fail_removes: bool,
}

/// Process-local attribute store.
///
/// Cloning shares the underlying state. An [`MemoryObject`] holds the store
/// mutex for as long as it lives, so requests are serialized across all
/// objects, which is stricter than the per-object guarantee the lock manager
/// needs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open one object for a request.
    pub fn object(&self, object_id: &str) -> MemoryObject<'_> {
        MemoryObject {
            object_id: object_id.to_string(),
            inner: self.lock(),
        }
    }

    /// Make every attribute read fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every attribute write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make every attribute removal fail until reset.
    pub fn set_fail_removes(&self, fail: bool) {
        self.lock().fail_removes = fail;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// A request-scoped view of one object in a [`MemoryStore`].
pub struct MemoryObject<'a> {
    object_id: String,
    inner: MutexGuard<'a, Inner>,
}

impl ObjectStore for MemoryObject<'_> {
    fn object_id(&self) -> &str {
        &self.object_id
    }

    fn get_attr(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.inner.fail_reads {
            return Err(StoreError::Backend(format!("injected read failure on '{}'", key)));
        }
        Ok(self
            .inner
            .objects
            .get(&self.object_id)
            .and_then(|attrs| attrs.get(key))
            .cloned())
    }

    fn set_attr(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if self.inner.fail_writes {
            return Err(StoreError::Backend(format!("injected write failure on '{}'", key)));
        }
        let object_id = self.object_id.clone();
        self.inner
            .objects
            .entry(object_id)
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove_attr(&mut self, key: &str) -> Result<(), StoreError> {
        if self.inner.fail_removes {
            return Err(StoreError::Backend(format!("injected remove failure on '{}'", key)));
        }
        if let Some(attrs) = self.inner.objects.get_mut(&self.object_id) {
            attrs.remove(key);
        }
        Ok(())
    }

    fn list_attrs(&self) -> Result<Vec<String>, StoreError> {
        if self.inner.fail_reads {
            return Err(StoreError::Backend("injected read failure on listing".to_string()));
        }
        Ok(self
            .inner
            .objects
            .get(&self.object_id)
            .map(|attrs| attrs.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_is_none() {
        let store = MemoryStore::new();
        let obj = store.object("rbd_header.1");
        assert!(obj.get_attr("lock.foo").unwrap().is_none());
        assert!(obj.list_attrs().unwrap().is_empty());
    }

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        {
            let mut obj = store.object("a");
            obj.set_attr("lock.foo", b"bytes").unwrap();
            obj.set_attr("other", b"x").unwrap();
        }

        let mut obj = store.object("a");
        assert_eq!(obj.get_attr("lock.foo").unwrap().unwrap(), b"bytes");
        assert_eq!(obj.list_attrs().unwrap(), vec!["lock.foo", "other"]);

        obj.remove_attr("lock.foo").unwrap();
        obj.remove_attr("lock.foo").unwrap();
        assert!(obj.get_attr("lock.foo").unwrap().is_none());
    }

    #[test]
    fn test_objects_are_isolated() {
        let store = MemoryStore::new();
        store.object("a").set_attr("k", b"1").unwrap();
        assert!(store.object("b").get_attr("k").unwrap().is_none());
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new();
        store.set_fail_removes(true);
        assert!(store.object("a").remove_attr("k").is_err());
        store.set_fail_removes(false);
        assert!(store.object("a").remove_attr("k").is_ok());

        store.set_fail_writes(true);
        assert!(store.object("a").set_attr("k", b"v").is_err());
        store.set_fail_writes(false);

        store.set_fail_reads(true);
        assert!(store.object("a").get_attr("k").is_err());
    }
}
