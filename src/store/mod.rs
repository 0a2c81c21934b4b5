//! Attribute store capability.
//!
//! The lock manager never owns persistence. It is handed an [`ObjectStore`],
//! a view of one object's named byte-blob attributes, for the duration of a
//! single request. Whoever hands out that view is responsible for making sure
//! no other request touches the same object while it is alive.
//!
//! Two back-ends ship with the crate:
//! - [`MemoryStore`]: process-local, used by tests and embedders
//! - [`FileStore`]: directory-per-object on local disk, used by the CLI

mod file;
mod guard;
mod memory;

pub use file::{FileObject, FileStore};
pub(crate) use guard::owner_string;
pub use memory::{MemoryObject, MemoryStore};

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an attribute store back-end.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("{op} '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another request holds the object.
    #[error("object '{object}' is busy{holder}")]
    Busy { object: String, holder: String },

    /// Back-end specific failure.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// One object's attributes, with exclusive access for the current request.
pub trait ObjectStore {
    /// Identifier of the object this view is scoped to.
    fn object_id(&self) -> &str;

    /// Read an attribute. A missing attribute is `Ok(None)`, not an error.
    fn get_attr(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Create or replace an attribute.
    fn set_attr(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove an attribute. Removing a missing attribute succeeds.
    fn remove_attr(&mut self, key: &str) -> Result<(), StoreError>;

    /// Names of every attribute on the object, in ascending order.
    fn list_attrs(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &mut S {
    fn object_id(&self) -> &str {
        (**self).object_id()
    }

    fn get_attr(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get_attr(key)
    }

    fn set_attr(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set_attr(key, value)
    }

    fn remove_attr(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove_attr(key)
    }

    fn list_attrs(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_attrs()
    }
}
