//! Directory-backed attribute store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/.guards/<object>         per-request guard (see `guard`)
//! <root>/<object>/attr.<name>     one file per attribute
//! ```
//!
//! Object ids and attribute names are escaped so that any string maps to a
//! single safe path component. An escaped id never starts with `.`, so it
//! cannot collide with the guard directory. Object directories exist only
//! while the object has attributes.

use super::guard::ObjectGuard;
use super::{ObjectStore, StoreError};
use crate::fs::atomic_write;
use chrono::Duration;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const GUARD_DIR: &str = ".guards";
const ATTR_FILE_PREFIX: &str = "attr.";

/// Age after which a guard is treated as abandoned, unless configured.
const DEFAULT_GUARD_STALE_SECS: i64 = 30;

/// Attribute store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    guard_timeout: Duration,
    guard_stale: Duration,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, guard_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            guard_timeout,
            guard_stale: Duration::seconds(DEFAULT_GUARD_STALE_SECS),
        }
    }

    /// Set the age after which a guard left by a dead process is taken over.
    pub fn with_guard_stale(mut self, stale: Duration) -> Self {
        self.guard_stale = stale;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open one object for a request, waiting for any other request on it.
    pub fn open(&self, object_id: &str) -> Result<FileObject, StoreError> {
        if object_id.is_empty() {
            return Err(StoreError::Backend("object id must not be empty".to_string()));
        }

        let escaped = escape_component(object_id);
        let guard_dir = self.root.join(GUARD_DIR);
        fs::create_dir_all(&guard_dir)
            .map_err(|e| StoreError::io("failed to create guard directory", &guard_dir, e))?;

        let guard = ObjectGuard::acquire(
            object_id,
            &guard_dir.join(&escaped),
            self.guard_timeout,
            self.guard_stale,
        )?;
        let dir = self.root.join(escaped);

        Ok(FileObject {
            object_id: object_id.to_string(),
            dir,
            _guard: guard,
        })
    }
}

/// A request-scoped view of one object in a [`FileStore`].
///
/// The object's guard is held until this value is dropped.
#[derive(Debug)]
pub struct FileObject {
    object_id: String,
    dir: PathBuf,
    _guard: ObjectGuard,
}

impl FileObject {
    fn attr_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", ATTR_FILE_PREFIX, escape_component(key)))
    }
}

impl ObjectStore for FileObject {
    fn object_id(&self) -> &str {
        &self.object_id
    }

    fn get_attr(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.attr_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("failed to read attribute", path, e)),
        }
    }

    fn set_attr(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.attr_path(key);
        atomic_write(&path, value).map_err(|e| StoreError::io("failed to write attribute", path, e))
    }

    fn remove_attr(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.attr_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io("failed to remove attribute", path, e)),
        }

        // Fails while other attributes remain.
        let _ = fs::remove_dir(&self.dir);
        Ok(())
    }

    fn list_attrs(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("failed to list attributes", &self.dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| StoreError::io("failed to list attributes", &self.dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            // Skips the guard and any in-flight temporary files.
            if let Some(escaped) = file_name.strip_prefix(ATTR_FILE_PREFIX)
                && let Some(name) = unescape_component(escaped)
            {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Escape a string into one path component.
///
/// ASCII alphanumerics, `-`, `_` and `.` pass through (except a leading `.`);
/// every other byte becomes `%XX`.
fn escape_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || (byte == b'.' && i > 0);
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape_component(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> FileStore {
        FileStore::new(temp_dir.path(), Duration::milliseconds(100))
    }

    #[test]
    fn test_escape_round_trips_awkward_names() {
        for raw in ["lock.foo", "a/b", "..", ".hidden", "spaces and %", "ünïcode"] {
            let escaped = escape_component(raw);
            assert!(!escaped.contains('/'));
            assert!(!escaped.starts_with('.'));
            assert_eq!(unescape_component(&escaped).as_deref(), Some(raw));
        }
    }

    #[test]
    fn test_unescape_rejects_truncated_escape() {
        assert_eq!(unescape_component("abc%4"), None);
        assert_eq!(unescape_component("abc%zz"), None);
    }

    #[test]
    fn test_attributes_persist_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        {
            let mut obj = store.open("rbd_header.abc").unwrap();
            obj.set_attr("lock.foo", b"one").unwrap();
            obj.set_attr("lock.bar/baz", b"two").unwrap();
        }

        let mut obj = store.open("rbd_header.abc").unwrap();
        assert_eq!(obj.get_attr("lock.foo").unwrap().unwrap(), b"one");
        assert_eq!(obj.list_attrs().unwrap(), vec!["lock.bar/baz", "lock.foo"]);

        obj.remove_attr("lock.foo").unwrap();
        obj.remove_attr("lock.foo").unwrap();
        assert!(obj.get_attr("lock.foo").unwrap().is_none());
        assert_eq!(obj.list_attrs().unwrap(), vec!["lock.bar/baz"]);
    }

    #[test]
    fn test_open_serializes_requests_on_one_object() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let held = store.open("obj").unwrap();
        assert!(matches!(store.open("obj"), Err(StoreError::Busy { .. })));
        assert!(store.open("other").is_ok());

        drop(held);
        assert!(store.open("obj").is_ok());
    }

    #[test]
    fn test_empty_object_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(store(&temp_dir).open("").is_err());
    }

    #[test]
    fn test_read_only_requests_leave_no_object_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        {
            let obj = store.open("typo").unwrap();
            assert!(obj.get_attr("lock.foo").unwrap().is_none());
            assert!(obj.list_attrs().unwrap().is_empty());
        }

        assert!(!temp_dir.path().join("typo").exists());
    }

    #[test]
    fn test_object_directory_removed_with_last_attribute() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let mut obj = store.open("obj").unwrap();

        obj.set_attr("a", b"1").unwrap();
        obj.set_attr("b", b"2").unwrap();
        obj.remove_attr("a").unwrap();
        assert!(temp_dir.path().join("obj").is_dir());

        obj.remove_attr("b").unwrap();
        assert!(!temp_dir.path().join("obj").exists());

        obj.set_attr("c", b"3").unwrap();
        assert_eq!(obj.list_attrs().unwrap(), vec!["c"]);
    }

    #[test]
    fn test_guard_left_by_dead_process_is_taken_over() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).with_guard_stale(Duration::seconds(60));
        let guard_dir = temp_dir.path().join(GUARD_DIR);
        fs::create_dir_all(&guard_dir).unwrap();
        fs::write(
            guard_dir.join("obj"),
            r#"{"owner":"gone@elsewhere","pid":999999,"created_at":"2000-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        for _ in 0..3 {
            let mut obj = store.open("obj").unwrap();
            obj.set_attr("lock.foo", b"x").unwrap();
        }
    }
}
