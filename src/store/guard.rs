//! Per-object request guard for the file store.
//!
//! A guard is a file created with **create_new** semantics inside the object
//! directory. Only one process can create it, so holding it gives a request
//! exclusive access to the object's attributes. The guard file carries JSON
//! metadata about its holder so a caller that times out can say who is in
//! the way.
//!
//! Guards are RAII objects: dropping one deletes the file. If deletion fails
//! during drop, a warning is logged and the program carries on.
//!
//! A process that dies while holding a guard leaves the file behind. A guard
//! older than the store's staleness threshold is removed and retaken by the
//! next request. Its age comes from the metadata, or from the file's
//! modification time when the metadata is missing or unreadable.

use super::StoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Interval between attempts to take a busy guard.
const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

/// Metadata stored in a guard file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardInfo {
    /// Holder of the guard (e.g., `user@HOST`).
    #[serde(default)]
    pub owner: String,

    /// Process ID of the holder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// When the guard was taken.
    pub created_at: DateTime<Utc>,
}

impl GuardInfo {
    pub fn new() -> Self {
        Self {
            owner: owner_string(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
        }
    }

    /// Parse guard metadata from a file.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content =
            fs::read_to_string(path).map_err(|e| StoreError::io("failed to read guard", path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            StoreError::Backend(format!(
                "failed to parse guard file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for GuardInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// `user@host` for guard metadata.
pub(crate) fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// RAII guard giving one request exclusive access to an object directory.
#[derive(Debug)]
pub struct ObjectGuard {
    path: PathBuf,
    released: bool,
}

impl ObjectGuard {
    /// Take the guard at `path`, waiting up to `timeout` for a current holder.
    ///
    /// A guard held for longer than `stale_after` is assumed abandoned and is
    /// taken over.
    pub fn acquire(
        object_id: &str,
        path: &Path,
        timeout: Duration,
        stale_after: Duration,
    ) -> Result<Self, StoreError> {
        let deadline = timeout.to_std().ok().map(|t| Instant::now() + t);

        loop {
            match Self::try_acquire(path) {
                Ok(guard) => return Ok(guard),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if clear_if_stale(path, stale_after) {
                        continue;
                    }
                    if deadline.is_none_or(|d| Instant::now() >= d) {
                        return Err(StoreError::Busy {
                            object: object_id.to_string(),
                            holder: describe_holder(path),
                        });
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(StoreError::io("failed to take guard", path, e)),
            }
        }
    }

    fn try_acquire(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let guard = Self {
            path: path.to_path_buf(),
            released: false,
        };

        // Metadata is informational; the file's existence is the guard.
        match serde_json::to_vec(&GuardInfo::new()) {
            Ok(json) => {
                if let Err(e) = file.write_all(&json) {
                    debug!(path = %path.display(), error = %e, "failed to write guard metadata");
                }
            }
            Err(e) => debug!(error = %e, "failed to serialize guard metadata"),
        }

        Ok(guard)
    }

    /// Release the guard, reporting failure instead of logging it.
    pub fn release(mut self) -> Result<(), StoreError> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| StoreError::io("failed to release guard", &self.path, e))
    }
}

impl Drop for ObjectGuard {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(path = %self.path.display(), error = %e, "failed to release object guard");
        }
    }
}

/// Age of the guard at `path`, if it can be determined.
fn guard_age(path: &Path) -> Option<Duration> {
    if let Ok(info) = GuardInfo::from_file(path) {
        return Some(info.age());
    }

    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(Utc::now().signed_duration_since(DateTime::<Utc>::from(modified)))
}

/// Remove the guard at `path` if it is older than `stale_after`. Returns
/// whether the caller should try to take it again.
fn clear_if_stale(path: &Path, stale_after: Duration) -> bool {
    let Some(age) = guard_age(path) else {
        return false;
    };
    if age <= stale_after {
        return false;
    }

    warn!(
        path = %path.display(),
        age_secs = age.num_seconds(),
        "removing stale object guard"
    );
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove stale object guard");
            false
        }
    }
}

fn describe_holder(path: &Path) -> String {
    match GuardInfo::from_file(path) {
        Ok(info) => format!(
            " (held by {} for {}{})",
            info.owner,
            info.age_string(),
            info.pid.map(|p| format!(", pid {}", p)).unwrap_or_default()
        ),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn stale() -> Duration {
        Duration::minutes(10)
    }

    #[test]
    fn test_guard_metadata_creation() {
        let info = GuardInfo::new();
        assert!(info.owner.contains('@'));
        assert!(info.pid.is_some());
        assert!(info.age().num_minutes() < 1);
    }

    #[test]
    fn test_guard_age_string() {
        let mut info = GuardInfo::new();
        assert!(info.age_string().ends_with('s'));

        info.created_at = Utc::now() - Duration::minutes(5);
        assert!(info.age_string().contains('m'));

        info.created_at = Utc::now() - Duration::hours(2);
        assert!(info.age_string().contains('h'));
    }

    #[test]
    fn test_acquire_and_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");

        let guard = ObjectGuard::acquire("obj", &path, Duration::milliseconds(50), stale()).unwrap();
        assert!(path.exists());
        let info = GuardInfo::from_file(&path).unwrap();
        assert_eq!(info.pid, Some(std::process::id()));

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_guard_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");

        let _held = ObjectGuard::acquire("obj", &path, Duration::milliseconds(50), stale()).unwrap();
        let err = ObjectGuard::acquire("obj", &path, Duration::milliseconds(30), stale()).unwrap_err();
        assert!(matches!(err, StoreError::Busy { .. }));
        assert!(err.to_string().contains("held by"));
    }

    #[test]
    fn test_guard_waits_for_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");

        let held = ObjectGuard::acquire("obj", &path, Duration::milliseconds(50), stale()).unwrap();
        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            ObjectGuard::acquire("obj", &waiter_path, Duration::seconds(5), stale()).map(|g| g.release())
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        held.release().unwrap();

        assert!(waiter.join().unwrap().unwrap().is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_age_comes_from_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");

        let mut info = GuardInfo::new();
        info.created_at = Utc::now() - Duration::minutes(11);
        std::fs::write(&path, serde_json::to_vec(&info).unwrap()).unwrap();

        let age = guard_age(&path).unwrap();
        assert!(age > stale());
        assert!(age < Duration::minutes(12));
        assert!(guard_age(&temp_dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_abandoned_guard_is_taken_over() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");
        fs::write(
            &path,
            r#"{"owner":"gone@elsewhere","pid":999999,"created_at":"2000-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        for _ in 0..3 {
            let guard = ObjectGuard::acquire("obj", &path, Duration::milliseconds(30), stale()).unwrap();
            let info = GuardInfo::from_file(&path).unwrap();
            assert_eq!(info.pid, Some(std::process::id()));
            drop(guard);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_abandoned_guard_without_metadata_uses_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");
        let file = fs::File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - std::time::Duration::from_secs(3600))
            .unwrap();
        drop(file);

        let guard = ObjectGuard::acquire("obj", &path, Duration::milliseconds(30), stale()).unwrap();
        assert!(GuardInfo::from_file(&path).is_ok());
        drop(guard);
    }

    #[test]
    fn test_fresh_guard_without_metadata_still_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".guard");
        fs::write(&path, b"").unwrap();

        let err = ObjectGuard::acquire("obj", &path, Duration::milliseconds(30), stale()).unwrap_err();
        assert!(matches!(err, StoreError::Busy { .. }));
        assert!(path.exists());
    }
}
