//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Settings for the command line host.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Store settings
    // =========================================================================
    /// Root directory of the file-backed attribute store.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Milliseconds to wait for another request on the same object.
    #[serde(default = "default_guard_timeout_ms")]
    pub guard_timeout_ms: u64,

    /// Seconds after which a guard left by a dead process is taken over.
    #[serde(default = "default_guard_stale_secs")]
    pub guard_stale_secs: u64,

    // =========================================================================
    // Requester settings
    // =========================================================================
    /// Identity recorded as the locker (default: `client.<user>@<host>`).
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Address recorded alongside each lock (default: `<host>:0/<pid>`).
    #[serde(default = "default_address")]
    pub address: String,

    /// Lock duration in seconds when none is given. Zero never expires.
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: u64,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            guard_timeout_ms: default_guard_timeout_ms(),
            guard_stale_secs: default_guard_stale_secs(),
            identity: default_identity(),
            address: default_address(),
            default_duration_secs: default_duration_secs(),
            log_level: default_log_level(),
        }
    }
}
