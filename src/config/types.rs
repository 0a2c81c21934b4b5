//! Default values for config fields.

use crate::store::owner_string;

// Default value functions for serde
pub(crate) fn default_store_dir() -> String {
    ".objlock".to_string()
}
pub(crate) fn default_duration_secs() -> u64 {
    0
}
pub(crate) fn default_guard_timeout_ms() -> u64 {
    5000
}
pub(crate) fn default_guard_stale_secs() -> u64 {
    30
}
pub(crate) fn default_log_level() -> String {
    "warn".to_string()
}

/// `client.<user>@<host>`
pub fn default_identity() -> String {
    format!("client.{}", owner_string())
}

/// `<host>:0/<pid>`, the shape of a messenger address without a port.
pub fn default_address() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string());

    format!("{}:0/{}", host, std::process::id())
}
