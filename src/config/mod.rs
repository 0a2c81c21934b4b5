//! Configuration for the `objlock` command line host.
//!
//! The config lives in a YAML file passed with `--config`. Parsing is
//! forward-compatible (unknown fields are ignored) and every field has a
//! default, so an empty file is a valid config. Command line flags override
//! whatever the file says.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
