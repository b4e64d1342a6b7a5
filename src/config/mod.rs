//! Configuration for scrumsync.
//!
//! Settings live in KDL files:
//! - System: `~/.config/scrumsync/config.kdl` (or `$SCRUMSYNC_CONFIG_DIR/config.kdl`)
//! - Project: `./scrumsync.kdl`
//!
//! Keys:
//! - `base-url` - Remote store address
//! - `per-page` - Page size when listing collections
//! - `user` - Author recorded on activity entries
//! - `toast-seconds` - Notification auto-dismiss delay
//! - `timeout-seconds` - HTTP request timeout
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    BASE_URL_ENV, CONFIG_DIR_ENV, ConfigOverrides, ConfigPaths, PROJECT_CONFIG_FILE, Resolved,
    ResolvedConfig, USER_ENV, ValueSource, resolve_config,
};
pub use schema::{DEFAULT_BASE_URL, ScrumConfig};
