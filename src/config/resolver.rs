//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment (`SCRUMSYNC_BASE_URL`, `SCRUMSYNC_USER`)
//! 3. Project file (`./scrumsync.kdl`)
//! 4. System file (`~/.config/scrumsync/config.kdl`)
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::schema::{DEFAULT_BASE_URL, DEFAULT_USER, MAX_PER_PAGE, ScrumConfig};
use crate::engine::SyncSettings;
use crate::notifications::DEFAULT_DISMISS_SECONDS;
use crate::remote::DEFAULT_PER_PAGE;
use crate::{Error, Result};

/// Environment variable overriding the remote store URL.
pub const BASE_URL_ENV: &str = "SCRUMSYNC_BASE_URL";

/// Environment variable overriding the activity author.
pub const USER_ENV: &str = "SCRUMSYNC_USER";

/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "SCRUMSYNC_CONFIG_DIR";

/// File name of the project-level config.
pub const PROJECT_CONFIG_FILE: &str = "scrumsync.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project file
    Project,
    /// Value from the system file
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Locations of the config files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    /// System config file
    pub system: Option<PathBuf>,
    /// Project config file
    pub project: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations: the system file under the user config directory
    /// (or `SCRUMSYNC_CONFIG_DIR`), and `scrumsync.kdl` in `project_dir`.
    pub fn discover(project_dir: &Path) -> Self {
        Self {
            system: Self::system_config_path(),
            project: Some(project_dir.join(PROJECT_CONFIG_FILE)),
        }
    }

    /// Get the system config path (~/.config/scrumsync/config.kdl).
    pub fn system_config_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join("config.kdl")),
            _ => dirs::config_dir().map(|d| d.join("scrumsync").join("config.kdl")),
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub per_page: Option<u32>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub base_url: Resolved<String>,
    pub per_page: Resolved<u32>,
    pub user: Resolved<String>,
    pub toast_seconds: Resolved<u64>,
    pub timeout_seconds: Option<Resolved<u64>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: Resolved::new(DEFAULT_BASE_URL.to_string(), ValueSource::Default),
            per_page: Resolved::new(DEFAULT_PER_PAGE, ValueSource::Default),
            user: Resolved::new(DEFAULT_USER.to_string(), ValueSource::Default),
            toast_seconds: Resolved::new(DEFAULT_DISMISS_SECONDS, ValueSource::Default),
            timeout_seconds: None,
        }
    }
}

impl ResolvedConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url.value
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.value
    }

    pub fn user(&self) -> &str {
        &self.user.value
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .as_ref()
            .map(|r| Duration::from_secs(r.value))
    }

    /// The engine-facing subset.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            user: self.user.value.clone(),
            toast_duration: match self.toast_seconds.value {
                0 => None,
                s => Some(Duration::from_secs(s)),
            },
        }
    }
}

/// Pick the highest-precedence file value.
fn layered<T: Clone>(project: &Option<T>, system: &Option<T>) -> Option<Resolved<T>> {
    if let Some(v) = project {
        Some(Resolved::new(v.clone(), ValueSource::Project))
    } else {
        system
            .as_ref()
            .map(|v| Resolved::new(v.clone(), ValueSource::System))
    }
}

fn env_value(name: &str) -> Option<Resolved<String>> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| Resolved::new(v, ValueSource::EnvVar(name.to_string())))
}

/// Resolve configuration with the full precedence chain.
pub fn resolve_config(paths: &ConfigPaths, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let mut result = ResolvedConfig::default();

    let system = match paths.system {
        Some(ref path) => ScrumConfig::load(path)?,
        None => ScrumConfig::new(),
    };
    let project = match paths.project {
        Some(ref path) => ScrumConfig::load(path)?,
        None => ScrumConfig::new(),
    };

    // Resolve base_url
    if let Some(ref url) = overrides.base_url {
        result.base_url = Resolved::new(url.clone(), ValueSource::CliFlag);
    } else if let Some(env) = env_value(BASE_URL_ENV) {
        result.base_url = env;
    } else if let Some(file) = layered(&project.base_url, &system.base_url) {
        result.base_url = file;
    }

    // Resolve user
    if let Some(ref user) = overrides.user {
        result.user = Resolved::new(user.clone(), ValueSource::CliFlag);
    } else if let Some(env) = env_value(USER_ENV) {
        result.user = env;
    } else if let Some(file) = layered(&project.user, &system.user) {
        result.user = file;
    }

    // Resolve per_page
    if let Some(per_page) = overrides.per_page {
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(Error::Config(format!(
                "per-page must be 1-{}, got {}",
                MAX_PER_PAGE, per_page
            )));
        }
        result.per_page = Resolved::new(per_page, ValueSource::CliFlag);
    } else if let Some(file) = layered(&project.per_page, &system.per_page) {
        result.per_page = file;
    }

    if let Some(file) = layered(&project.toast_seconds, &system.toast_seconds) {
        result.toast_seconds = file;
    }
    result.timeout_seconds = layered(&project.timeout_seconds, &system.timeout_seconds);

    let url = result.base_url();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "base-url must start with http:// or https://, got {} ({})",
            url, result.base_url.source
        )));
    }

    Ok(result)
}
