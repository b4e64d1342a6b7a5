//! KDL schema for scrumsync.kdl / config.kdl.
//!
//! This module provides:
//! - The Rust struct representing the KDL schema
//! - Serialization/deserialization to/from KDL format
//! - Validation
//! - Default values

use std::path::Path;

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default remote store address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:4125";

/// Default author recorded on activity entries.
pub const DEFAULT_USER: &str = "You";

/// Largest page size accepted for `per-page`.
pub const MAX_PER_PAGE: u32 = 10_000;

/// Settings stored in a config file. Every key is optional; unset keys fall
/// through to the next layer.
///
/// # KDL Schema
///
/// ```kdl
/// base-url "http://localhost:4125"
/// per-page 1000
/// user "Alice"
/// toast-seconds 5
/// timeout-seconds 30
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrumConfig {
    /// Remote store base URL
    pub base_url: Option<String>,

    /// Page size requested when listing collections (1-10000)
    pub per_page: Option<u32>,

    /// Author name written into activity entries
    pub user: Option<String>,

    /// Notification auto-dismiss delay; 0 disables auto-dismiss
    pub toast_seconds: Option<u64>,

    /// HTTP request timeout
    pub timeout_seconds: Option<u64>,
}

fn string_value(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)?
        .entries()
        .first()?
        .value()
        .as_string()
        .map(str::to_string)
}

fn integer_value(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)?.entries().first()?.value().as_integer()
}

fn push_string(doc: &mut KdlDocument, name: &str, value: &str) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    doc.nodes_mut().push(node);
}

fn push_integer(doc: &mut KdlDocument, name: &str, value: i128) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::Integer(value)));
    doc.nodes_mut().push(node);
}

impl ScrumConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ref url) = self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!(
                    "base-url must start with http:// or https://, got {}",
                    url
                ));
            }
        }
        if let Some(per_page) = self.per_page {
            if !(1..=MAX_PER_PAGE).contains(&per_page) {
                return Err(format!("per-page must be 1-{}, got {}", MAX_PER_PAGE, per_page));
            }
        }
        if let Some(ref user) = self.user {
            if user.trim().is_empty() {
                return Err("user cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Values of the wrong type or out of
    /// range are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        config.base_url = string_value(doc, "base-url");
        config.user = string_value(doc, "user");

        if let Some(i) = integer_value(doc, "per-page") {
            if (1..=MAX_PER_PAGE as i128).contains(&i) {
                config.per_page = Some(i as u32);
            }
        }

        config.toast_seconds = integer_value(doc, "toast-seconds")
            .and_then(|i| u64::try_from(i).ok());
        config.timeout_seconds = integer_value(doc, "timeout-seconds")
            .and_then(|i| u64::try_from(i).ok())
            .filter(|&s| s > 0);

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref url) = self.base_url {
            push_string(&mut doc, "base-url", url);
        }
        if let Some(per_page) = self.per_page {
            push_integer(&mut doc, "per-page", per_page as i128);
        }
        if let Some(ref user) = self.user {
            push_string(&mut doc, "user", user);
        }
        if let Some(seconds) = self.toast_seconds {
            push_integer(&mut doc, "toast-seconds", seconds as i128);
        }
        if let Some(seconds) = self.timeout_seconds {
            push_integer(&mut doc, "timeout-seconds", seconds as i128);
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &ScrumConfig) {
        if other.base_url.is_some() {
            self.base_url = other.base_url.clone();
        }
        if other.per_page.is_some() {
            self.per_page = other.per_page;
        }
        if other.user.is_some() {
            self.user = other.user.clone();
        }
        if other.toast_seconds.is_some() {
            self.toast_seconds = other.toast_seconds;
        }
        if other.timeout_seconds.is_some() {
            self.timeout_seconds = other.timeout_seconds;
        }
    }

    /// Read and validate a config file. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write the config as KDL, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_kdl().to_string())?;
        Ok(())
    }
}
