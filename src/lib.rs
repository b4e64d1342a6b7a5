//! Scrumsync - optimistic client-side synchronization for a project tracker.
//!
//! This library keeps an in-memory cache of tasks, issues, sprints and epics
//! consistent with a remote CRUD store. Every change is applied locally first,
//! then confirmed or rolled back when the remote store answers. It backs the
//! `scrum` CLI and can be embedded behind any presentation layer.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod models;
pub mod notifications;
pub mod remote;
pub mod seed;

use engine::{BulkFailure, Operation};
use models::EntityKind;
use remote::RemoteError;

/// Library-level error type for scrumsync operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A single-entity mutation failed and was rolled back
    #[error("Failed to {operation} {id}: {source}")]
    Mutation {
        operation: Operation,
        id: String,
        source: RemoteError,
    },

    /// Some items of a bulk operation failed; successful items stay applied
    #[error("{operation}: {failed} of {attempted} failed", failed = .failures.len())]
    Bulk {
        operation: Operation,
        attempted: usize,
        failures: Vec<BulkFailure>,
    },

    #[error("{kind} {id} is not loaded")]
    NotCached { kind: EntityKind, id: String },

    #[error("Unknown sprint: {0}")]
    UnknownSprint(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// The operation that failed, for mutation and bulk failures.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Mutation { operation, .. } | Error::Bulk { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// The underlying remote store error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Remote(err) | Error::Mutation { source: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Stable error category for machine-readable output.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Config(_) => "config",
            Error::Remote(err) | Error::Mutation { source: err, .. } => err.category(),
            Error::Bulk { .. } => "partial_failure",
            Error::NotCached { .. } => "not_cached",
            Error::UnknownSprint(_) => "unknown_sprint",
            Error::InvalidInput(_) => "invalid_input",
        }
    }
}

/// Result type alias for scrumsync operations.
pub type Result<T> = std::result::Result<T, Error>;
