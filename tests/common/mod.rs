//! Common test utilities for scrumsync integration tests.
//!
//! Provides engine fixtures over an in-process `MemoryTransport`, and
//! `TestEnv` for CLI runs that must not read the user's real config.

#![allow(dead_code)]

use std::sync::Arc;

use assert_cmd::Command;
use serde_json::{Value, json};
pub use tempfile::TempDir;

use scrumsync::engine::{SyncEngine, SyncSettings};
use scrumsync::remote::{MemoryTransport, RemoteError, RemoteStore};

/// An engine plus a handle on the transport behind it.
pub struct Fixture {
    pub engine: SyncEngine,
    pub transport: Arc<MemoryTransport>,
}

impl Fixture {
    /// Engine over an empty store, with notifications that never expire.
    pub fn new() -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let settings = SyncSettings {
            user: "Tester".to_string(),
            toast_duration: None,
        };
        let engine = SyncEngine::new(RemoteStore::new(transport.clone()), settings);
        Self { engine, transport }
    }

    /// Store a raw record and return its ID.
    pub fn insert(&self, collection: &str, body: Value) -> String {
        self.transport.insert(collection, body)
    }

    pub fn sprint(&self, name: &str, status: &str) -> String {
        self.insert("sprints", json!({ "name": name, "status": status }))
    }

    pub fn task(&self, title: &str, status: &str, sprint_id: Option<&str>) -> String {
        self.insert(
            "tasks",
            json!({
                "title": title,
                "type": "task",
                "status": status,
                "priority": "normal",
                "pts": 3,
                "sprint_id": sprint_id,
            }),
        )
    }

    pub fn issue(&self, title: &str, status: &str) -> String {
        self.insert(
            "issues",
            json!({ "title": title, "type": "bug", "status": status, "priority": "high" }),
        )
    }

    pub fn epic(&self, name: &str, progress: u8, linked: &[&str]) -> String {
        self.insert(
            "epics",
            json!({
                "name": name,
                "color": "#6366f1",
                "progress": progress,
                "linked_stories": serde_json::to_string(linked).unwrap(),
            }),
        )
    }

    /// Load every collection into the engine's cache.
    pub async fn load(&self) {
        self.engine.load_all().await.unwrap();
    }

    /// Raw stored record, as the server holds it.
    pub fn record(&self, collection: &str, id: &str) -> Value {
        self.transport
            .record(collection, id)
            .unwrap_or_else(|| panic!("{}/{} not stored", collection, id))
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

pub fn unavailable() -> RemoteError {
    RemoteError::Unavailable("connection refused".to_string())
}

/// A test environment with an isolated config directory.
///
/// The `scrum()` method returns a `Command` that runs in `project_dir` with
/// `SCRUMSYNC_CONFIG_DIR` pointing at `config_dir`, and with the
/// environment overrides cleared, making tests parallel-safe.
pub struct TestEnv {
    pub project_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            project_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the scrum binary with isolated configuration.
    pub fn scrum(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_scrum"));
        cmd.current_dir(self.project_dir.path());
        cmd.env("SCRUMSYNC_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("SCRUMSYNC_BASE_URL");
        cmd.env_remove("SCRUMSYNC_USER");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write `./scrumsync.kdl` in the project directory.
    pub fn write_project_config(&self, content: &str) {
        std::fs::write(self.project_dir.path().join("scrumsync.kdl"), content).unwrap();
    }

    /// Write the system `config.kdl`.
    pub fn write_system_config(&self, content: &str) {
        std::fs::write(self.config_dir.path().join("config.kdl"), content).unwrap();
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
