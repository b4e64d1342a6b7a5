//! Command implementations for the `scrum` CLI.
//!
//! Each command drives the [`SyncEngine`] and returns a result type that can
//! be printed as JSON (the default) or as human-readable text. Commands that
//! mutate state load the remote collections first so the optimistic protocol
//! has a populated cache to work against.

use serde::Serialize;

use crate::Result;
use crate::config::ResolvedConfig;
use crate::engine::{LoadSummary, SyncEngine};
use crate::models::progress::SprintProgress;
use crate::models::{Epic, Issue, NewIssue, NewTask, Sprint, Task, TaskStatus};
use crate::notifications::Notification;
use crate::seed;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to a JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
}

fn render_notifications(out: &mut Vec<String>, notifications: &[Notification]) {
    for n in notifications {
        out.push(format!("{} {}", n.severity.icon(), n.message));
    }
}

// === load ===

#[derive(Serialize)]
pub struct LoadResult {
    #[serde(flatten)]
    pub summary: LoadSummary,
    pub active_sprint: Option<Sprint>,
    pub progress: Option<SprintProgress>,
}

impl Output for LoadResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Loaded {} tasks, {} issues, {} sprints, {} epics",
            self.summary.tasks, self.summary.issues, self.summary.sprints, self.summary.epics
        )];
        match (&self.active_sprint, &self.progress) {
            (Some(sprint), Some(progress)) => lines.push(format!(
                "Active: {} ({}/{} points, {:.0}%)",
                sprint.name,
                progress.done_points,
                progress.total_points,
                progress.percentage()
            )),
            _ => lines.push("No active sprint".to_string()),
        }
        lines.join("\n")
    }
}

/// Load every collection and report counts plus the active sprint.
pub async fn load(engine: &SyncEngine) -> Result<LoadResult> {
    let summary = engine.load_all().await?;
    let active_sprint = engine.active_sprint();
    let progress = active_sprint
        .as_ref()
        .map(|sprint| engine.sprint_progress(&sprint.id));
    Ok(LoadResult {
        summary,
        active_sprint,
        progress,
    })
}

// === seed ===

#[derive(Serialize)]
pub struct SeedResult {
    pub seeded: bool,
}

impl Output for SeedResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.seeded {
            "Seeded the remote store with demo data".to_string()
        } else {
            "Remote store already has sprints; nothing seeded".to_string()
        }
    }
}

pub async fn seed(engine: &SyncEngine) -> Result<SeedResult> {
    let seeded = seed::init_database(engine.remote()).await?;
    Ok(SeedResult { seeded })
}

// === single-entity results ===

/// An entity returned by a mutation, plus any notifications it raised.
#[derive(Serialize)]
pub struct EntityResult<E> {
    #[serde(flatten)]
    pub entity: E,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

impl<E> EntityResult<E> {
    fn new(engine: &SyncEngine, entity: E) -> Self {
        Self {
            entity,
            notifications: engine.notifications(),
        }
    }
}

/// One-line human summary of an entity.
pub trait Summary {
    fn summary(&self) -> String;
}

impl Summary for Task {
    fn summary(&self) -> String {
        let sprint = self.sprint_id.as_deref().unwrap_or("backlog");
        format!(
            "Task {} \"{}\" [{}] ({})",
            self.id,
            self.title,
            self.status.label(),
            sprint
        )
    }
}

impl Summary for Issue {
    fn summary(&self) -> String {
        format!(
            "Issue {} \"{}\" [{}] {} activity entries",
            self.id,
            self.title,
            self.status.as_str(),
            self.activity.len()
        )
    }
}

impl Summary for Sprint {
    fn summary(&self) -> String {
        let dates = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!(" {} to {}", start, end),
            _ => String::new(),
        };
        format!(
            "Sprint {} \"{}\" [{}]{}",
            self.id,
            self.name,
            self.status.as_str(),
            dates
        )
    }
}

impl Summary for Epic {
    fn summary(&self) -> String {
        format!(
            "Epic {} \"{}\" {} {}% ({} linked tasks)",
            self.id,
            self.name,
            self.color,
            self.progress_pct,
            self.linked_task_ids.len()
        )
    }
}

impl<E: Serialize + Summary> Output for EntityResult<E> {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![self.entity.summary()];
        render_notifications(&mut lines, &self.notifications);
        lines.join("\n")
    }
}

// === tasks ===

pub async fn task_create(engine: &SyncEngine, draft: NewTask) -> Result<EntityResult<Task>> {
    engine.load_all().await?;
    let task = engine.create_task(draft).await?;
    Ok(EntityResult::new(engine, task))
}

pub async fn task_move(
    engine: &SyncEngine,
    id: &str,
    status: TaskStatus,
) -> Result<EntityResult<Task>> {
    engine.load_all().await?;
    let task = engine.move_task(id, status).await?;
    Ok(EntityResult::new(engine, task))
}

pub async fn task_sprint(
    engine: &SyncEngine,
    id: &str,
    sprint_id: Option<&str>,
) -> Result<EntityResult<Task>> {
    engine.load_all().await?;
    let task = engine.move_task_to_sprint(id, sprint_id).await?;
    Ok(EntityResult::new(engine, task))
}

// === sprints ===

pub async fn sprint_create(engine: &SyncEngine) -> Result<EntityResult<Sprint>> {
    engine.load_all().await?;
    let sprint = engine.create_sprint().await?;
    Ok(EntityResult::new(engine, sprint))
}

#[derive(Serialize)]
pub struct SprintCompleted {
    pub sprint_id: String,
    pub archived: Vec<String>,
}

impl Output for SprintCompleted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.archived.is_empty() {
            format!("Completed sprint {}; no tasks left to archive", self.sprint_id)
        } else {
            format!(
                "Completed sprint {}; archived {} task(s): {}",
                self.sprint_id,
                self.archived.len(),
                self.archived.join(", ")
            )
        }
    }
}

pub async fn sprint_complete(engine: &SyncEngine, sprint_id: &str) -> Result<SprintCompleted> {
    engine.load_all().await?;
    let archived = engine.complete_sprint(sprint_id).await?;
    Ok(SprintCompleted {
        sprint_id: sprint_id.to_string(),
        archived,
    })
}

// === issues ===

pub async fn issue_create(engine: &SyncEngine, draft: NewIssue) -> Result<EntityResult<Issue>> {
    engine.load_all().await?;
    let issue = engine.create_issue(draft).await?;
    Ok(EntityResult::new(engine, issue))
}

pub async fn issue_reopen(engine: &SyncEngine, id: &str) -> Result<EntityResult<Issue>> {
    engine.load_all().await?;
    let issue = engine.reopen_issue(id).await?;
    Ok(EntityResult::new(engine, issue))
}

// === epics ===

pub async fn epic_create(engine: &SyncEngine, name: &str) -> Result<EntityResult<Epic>> {
    engine.load_all().await?;
    let epic = engine.create_epic(name).await?;
    Ok(EntityResult::new(engine, epic))
}

#[derive(Serialize)]
pub struct EpicRecalculated {
    pub epic_id: String,
    pub changed: bool,
    pub progress_pct: Option<u8>,
}

impl Output for EpicRecalculated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let pct = self
            .progress_pct
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "unknown".to_string());
        if self.changed {
            format!("Epic {} progress updated to {}", self.epic_id, pct)
        } else {
            format!("Epic {} progress unchanged at {}", self.epic_id, pct)
        }
    }
}

pub async fn epic_recalc(engine: &SyncEngine, epic_id: &str) -> Result<EpicRecalculated> {
    engine.load_all().await?;
    let changed = engine.recalc_epic_progress(epic_id).await?;
    let progress_pct = engine.get::<Epic>(epic_id).map(|e| e.progress_pct);
    Ok(EpicRecalculated {
        epic_id: epic_id.to_string(),
        changed,
        progress_pct,
    })
}

// === config ===

#[derive(Serialize)]
#[serde(transparent)]
pub struct ConfigShow(pub ResolvedConfig);

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json(&self.0)
    }

    fn to_human(&self) -> String {
        let c = &self.0;
        let mut lines = vec![
            format!("base-url: {} ({})", c.base_url.value, c.base_url.source),
            format!("per-page: {} ({})", c.per_page.value, c.per_page.source),
            format!("user: {} ({})", c.user.value, c.user.source),
            format!(
                "toast-seconds: {} ({})",
                c.toast_seconds.value, c.toast_seconds.source
            ),
        ];
        match &c.timeout_seconds {
            Some(t) => lines.push(format!("timeout-seconds: {} ({})", t.value, t.source)),
            None => lines.push("timeout-seconds: none (default)".to_string()),
        }
        lines.join("\n")
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigShow {
    ConfigShow(config.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncSettings;
    use crate::remote::{MemoryTransport, RemoteStore};
    use serde_json::json;
    use std::sync::Arc;

    fn engine_with(transport: Arc<MemoryTransport>) -> SyncEngine {
        SyncEngine::new(RemoteStore::new(transport), SyncSettings::default())
    }

    #[tokio::test]
    async fn test_load_reports_active_sprint() {
        let transport = Arc::new(MemoryTransport::new());
        let sprint = transport.insert(
            "sprints",
            json!({"name": "Sprint 2", "status": "active", "total_points": 8}),
        );
        transport.insert(
            "tasks",
            json!({"title": "a", "status": "done", "pts": 3, "sprint_id": sprint}),
        );
        transport.insert(
            "tasks",
            json!({"title": "b", "status": "new", "pts": 5, "sprint_id": sprint}),
        );
        let engine = engine_with(transport);

        let result = load(&engine).await.unwrap();
        assert_eq!(result.summary.tasks, 2);
        assert_eq!(result.active_sprint.unwrap().id, sprint);
        let progress = result.progress.unwrap();
        assert_eq!(progress.done_points, 3);
        assert_eq!(progress.total_points, 8);
    }

    #[tokio::test]
    async fn test_task_move_output() {
        let transport = Arc::new(MemoryTransport::new());
        let id = transport.insert("tasks", json!({"title": "Ship it", "status": "new"}));
        let engine = engine_with(transport);

        let result = task_move(&engine, &id, TaskStatus::ReadyTest).await.unwrap();
        assert_eq!(result.entity.status, TaskStatus::ReadyTest);

        let value: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(value["status"], "ready-test");
        assert!(result.to_human().contains("\"Ship it\""));
    }

    #[tokio::test]
    async fn test_seed_output() {
        let engine = engine_with(Arc::new(MemoryTransport::new()));
        assert!(seed(&engine).await.unwrap().seeded);
        let again = seed(&engine).await.unwrap();
        assert!(!again.seeded);
        assert_eq!(again.to_json(), r#"{"seeded":false}"#);
    }
}
