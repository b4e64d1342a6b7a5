//! Integration tests for the optimistic mutation protocol.
//!
//! These run the engine against `MemoryTransport` and check that:
//! - failures restore the exact pre-mutation cache state
//! - confirmed creates replace their temporary entry in place
//! - the saving set tracks in-flight mutations
//! - notifications are raised for success and failure
//! - racing updates follow last-write-wins

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{Fixture, unavailable};
use serde_json::Value;
use tokio::sync::Semaphore;

use scrumsync::Error;
use scrumsync::engine::{Operation, SyncEngine, SyncSettings};
use scrumsync::models::{
    ActivityKind, EntityKind, Issue, IssuePatch, IssueStatus, NewIssue, NewTask, Priority, Task,
    TaskPatch, TaskStatus,
};
use scrumsync::notifications::Severity;
use scrumsync::remote::{MemoryTransport, RemoteError, RemoteStore, Transport, Verb, WireRecord};

fn ids<E: Clone>(items: &[E], id: impl Fn(&E) -> String) -> Vec<String> {
    items.iter().map(id).collect()
}

// === Rollback ===

#[tokio::test]
async fn test_update_failure_restores_exact_state() {
    let fx = Fixture::new();
    let id = fx.task("Write docs", "in-progress", None);
    fx.load().await;
    let before = fx.engine.get::<Task>(&id).unwrap();

    fx.transport.fail(Verb::Replace, "tasks", unavailable());
    let patch = TaskPatch {
        title: Some("Write better docs".to_string()),
        priority: Some(Priority::Critical),
        ..TaskPatch::default()
    };
    let err = fx.engine.update_task(&id, patch).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Mutation {
            operation: Operation::UpdateTask,
            ..
        }
    ));
    assert_eq!(err.category(), "remote_unavailable");
    assert_eq!(fx.engine.get::<Task>(&id), Some(before));
    assert!(!fx.engine.is_saving(EntityKind::Task, &id));

    let notes = fx.engine.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Error);
    assert!(notes[0].message.contains("update task"));
}

#[tokio::test]
async fn test_move_failure_restores_status_and_activity() {
    let fx = Fixture::new();
    let id = fx.task("Deploy", "ready-deploy", None);
    fx.load().await;

    fx.transport.fail_once(Verb::Replace, "tasks", unavailable());
    assert!(fx.engine.move_task(&id, TaskStatus::Done).await.is_err());

    let task = fx.engine.get::<Task>(&id).unwrap();
    assert_eq!(task.status, TaskStatus::ReadyDeploy);
    assert!(task.activity.is_empty());
    assert_eq!(fx.record("tasks", &id)["status"], "ready-deploy");
}

#[tokio::test]
async fn test_delete_failure_restores_position() {
    let fx = Fixture::new();
    let a = fx.task("A", "new", None);
    let b = fx.task("B", "new", None);
    let c = fx.task("C", "new", None);
    fx.load().await;

    fx.transport.fail_id(Verb::Delete, "tasks", &b, unavailable());
    let err = fx.engine.delete_task(&b).await.unwrap_err();
    assert_eq!(err.operation(), Some(Operation::DeleteTask));

    let tasks = fx.engine.list::<Task>();
    assert_eq!(ids(&tasks, |t| t.id.clone()), vec![a, b, c]);
}

#[tokio::test]
async fn test_delete_issue_failure_restores_backup() {
    let fx = Fixture::new();
    let id = fx.issue("Crash on logout", "new");
    fx.load().await;
    let before = fx.engine.get::<Issue>(&id).unwrap();

    fx.transport.fail(Verb::Delete, "issues", unavailable());
    assert!(fx.engine.delete_issue(&id).await.is_err());
    assert_eq!(fx.engine.get::<Issue>(&id), Some(before));
}

#[tokio::test]
async fn test_update_issue_failure_restores_exact_state() {
    let fx = Fixture::new();
    let id = fx.issue("Login timeout", "in-progress");
    fx.load().await;
    fx.engine.toggle_issue_selection(&id).unwrap();
    let before = fx.engine.get::<Issue>(&id).unwrap();

    fx.transport.fail(Verb::Replace, "issues", unavailable());
    let patch = IssuePatch {
        title: Some("Login times out after 5s".to_string()),
        status: Some(IssueStatus::Done),
        priority: Some(Priority::Low),
        tags: Some(vec!["auth".to_string()]),
        ..IssuePatch::default()
    };
    let err = fx.engine.update_issue(&id, patch).await.unwrap_err();

    assert_eq!(err.operation(), Some(Operation::UpdateIssue));
    assert_eq!(fx.engine.get::<Issue>(&id), Some(before));
    assert_eq!(fx.record("issues", &id)["status"], "in-progress");
    assert!(!fx.engine.is_saving(EntityKind::Issue, &id));
}

#[tokio::test]
async fn test_move_to_sprint_failure_restores_exact_state() {
    let fx = Fixture::new();
    let sprint = fx.sprint("Sprint 3", "active");
    let id = fx.task("Backlog item", "in-progress", None);
    fx.load().await;
    let before = fx.engine.get::<Task>(&id).unwrap();

    fx.transport.fail(Verb::Replace, "tasks", unavailable());
    let err = fx
        .engine
        .move_task_to_sprint(&id, Some(&sprint))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "remote_unavailable");
    assert_eq!(fx.engine.get::<Task>(&id), Some(before));
    assert_eq!(fx.record("tasks", &id)["sprint_id"], Value::Null);
}

#[tokio::test]
async fn test_reopen_failure_restores_exact_state() {
    let fx = Fixture::new();
    let id = fx.issue("Broken export", "done");
    fx.load().await;
    let before = fx.engine.get::<Issue>(&id).unwrap();

    fx.transport.fail_once(Verb::Replace, "issues", unavailable());
    assert!(fx.engine.reopen_issue(&id).await.is_err());

    assert_eq!(fx.engine.get::<Issue>(&id), Some(before));
    assert_eq!(fx.record("issues", &id)["status"], "done");
    assert!(fx.engine.saving().is_empty());
}

#[tokio::test]
async fn test_vanished_record_rolls_back_as_not_found() {
    let fx = Fixture::new();
    let id = fx.task("Ghost", "new", None);
    fx.load().await;

    // Deleted by someone else after we loaded
    fx.transport.fail_id(
        Verb::Get,
        "tasks",
        &id,
        RemoteError::NotFound {
            collection: "tasks".to_string(),
            id: id.clone(),
        },
    );
    let err = fx.engine.move_task(&id, TaskStatus::Done).await.unwrap_err();
    assert_eq!(err.category(), "not_found");
    assert_eq!(fx.engine.get::<Task>(&id).unwrap().status, TaskStatus::New);
}

// === Creation ===

#[tokio::test]
async fn test_create_task_confirmed_in_place() {
    let fx = Fixture::new();
    let first = fx.task("First", "new", None);
    fx.load().await;

    let created = fx.engine.create_task(NewTask::new("Second")).await.unwrap();
    assert!(!created.id.starts_with("tmp-"));
    assert_eq!(fx.record("tasks", &created.id)["title"], "Second");

    let tasks = fx.engine.list::<Task>();
    assert_eq!(ids(&tasks, |t| t.id.clone()), vec![first, created.id.clone()]);

    let notes = fx.engine.notifications();
    assert_eq!(notes.last().unwrap().message, "Task \"Second\" created");
    assert_eq!(notes.last().unwrap().severity, Severity::Success);
}

#[tokio::test]
async fn test_create_issue_goes_to_front() {
    let fx = Fixture::new();
    fx.issue("Older", "new");
    fx.load().await;

    let created = fx.engine.create_issue(NewIssue::new("Newest")).await.unwrap();
    let issues = fx.engine.list::<Issue>();
    assert_eq!(issues[0].id, created.id);
    assert_eq!(issues.len(), 2);
}

#[tokio::test]
async fn test_create_failure_leaves_no_placeholder() {
    let fx = Fixture::new();
    fx.task("Existing", "new", None);
    fx.load().await;

    fx.transport.fail(Verb::Create, "tasks", unavailable());
    let err = fx.engine.create_task(NewTask::new("Doomed")).await.unwrap_err();
    assert_eq!(err.operation(), Some(Operation::CreateTask));

    let tasks = fx.engine.list::<Task>();
    assert_eq!(tasks.len(), 1);
    assert!(tasks.iter().all(|t| !t.id.starts_with("tmp-")));
    assert!(fx.engine.saving().is_empty());
}

#[tokio::test]
async fn test_unknown_sprint_makes_no_remote_call() {
    let fx = Fixture::new();
    fx.load().await;

    let draft = NewTask::new("Orphan").in_sprint("404");
    let err = fx.engine.create_task(draft).await.unwrap_err();
    assert!(matches!(err, Error::UnknownSprint(ref id) if id == "404"));
    assert_eq!(fx.transport.count(Verb::Create, "tasks"), 0);
    assert!(fx.engine.list::<Task>().is_empty());
}

// === Activity ===

#[tokio::test]
async fn test_move_prepends_activity_entry() {
    let fx = Fixture::new();
    let id = fx.task("Review", "in-progress", None);
    fx.load().await;

    fx.engine.move_task(&id, TaskStatus::ReadyTest).await.unwrap();
    fx.engine.move_task(&id, TaskStatus::Done).await.unwrap();

    let task = fx.engine.get::<Task>(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.activity.len(), 2);
    assert_eq!(task.activity[0].kind, ActivityKind::Status);
    assert_eq!(
        task.activity[0].text,
        format!("Moved to {}", TaskStatus::Done.label())
    );
    assert_eq!(task.activity[0].user, "Tester");

    // The stored record matches the cache
    let stored = Task::from_wire(fx.record("tasks", &id)).unwrap();
    assert_eq!(stored.activity, task.activity);
}

#[tokio::test]
async fn test_move_to_same_status_is_a_no_op() {
    let fx = Fixture::new();
    let id = fx.task("Idle", "new", None);
    fx.load().await;
    fx.transport.reset_calls();

    fx.engine.move_task(&id, TaskStatus::New).await.unwrap();
    assert!(fx.transport.calls().is_empty());
}

// === Loading ===

#[tokio::test]
async fn test_load_failure_keeps_cache_and_notifies() {
    let fx = Fixture::new();
    let id = fx.task("Cached", "new", None);
    fx.load().await;

    fx.transport.fail(Verb::List, "epics", unavailable());
    fx.task("Not yet seen", "new", None);
    assert!(matches!(fx.engine.load_all().await, Err(Error::Remote(_))));

    let tasks = fx.engine.list::<Task>();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
    assert_eq!(fx.engine.notifications()[0].severity, Severity::Error);
}

#[tokio::test]
async fn test_huge_point_values_load_and_sum() {
    let fx = Fixture::new();
    let sprint = fx.sprint("Sprint 9", "active");
    for title in ["Big", "Bigger"] {
        fx.insert(
            "tasks",
            serde_json::json!({"title": title, "status": "done", "pts": 3_000_000_000u64, "sprint_id": sprint}),
        );
    }
    fx.load().await;

    let progress = fx.engine.sprint_progress(&sprint);
    assert_eq!(progress.task_count, 2);
    assert_eq!(progress.total_points, 6_000_000_000);
    assert_eq!(progress.done_points, 6_000_000_000);
}

// === Saving set ===

/// Holds every replace until the test releases a permit.
struct GatedTransport {
    inner: MemoryTransport,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn list(&self, collection: &str, per_page: u32) -> Result<Value, RemoteError> {
        self.inner.list(collection, per_page).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, RemoteError> {
        self.inner.get(collection, id).await
    }

    async fn create(&self, collection: &str, body: Value) -> Result<Value, RemoteError> {
        self.inner.create(collection, body).await
    }

    async fn replace(&self, collection: &str, id: &str, body: Value) -> Result<Value, RemoteError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        permit.forget();
        self.inner.replace(collection, id, body).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.inner.delete(collection, id).await
    }
}

#[tokio::test]
async fn test_saving_set_covers_in_flight_mutation() {
    let inner = MemoryTransport::new();
    let id = inner.insert("tasks", serde_json::json!({"title": "Slow", "status": "new"}));
    let gate = Arc::new(Semaphore::new(0));
    let transport = GatedTransport {
        inner,
        gate: gate.clone(),
    };
    let engine = SyncEngine::new(
        RemoteStore::new(Arc::new(transport)),
        SyncSettings::default(),
    );
    engine.load_all().await.unwrap();

    let handle = {
        let engine = engine.clone();
        let id = id.clone();
        tokio::spawn(async move { engine.move_task(&id, TaskStatus::InProgress).await })
    };

    for _ in 0..100 {
        if engine.is_saving(EntityKind::Task, &id) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(engine.is_saving(EntityKind::Task, &id));
    // Optimistic state is visible before confirmation
    assert_eq!(
        engine.get::<Task>(&id).unwrap().status,
        TaskStatus::InProgress
    );

    gate.add_permits(1);
    let task = handle.await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(!engine.is_saving(EntityKind::Task, &id));
    assert!(engine.saving().is_empty());
}

// === Races ===

#[tokio::test]
async fn test_racing_updates_last_write_wins() {
    let fx = Fixture::new();
    let id = fx.task("Original", "new", None);
    fx.load().await;

    let rename = TaskPatch {
        title: Some("Renamed".to_string()),
        ..TaskPatch::default()
    };
    let reprioritize = TaskPatch {
        priority: Some(Priority::Critical),
        ..TaskPatch::default()
    };
    let (a, b) = tokio::join!(
        fx.engine.update_task(&id, rename),
        fx.engine.update_task(&id, reprioritize),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());

    let cached = fx.engine.get::<Task>(&id).unwrap();
    let stored = fx.record("tasks", &id);
    assert_eq!(stored["title"], Value::String(cached.title.clone()));
    assert_eq!(stored["priority"], cached.priority.as_str());
    // Both read the same base record, so one change is lost
    assert!(!(cached.title == "Renamed" && cached.priority == Priority::Critical));
    assert!(fx.engine.saving().is_empty());
}

// === Presentation state ===

#[tokio::test]
async fn test_snapshot_and_dismissal() {
    let fx = Fixture::new();
    let task = fx.task("Listed", "new", None);
    fx.issue("Reported", "new");
    fx.load().await;

    fx.engine.create_task(NewTask::new("Fresh")).await.unwrap();
    fx.engine.create_issue(NewIssue::new("Also fresh")).await.unwrap();

    let snapshot = fx.engine.snapshot();
    assert_eq!(snapshot.tasks.len(), 2);
    assert_eq!(snapshot.tasks[0].id, task);
    assert_eq!(snapshot.issues.len(), 2);
    assert!(snapshot.saving.is_empty());
    assert_eq!(snapshot.notifications.len(), 2);

    let first = snapshot.notifications[0].id;
    assert!(fx.engine.dismiss_notification(first));
    assert!(!fx.engine.dismiss_notification(first));
    assert_eq!(fx.engine.notifications().len(), 1);

    fx.engine.dismiss_all_notifications();
    assert!(fx.engine.snapshot().notifications.is_empty());
}
