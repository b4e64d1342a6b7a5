//! Optimistic mutation engine.
//!
//! Every user-initiated change runs through one protocol:
//!
//! 1. apply the optimistic next state to the [`EntityCache`]
//! 2. mark the entity as saving
//! 3. call the remote store
//! 4. on success, reconcile the cache with the authoritative record
//! 5. on failure, restore the pre-mutation snapshot and raise an error
//!    notification naming the operation
//! 6. clear the saving mark
//!
//! The engine is cheap to clone; clones share one cache. The state lock is
//! never held across a remote call, so mutations on different entities (and
//! racing mutations on the same entity) interleave freely. Nothing is queued
//! or retried; the last remote call to complete wins in the cache.

pub mod mutation;
pub mod workflows;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Duration as DateDuration, Utc};
use serde::Serialize;

use crate::cache::{Cached, EntityCache};
use crate::models::progress::{self, SprintProgress};
use crate::models::{
    ActivityEntry, EPIC_COLORS, Entity, EntityKind, Epic, Issue, IssuePatch, NewIssue, NewTask,
    Sprint, SprintStatus, Task, TaskPatch, TaskStatus,
};
use crate::notifications::{DEFAULT_DISMISS_SECONDS, Notification, NotificationManager};
use crate::remote::{RemoteError, RemoteStore, WireRecord};
use crate::{Error, Result};

pub use mutation::{CacheWrite, Mutation, Operation, Snapshot};
pub use workflows::{BulkAction, BulkFailure, CommentTarget};

/// Entities the engine can synchronize.
pub trait Synced: Cached + WireRecord {}

impl<E: Cached + WireRecord> Synced for E {}

/// Engine settings resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Author recorded on activity entries
    pub user: String,
    /// Auto-dismiss delay for notifications (None = manual only)
    pub toast_duration: Option<Duration>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            user: "You".to_string(),
            toast_duration: Some(Duration::from_secs(DEFAULT_DISMISS_SECONDS)),
        }
    }
}

/// An entity with a mutation in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SavingEntry {
    pub kind: EntityKind,
    pub id: String,
}

/// Collection sizes after a full load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub tasks: usize,
    pub issues: usize,
    pub sprints: usize,
    pub epics: usize,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub tasks: Vec<Task>,
    pub issues: Vec<Issue>,
    pub sprints: Vec<Sprint>,
    pub epics: Vec<Epic>,
    pub saving: Vec<SavingEntry>,
    pub notifications: Vec<Notification>,
}

/// In-flight marks, counted so overlapping mutations on one entity keep the
/// mark until the last of them settles.
#[derive(Debug, Default)]
struct SavingSet(HashMap<SavingEntry, usize>);

impl SavingSet {
    fn insert(&mut self, entry: SavingEntry) {
        *self.0.entry(entry).or_insert(0) += 1;
    }

    fn remove(&mut self, entry: &SavingEntry) {
        if let Some(count) = self.0.get_mut(entry) {
            *count -= 1;
            if *count == 0 {
                self.0.remove(entry);
            }
        }
    }

    fn contains(&self, entry: &SavingEntry) -> bool {
        self.0.contains_key(entry)
    }

    fn iter(&self) -> impl Iterator<Item = &SavingEntry> + '_ {
        self.0.keys()
    }
}

#[derive(Debug)]
struct SyncState {
    cache: EntityCache,
    saving: SavingSet,
    notifications: NotificationManager,
}

/// Owns the entity cache and runs optimistic mutations against the remote
/// store.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    remote: RemoteStore,
    state: Arc<Mutex<SyncState>>,
    settings: Arc<SyncSettings>,
    next_temp: Arc<AtomicU64>,
}

impl SyncEngine {
    pub fn new(remote: RemoteStore, settings: SyncSettings) -> Self {
        let state = SyncState {
            cache: EntityCache::new(),
            saving: SavingSet::default(),
            notifications: NotificationManager::new(settings.toast_duration),
        };
        Self {
            remote,
            state: Arc::new(Mutex::new(state)),
            settings: Arc::new(settings),
            next_temp: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start from an already populated cache.
    pub fn with_cache(remote: RemoteStore, settings: SyncSettings, cache: EntityCache) -> Self {
        let engine = Self::new(remote, settings);
        engine.lock().cache = cache;
        engine
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn remote(&self) -> &RemoteStore {
        &self.remote
    }

    /// Allocate a local ID for an entity awaiting creation.
    fn temp_id(&self) -> String {
        format!("tmp-{}", self.next_temp.fetch_add(1, Ordering::Relaxed) + 1)
    }

    // === Protocol ===

    /// Run one mutation through the optimistic protocol.
    pub(crate) async fn execute<E, F>(&self, mutation: Mutation<E>, call: F) -> Result<Option<E>>
    where
        E: Synced,
        F: Future<Output = std::result::Result<Option<E>, RemoteError>>,
    {
        let entry = SavingEntry {
            kind: E::KIND,
            id: mutation.id().to_string(),
        };
        {
            let mut state = self.lock();
            mutation.apply(&mut state.cache);
            state.saving.insert(entry.clone());
        }
        tracing::debug!(
            operation = mutation.operation.as_str(),
            id = %entry.id,
            collection = E::KIND.collection(),
            "optimistic apply"
        );

        let outcome = mutation.settle(call.await);

        let mut state = self.lock();
        state.saving.remove(&entry);
        match outcome {
            Ok(confirmed) => {
                if let Some(write) = confirmed.reconcile {
                    write.apply(&mut state.cache);
                }
                tracing::debug!(operation = mutation.operation.as_str(), id = %entry.id, "confirmed");
                Ok(confirmed.entity)
            }
            Err(failure) => {
                failure.restore.apply(&mut state.cache);
                let err = Error::Mutation {
                    operation: failure.operation,
                    id: failure.id,
                    source: failure.error,
                };
                tracing::warn!(
                    operation = mutation.operation.as_str(),
                    id = %entry.id,
                    error = %err,
                    "rolled back"
                );
                state.notifications.error(err.to_string());
                Err(err)
            }
        }
    }

    async fn create<E: Synced>(
        &self,
        operation: Operation,
        optimistic: E,
        position: Option<usize>,
    ) -> Result<E> {
        let mutation = Mutation::create(operation, optimistic.clone(), position);
        let created = self
            .execute(mutation, async { self.remote.create(&optimistic).await.map(Some) })
            .await?;
        authoritative(created, operation, optimistic.id())
    }

    async fn update<E: Synced>(&self, operation: Operation, id: &str, patch: E::Patch) -> Result<E> {
        let mutation = {
            let state = self.lock();
            let mut next = state
                .cache
                .get::<E>(id)
                .cloned()
                .ok_or_else(|| not_cached::<E>(id))?;
            next.apply(&patch);
            Mutation::update(operation, &state.cache, next)
        };
        let updated = self
            .execute(mutation, async { self.remote.update::<E>(id, &patch).await.map(Some) })
            .await?;
        authoritative(updated, operation, id)
    }

    async fn delete<E: Synced>(&self, operation: Operation, id: &str) -> Result<()> {
        let mutation = {
            let state = self.lock();
            if !state.cache.contains::<E>(id) {
                return Err(not_cached::<E>(id));
            }
            Mutation::<E>::delete(operation, &state.cache, id)
        };
        self.execute(mutation, async { self.remote.delete::<E>(id).await.map(|_| None) })
            .await?;
        Ok(())
    }

    fn require_sprint(&self, sprint_id: Option<&str>) -> Result<()> {
        match sprint_id {
            Some(id) if !self.lock().cache.contains::<Sprint>(id) => {
                Err(Error::UnknownSprint(id.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn cached<E: Synced>(&self, id: &str) -> Result<E> {
        self.lock()
            .cache
            .get::<E>(id)
            .cloned()
            .ok_or_else(|| not_cached::<E>(id))
    }

    pub(crate) fn notify_success(&self, message: impl Into<String>) {
        self.lock().notifications.success(message);
    }

    pub(crate) fn notify_error(&self, message: impl Into<String>) {
        self.lock().notifications.error(message);
    }

    // === Loading ===

    /// Fetch all four collections in parallel and replace the cache.
    ///
    /// On failure the cache is left untouched.
    pub async fn load_all(&self) -> Result<LoadSummary> {
        let loaded = tokio::try_join!(
            self.remote.list::<Task>(),
            self.remote.list::<Issue>(),
            self.remote.list::<Sprint>(),
            self.remote.list::<Epic>(),
        );
        let (tasks, issues, sprints, epics) = match loaded {
            Ok(collections) => collections,
            Err(err) => {
                tracing::warn!(error = %err, "load failed");
                self.notify_error(format!("Could not load data from the remote store: {}", err));
                return Err(Error::Remote(err));
            }
        };

        let summary = LoadSummary {
            tasks: tasks.len(),
            issues: issues.len(),
            sprints: sprints.len(),
            epics: epics.len(),
        };
        let mut state = self.lock();
        state.cache.replace_all(tasks);
        state.cache.replace_all(issues);
        state.cache.replace_all(sprints);
        state.cache.replace_all(epics);
        tracing::info!(?summary, "loaded collections");
        Ok(summary)
    }

    // === Tasks ===

    /// Create a task. It is appended under a temporary ID until confirmed.
    pub async fn create_task(&self, draft: NewTask) -> Result<Task> {
        if draft.title.trim().is_empty() {
            return Err(Error::InvalidInput("task title cannot be empty".to_string()));
        }
        self.require_sprint(draft.sprint_id.as_deref())?;

        let optimistic = Task::from_draft(self.temp_id(), &draft);
        let created = self.create(Operation::CreateTask, optimistic, None).await?;
        self.notify_success(format!("Task \"{}\" created", created.title));
        Ok(created)
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        if let Some(sprint_id) = &patch.sprint_id {
            self.require_sprint(sprint_id.as_deref())?;
        }
        let status_changed = patch.status.is_some();
        let updated = self.update::<Task>(Operation::UpdateTask, id, patch).await?;
        if status_changed {
            self.refresh_epics_for(&[updated.id.clone()]).await;
        }
        Ok(updated)
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.delete::<Task>(Operation::DeleteTask, id).await?;
        self.notify_success("Task deleted");
        Ok(())
    }

    /// Move a task to another board column, recording a "moved" activity
    /// entry. Moving to the current column is a no-op.
    pub async fn move_task(&self, id: &str, to: TaskStatus) -> Result<Task> {
        let current = self.cached::<Task>(id)?;
        if current.status == to {
            return Ok(current);
        }

        let mut activity = Vec::with_capacity(current.activity.len() + 1);
        activity.push(ActivityEntry::moved(to, self.settings.user.as_str()));
        activity.extend(current.activity.iter().cloned());
        let patch = TaskPatch {
            status: Some(to),
            activity: Some(activity),
            ..TaskPatch::default()
        };

        let moved = self.update::<Task>(Operation::MoveTask, id, patch).await?;
        self.refresh_epics_for(&[moved.id.clone()]).await;
        Ok(moved)
    }

    /// Assign a task to a sprint (`None` = backlog). The status resets to `new`.
    pub async fn move_task_to_sprint(&self, id: &str, sprint_id: Option<&str>) -> Result<Task> {
        self.require_sprint(sprint_id)?;
        let patch = TaskPatch {
            sprint_id: Some(sprint_id.map(str::to_string)),
            status: Some(TaskStatus::New),
            ..TaskPatch::default()
        };
        let moved = self
            .update::<Task>(Operation::MoveTaskToSprint, id, patch)
            .await?;
        self.notify_success("Task moved to sprint");
        self.refresh_epics_for(&[moved.id.clone()]).await;
        Ok(moved)
    }

    // === Issues ===

    /// Create an issue. New issues go to the top of the list.
    pub async fn create_issue(&self, draft: NewIssue) -> Result<Issue> {
        if draft.title.trim().is_empty() {
            return Err(Error::InvalidInput("issue title cannot be empty".to_string()));
        }
        let optimistic = Issue::from_draft(self.temp_id(), &draft);
        let created = self
            .create(Operation::CreateIssue, optimistic, Some(0))
            .await?;
        self.notify_success(format!("Issue \"{}\" created", created.title));
        Ok(created)
    }

    pub async fn update_issue(&self, id: &str, patch: IssuePatch) -> Result<Issue> {
        self.update::<Issue>(Operation::UpdateIssue, id, patch).await
    }

    pub async fn delete_issue(&self, id: &str) -> Result<()> {
        self.delete::<Issue>(Operation::DeleteIssue, id).await
    }

    // === Epics & sprints ===

    /// Create an epic with the next palette color and no linked tasks.
    pub async fn create_epic(&self, name: &str) -> Result<Epic> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("epic name cannot be empty".to_string()));
        }
        let mut optimistic = Epic::new(self.temp_id(), name.to_string());
        optimistic.color = {
            let count = self.lock().cache.len::<Epic>();
            EPIC_COLORS[count % EPIC_COLORS.len()].to_string()
        };
        let created = self.create(Operation::CreateEpic, optimistic, None).await?;
        self.notify_success(format!("Epic \"{}\" created", name));
        Ok(created)
    }

    /// Create the next sprint: `Sprint N`, starting today, two weeks long,
    /// in planning.
    pub async fn create_sprint(&self) -> Result<Sprint> {
        let count = self.lock().cache.len::<Sprint>();
        let today = Utc::now().date_naive();
        let mut optimistic = Sprint::new(self.temp_id(), format!("Sprint {}", count + 1));
        optimistic.start_date = Some(today);
        optimistic.end_date = Some(today + DateDuration::days(14));
        optimistic.status = SprintStatus::Planning;

        let created = self.create(Operation::CreateSprint, optimistic, None).await?;
        self.notify_success(format!("{} created", created.name));
        Ok(created)
    }

    // === Queries ===

    /// Read the cache under the state lock.
    pub fn read<R>(&self, f: impl FnOnce(&EntityCache) -> R) -> R {
        f(&self.lock().cache)
    }

    /// Clone of one cached entity.
    pub fn get<E: Synced>(&self, id: &str) -> Option<E> {
        self.lock().cache.get::<E>(id).cloned()
    }

    /// All cached entities of one kind, in display order.
    pub fn list<E: Synced>(&self) -> Vec<E> {
        self.lock().cache.list::<E>().cloned().collect()
    }

    /// First sprint with status `active`.
    pub fn active_sprint(&self) -> Option<Sprint> {
        self.lock()
            .cache
            .list::<Sprint>()
            .find(|s| s.status == SprintStatus::Active)
            .cloned()
    }

    pub fn sprint_progress(&self, sprint_id: &str) -> SprintProgress {
        progress::sprint_progress(sprint_id, self.lock().cache.list::<Task>())
    }

    pub fn is_saving(&self, kind: EntityKind, id: &str) -> bool {
        self.lock().saving.contains(&SavingEntry {
            kind,
            id: id.to_string(),
        })
    }

    /// Entities with a mutation in flight.
    pub fn saving(&self) -> Vec<SavingEntry> {
        let mut saving: Vec<SavingEntry> = self.lock().saving.iter().cloned().collect();
        saving.sort_by(|a, b| (a.kind.as_str(), &a.id).cmp(&(b.kind.as_str(), &b.id)));
        saving
    }

    /// Visible notifications, oldest first. Expired ones are dropped.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut state = self.lock();
        state.notifications.cleanup();
        state.notifications.visible()
    }

    pub fn dismiss_notification(&self, id: u64) -> bool {
        self.lock().notifications.dismiss(id)
    }

    pub fn dismiss_all_notifications(&self) {
        self.lock().notifications.dismiss_all();
    }

    /// Copy of everything the presentation layer renders.
    pub fn snapshot(&self) -> StateSnapshot {
        let saving = self.saving();
        let notifications = self.notifications();
        let state = self.lock();
        StateSnapshot {
            tasks: state.cache.list::<Task>().cloned().collect(),
            issues: state.cache.list::<Issue>().cloned().collect(),
            sprints: state.cache.list::<Sprint>().cloned().collect(),
            epics: state.cache.list::<Epic>().cloned().collect(),
            saving,
            notifications,
        }
    }
}

fn not_cached<E: Entity>(id: &str) -> Error {
    Error::NotCached {
        kind: E::KIND,
        id: id.to_string(),
    }
}

/// The record the remote store returned for a create or update.
fn authoritative<E>(entity: Option<E>, operation: Operation, id: &str) -> Result<E> {
    entity.ok_or_else(|| Error::Mutation {
        operation,
        id: id.to_string(),
        source: RemoteError::Decode("no record returned".to_string()),
    })
}
