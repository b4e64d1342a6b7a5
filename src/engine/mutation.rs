//! Mutation command objects.
//!
//! A [`Mutation`] captures everything needed to run one optimistic change:
//! the pre-state snapshot, the forward cache write, and (after the remote
//! call settles) the write that either confirms or rolls back. Settling is a
//! pure function of the mutation and the remote result; the engine only
//! applies the returned [`CacheWrite`].

use std::fmt;

use serde::Serialize;

use crate::cache::{Cached, EntityCache};
use crate::remote::RemoteError;

/// Named, user-initiated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateTask,
    UpdateTask,
    DeleteTask,
    MoveTask,
    MoveTaskToSprint,
    CreateIssue,
    UpdateIssue,
    DeleteIssue,
    ReopenIssue,
    AddComment,
    BulkUpdateIssues,
    BulkDeleteIssues,
    CreateEpic,
    RecalcEpicProgress,
    CreateSprint,
    CompleteSprint,
    LoadAll,
}

impl Operation {
    /// Stable identifier, used in JSON output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateTask => "create_task",
            Operation::UpdateTask => "update_task",
            Operation::DeleteTask => "delete_task",
            Operation::MoveTask => "move_task",
            Operation::MoveTaskToSprint => "move_task_to_sprint",
            Operation::CreateIssue => "create_issue",
            Operation::UpdateIssue => "update_issue",
            Operation::DeleteIssue => "delete_issue",
            Operation::ReopenIssue => "reopen_issue",
            Operation::AddComment => "add_comment",
            Operation::BulkUpdateIssues => "bulk_update_issues",
            Operation::BulkDeleteIssues => "bulk_delete_issues",
            Operation::CreateEpic => "create_epic",
            Operation::RecalcEpicProgress => "recalc_epic_progress",
            Operation::CreateSprint => "create_sprint",
            Operation::CompleteSprint => "complete_sprint",
            Operation::LoadAll => "load_all",
        }
    }

    /// Verb phrase for user-facing messages ("Failed to {describe} ...").
    pub fn describe(&self) -> &'static str {
        match self {
            Operation::CreateTask => "create task",
            Operation::UpdateTask => "update task",
            Operation::DeleteTask => "delete task",
            Operation::MoveTask => "move task",
            Operation::MoveTaskToSprint => "move task to sprint",
            Operation::CreateIssue => "create issue",
            Operation::UpdateIssue => "update issue",
            Operation::DeleteIssue => "delete issue",
            Operation::ReopenIssue => "reopen issue",
            Operation::AddComment => "add comment to",
            Operation::BulkUpdateIssues => "update issues",
            Operation::BulkDeleteIssues => "delete issues",
            Operation::CreateEpic => "create epic",
            Operation::RecalcEpicProgress => "update progress of epic",
            Operation::CreateSprint => "create sprint",
            Operation::CompleteSprint => "complete sprint",
            Operation::LoadAll => "load",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// State of one entity before a mutation was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<E> {
    /// The entity did not exist
    Absent { id: String },
    /// The entity existed at this display position
    Present { entity: E, position: usize },
}

impl<E: Cached> Snapshot<E> {
    pub fn capture(cache: &EntityCache, id: &str) -> Self {
        let slot = cache.slot::<E>();
        match (slot.get(id), slot.position(id)) {
            (Some(entity), Some(position)) => Snapshot::Present {
                entity: entity.clone(),
                position,
            },
            _ => Snapshot::Absent { id: id.to_string() },
        }
    }

    /// The write that puts the cache back to this snapshot.
    pub fn restore(&self) -> CacheWrite<E> {
        match self {
            Snapshot::Absent { id } => CacheWrite::Remove(id.clone()),
            Snapshot::Present { entity, position } => CacheWrite::Insert {
                entity: entity.clone(),
                position: Some(*position),
            },
        }
    }

    pub fn entity(&self) -> Option<&E> {
        match self {
            Snapshot::Absent { .. } => None,
            Snapshot::Present { entity, .. } => Some(entity),
        }
    }
}

/// One change to a single cache slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheWrite<E> {
    /// Upsert; a new entity goes to `position` (append when `None`)
    Insert { entity: E, position: Option<usize> },
    /// Replace only if still present
    Refresh(E),
    /// Swap a temporary entry for its confirmed record, in place
    Rename { from: String, entity: E },
    Remove(String),
}

impl<E: Cached> CacheWrite<E> {
    pub fn apply(self, cache: &mut EntityCache) {
        let slot = cache.slot_mut::<E>();
        match self {
            CacheWrite::Insert { entity, position } => match position {
                Some(index) => slot.insert_at(index, entity),
                None => slot.upsert(entity),
            },
            CacheWrite::Refresh(mut entity) => {
                if let Some(cached) = slot.get(entity.id()) {
                    entity.keep_local_state(cached);
                    slot.upsert(entity);
                }
            }
            CacheWrite::Rename { from, mut entity } => {
                if let Some(cached) = slot.get(&from) {
                    entity.keep_local_state(cached);
                    slot.rename(&from, entity);
                }
            }
            CacheWrite::Remove(id) => {
                slot.remove(&id);
            }
        }
    }
}

/// A rolled-back mutation: the error plus the write that restores the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure<E> {
    pub operation: Operation,
    pub id: String,
    pub error: RemoteError,
    pub restore: CacheWrite<E>,
}

/// A confirmed mutation: the authoritative entity (absent for deletes) and
/// the write that reconciles the cache with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmed<E> {
    pub entity: Option<E>,
    pub reconcile: Option<CacheWrite<E>>,
}

pub type Outcome<E> = std::result::Result<Confirmed<E>, Failure<E>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Create,
    Update,
    Delete,
}

/// An optimistic change to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation<E> {
    pub operation: Operation,
    before: Snapshot<E>,
    forward: CacheWrite<E>,
    kind: Kind,
}

impl<E: Cached> Mutation<E> {
    /// Insert a new entity under its temporary ID.
    pub fn create(operation: Operation, entity: E, position: Option<usize>) -> Self {
        Self {
            operation,
            before: Snapshot::Absent {
                id: entity.id().to_string(),
            },
            forward: CacheWrite::Insert { entity, position },
            kind: Kind::Create,
        }
    }

    /// Replace a cached entity with its optimistic next state.
    pub fn update(operation: Operation, cache: &EntityCache, next: E) -> Self {
        Self {
            operation,
            before: Snapshot::capture(cache, next.id()),
            forward: CacheWrite::Refresh(next),
            kind: Kind::Update,
        }
    }

    /// Remove a cached entity, keeping a backup.
    pub fn delete(operation: Operation, cache: &EntityCache, id: &str) -> Self {
        Self {
            operation,
            before: Snapshot::capture(cache, id),
            forward: CacheWrite::Remove(id.to_string()),
            kind: Kind::Delete,
        }
    }

    /// ID the mutation targets (temporary for creates).
    pub fn id(&self) -> &str {
        match &self.before {
            Snapshot::Absent { id } => id,
            Snapshot::Present { entity, .. } => entity.id(),
        }
    }

    pub fn before(&self) -> &Snapshot<E> {
        &self.before
    }

    /// The optimistic entity, if the mutation produces one.
    pub fn optimistic(&self) -> Option<&E> {
        match &self.forward {
            CacheWrite::Insert { entity, .. } | CacheWrite::Refresh(entity) => Some(entity),
            CacheWrite::Rename { entity, .. } => Some(entity),
            CacheWrite::Remove(_) => None,
        }
    }

    /// Apply the optimistic state.
    pub fn apply(&self, cache: &mut EntityCache) {
        self.forward.clone().apply(cache);
    }

    /// Write that reverts the optimistic state.
    pub fn rollback(&self) -> CacheWrite<E> {
        self.before.restore()
    }

    /// Resolve the mutation against the remote result.
    pub fn settle(&self, result: std::result::Result<Option<E>, RemoteError>) -> Outcome<E> {
        match result {
            Ok(confirmed) => {
                let reconcile = match (self.kind, &confirmed) {
                    (Kind::Create, Some(entity)) => Some(CacheWrite::Rename {
                        from: self.id().to_string(),
                        entity: entity.clone(),
                    }),
                    (Kind::Update, Some(entity)) => Some(CacheWrite::Refresh(entity.clone())),
                    _ => None,
                };
                Ok(Confirmed {
                    entity: confirmed,
                    reconcile,
                })
            }
            Err(error) => Err(Failure {
                operation: self.operation,
                id: self.id().to_string(),
                error,
                restore: self.rollback(),
            }),
        }
    }
}
