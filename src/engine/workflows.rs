//! Multi-step domain workflows built on the mutation engine.

use futures::future::join_all;
use serde::Serialize;

use super::{SavingEntry, SyncEngine, not_cached};
use crate::models::progress::epic_progress;
use crate::models::{
    ActivityEntry, Entity, Epic, EpicPatch, Issue, IssuePatch, IssueStatus, Sprint, SprintPatch,
    SprintStatus, Task, TaskPatch, TaskStatus,
};
use crate::remote::RemoteError;
use crate::{Error, Result};

use super::mutation::{Mutation, Operation};

/// What a bulk operation does to every selected issue.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Apply the same partial update to each issue
    Update(IssuePatch),
    Delete,
}

impl BulkAction {
    fn operation(&self) -> Operation {
        match self {
            BulkAction::Update(_) => Operation::BulkUpdateIssues,
            BulkAction::Delete => Operation::BulkDeleteIssues,
        }
    }
}

/// One failed item of a bulk operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
    pub category: &'static str,
}

impl BulkFailure {
    fn new(id: String, error: &RemoteError) -> Self {
        Self {
            id,
            error: error.to_string(),
            category: error.category(),
        }
    }
}

/// Which collection a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Task,
    Issue,
}

impl SyncEngine {
    /// Complete a sprint and archive its unfinished tasks.
    ///
    /// The sprint and every task not in `done`/`archived` are updated locally
    /// first. The sprint update is sent, then the task archives in parallel.
    /// If any call fails, all local changes are reverted; remote calls that
    /// already succeeded stay applied. Returns the archived task IDs.
    pub async fn complete_sprint(&self, sprint_id: &str) -> Result<Vec<String>> {
        let (sprint_mutation, task_mutations) = {
            let state = self.lock();
            let mut sprint = state
                .cache
                .get::<Sprint>(sprint_id)
                .cloned()
                .ok_or_else(|| not_cached::<Sprint>(sprint_id))?;
            sprint.status = SprintStatus::Completed;
            let sprint_mutation = Mutation::update(Operation::CompleteSprint, &state.cache, sprint);

            let task_mutations: Vec<Mutation<Task>> = state
                .cache
                .list_where::<Task>(|t| {
                    t.sprint_id.as_deref() == Some(sprint_id) && !t.status.is_terminal()
                })
                .into_iter()
                .map(|task| {
                    let mut next = task.clone();
                    next.status = TaskStatus::Archived;
                    Mutation::update(Operation::CompleteSprint, &state.cache, next)
                })
                .collect();
            (sprint_mutation, task_mutations)
        };
        let archived: Vec<String> = task_mutations.iter().map(|m| m.id().to_string()).collect();

        let saving = SavingEntry {
            kind: Sprint::KIND,
            id: sprint_id.to_string(),
        };
        {
            let mut state = self.lock();
            sprint_mutation.apply(&mut state.cache);
            for mutation in &task_mutations {
                mutation.apply(&mut state.cache);
            }
            state.saving.insert(saving.clone());
        }
        tracing::debug!(sprint = sprint_id, tasks = archived.len(), "optimistic sprint completion");

        let sprint_patch = SprintPatch {
            status: Some(SprintStatus::Completed),
            ..SprintPatch::default()
        };
        let sprint_result = self.remote.update::<Sprint>(sprint_id, &sprint_patch).await;

        let archive = TaskPatch::status(TaskStatus::Archived);
        let task_results = match &sprint_result {
            Ok(_) => {
                join_all(
                    archived
                        .iter()
                        .map(|id| self.remote.update::<Task>(id, &archive)),
                )
                .await
            }
            Err(_) => Vec::new(),
        };

        let sprint_outcome = sprint_mutation.settle(sprint_result.map(Some));
        let mut first_error = None;
        let mut task_outcomes = Vec::with_capacity(task_mutations.len());
        for (i, mutation) in task_mutations.iter().enumerate() {
            let outcome = match task_results.get(i) {
                Some(result) => mutation.settle(result.clone().map(Some)),
                // Never sent: roll back with the sprint
                None => mutation.settle(Err(RemoteError::Unavailable(
                    "not sent after sprint update failed".to_string(),
                ))),
            };
            if let (Err(failure), None) = (&outcome, &first_error) {
                first_error = Some(failure.error.clone());
            }
            task_outcomes.push(outcome);
        }

        {
            let mut state = self.lock();
            state.saving.remove(&saving);
            let failed = match &sprint_outcome {
                Err(failure) => Some(failure.error.clone()),
                Ok(_) => first_error,
            };
            if let Some(source) = failed {
                sprint_mutation.rollback().apply(&mut state.cache);
                for mutation in &task_mutations {
                    mutation.rollback().apply(&mut state.cache);
                }
                let err = Error::Mutation {
                    operation: Operation::CompleteSprint,
                    id: sprint_id.to_string(),
                    source,
                };
                tracing::warn!(sprint = sprint_id, error = %err, "sprint completion rolled back");
                state.notifications.error(err.to_string());
                return Err(err);
            }

            if let Some(write) = sprint_outcome.ok().and_then(|c| c.reconcile) {
                write.apply(&mut state.cache);
            }
            for write in task_outcomes.into_iter().flatten().filter_map(|c| c.reconcile) {
                write.apply(&mut state.cache);
            }
            state
                .notifications
                .success("Sprint completed! Remaining tasks archived.");
        }

        tracing::info!(sprint = sprint_id, archived = archived.len(), "sprint completed");
        self.refresh_epics_for(&archived).await;
        Ok(archived)
    }

    /// Recompute an epic's progress from the cached tasks it links.
    ///
    /// Leaves the epic alone when it links no known task, and only writes
    /// when the value changed. Returns whether an update was sent.
    pub async fn recalc_epic_progress(&self, epic_id: &str) -> Result<bool> {
        let patch = {
            let state = self.lock();
            let epic = state
                .cache
                .get::<Epic>(epic_id)
                .ok_or_else(|| not_cached::<Epic>(epic_id))?;
            match epic_progress(epic, state.cache.list::<Task>()) {
                Some(pct) if pct != epic.progress_pct => EpicPatch {
                    progress_pct: Some(pct),
                    ..EpicPatch::default()
                },
                _ => return Ok(false),
            }
        };
        self.update::<Epic>(Operation::RecalcEpicProgress, epic_id, patch)
            .await?;
        Ok(true)
    }

    /// Recalculate every epic that links one of `task_ids`.
    ///
    /// Failures are already rolled back and notified per epic.
    pub async fn refresh_epics_for(&self, task_ids: &[String]) {
        let epic_ids: Vec<String> = self.read(|cache| {
            cache
                .list::<Epic>()
                .filter(|e| task_ids.iter().any(|id| e.links(id)))
                .map(|e| e.id.clone())
                .collect()
        });
        for epic_id in epic_ids {
            if let Err(err) = self.recalc_epic_progress(&epic_id).await {
                tracing::warn!(epic = %epic_id, error = %err, "epic progress refresh failed");
            }
        }
    }

    /// Set an issue to `reopened` and prepend a reopen entry, whatever its
    /// current status.
    pub async fn reopen_issue(&self, id: &str) -> Result<Issue> {
        let current = self.cached::<Issue>(id)?;
        let mut activity = Vec::with_capacity(current.activity.len() + 1);
        activity.push(ActivityEntry::reopened(self.settings.user.as_str()));
        activity.extend(current.activity);
        let patch = IssuePatch {
            status: Some(IssueStatus::Reopened),
            activity: Some(activity),
            ..IssuePatch::default()
        };
        self.update::<Issue>(Operation::ReopenIssue, id, patch).await
    }

    /// Flip an issue's local selection flag. Returns the new state.
    pub fn toggle_issue_selection(&self, id: &str) -> Result<bool> {
        let mut state = self.lock();
        let mut issue = state
            .cache
            .get::<Issue>(id)
            .cloned()
            .ok_or_else(|| not_cached::<Issue>(id))?;
        issue.selected = !issue.selected;
        let selected = issue.selected;
        state.cache.upsert(issue);
        Ok(selected)
    }

    /// Apply `action` to every selected issue.
    ///
    /// Each issue is handled independently. Local changes are applied up
    /// front and never rolled back; failures are collected into one
    /// [`Error::Bulk`]. Selection is cleared on the targeted issues. Returns
    /// the targeted IDs.
    pub async fn bulk_issues(&self, action: BulkAction) -> Result<Vec<String>> {
        let operation = action.operation();
        let targets: Vec<String> = {
            let mut state = self.lock();
            let targets: Vec<String> = state
                .cache
                .list_where::<Issue>(|i| i.selected)
                .into_iter()
                .map(|i| i.id.clone())
                .collect();
            for id in &targets {
                match &action {
                    BulkAction::Delete => {
                        state.cache.remove::<Issue>(id);
                    }
                    BulkAction::Update(patch) => {
                        if let Some(mut issue) = state.cache.get::<Issue>(id).cloned() {
                            issue.apply(patch);
                            issue.selected = false;
                            state.cache.upsert(issue);
                        }
                    }
                }
                state.saving.insert(SavingEntry {
                    kind: Issue::KIND,
                    id: id.clone(),
                });
            }
            targets
        };
        if targets.is_empty() {
            return Ok(targets);
        }
        tracing::debug!(operation = operation.as_str(), count = targets.len(), "bulk apply");

        let failures: Vec<BulkFailure> = match &action {
            BulkAction::Delete => {
                let results =
                    join_all(targets.iter().map(|id| self.remote.delete::<Issue>(id))).await;
                let mut state = self.lock();
                targets
                    .iter()
                    .zip(results)
                    .filter_map(|(id, result)| {
                        state.saving.remove(&SavingEntry {
                            kind: Issue::KIND,
                            id: id.clone(),
                        });
                        result.err().map(|e| BulkFailure::new(id.clone(), &e))
                    })
                    .collect()
            }
            BulkAction::Update(patch) => {
                let results =
                    join_all(targets.iter().map(|id| self.remote.update::<Issue>(id, patch))).await;
                let mut state = self.lock();
                let mut failures = Vec::new();
                for (id, result) in targets.iter().zip(results) {
                    state.saving.remove(&SavingEntry {
                        kind: Issue::KIND,
                        id: id.clone(),
                    });
                    match result {
                        Ok(confirmed) => {
                            super::CacheWrite::Refresh(confirmed).apply(&mut state.cache)
                        }
                        Err(e) => failures.push(BulkFailure::new(id.clone(), &e)),
                    }
                }
                failures
            }
        };

        if failures.is_empty() {
            self.notify_success(match action {
                BulkAction::Delete => "Issues deleted",
                BulkAction::Update(_) => "Issues updated",
            });
            tracing::info!(operation = operation.as_str(), count = targets.len(), "bulk complete");
            return Ok(targets);
        }

        self.notify_error(match action {
            BulkAction::Delete => "Some deletions failed.",
            BulkAction::Update(_) => "Some updates failed.",
        });
        tracing::warn!(
            operation = operation.as_str(),
            failed = failures.len(),
            attempted = targets.len(),
            "bulk partially failed"
        );
        Err(Error::Bulk {
            operation,
            attempted: targets.len(),
            failures,
        })
    }

    /// Prepend a comment to a task's or issue's activity log.
    pub async fn add_comment(
        &self,
        id: &str,
        target: CommentTarget,
        text: &str,
    ) -> Result<ActivityEntry> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("comment cannot be empty".to_string()));
        }
        let entry = ActivityEntry::comment(text, self.settings.user.as_str());

        match target {
            CommentTarget::Task => {
                let current = self.cached::<Task>(id)?;
                let mut activity = vec![entry.clone()];
                activity.extend(current.activity);
                let patch = TaskPatch {
                    activity: Some(activity),
                    ..TaskPatch::default()
                };
                self.update::<Task>(Operation::AddComment, id, patch).await?;
            }
            CommentTarget::Issue => {
                let current = self.cached::<Issue>(id)?;
                let mut activity = vec![entry.clone()];
                activity.extend(current.activity);
                let patch = IssuePatch {
                    activity: Some(activity),
                    ..IssuePatch::default()
                };
                self.update::<Issue>(Operation::AddComment, id, patch).await?;
            }
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncSettings;
    use crate::remote::{MemoryTransport, RemoteStore};
    use std::sync::Arc;

    fn engine() -> SyncEngine {
        let remote = RemoteStore::new(Arc::new(MemoryTransport::new()));
        SyncEngine::new(remote, SyncSettings::default())
    }

    #[tokio::test]
    async fn test_blank_comment_rejected() {
        let engine = engine();
        let err = engine
            .add_comment("1", CommentTarget::Task, "  \n")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_bulk_with_nothing_selected_is_a_no_op() {
        let engine = engine();
        let targeted = engine.bulk_issues(BulkAction::Delete).await.unwrap();
        assert!(targeted.is_empty());
        assert!(engine.notifications().is_empty());
    }

    #[test]
    fn test_toggle_unknown_issue() {
        let engine = engine();
        assert!(engine.toggle_issue_selection("3").is_err());
    }
}
