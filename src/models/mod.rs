//! Data models for scrumsync entities.
//!
//! This module defines the four synchronized collections:
//! - `Task` - Stories, tasks and bugs that live on a sprint board or the backlog
//! - `Issue` - Bug reports, questions and enhancement requests
//! - `Sprint` - Time-boxed iterations that own tasks
//! - `Epic` - Swim-lanes whose progress is derived from linked tasks
//!
//! Every entity also has a `*Patch` type (partial update) and, where the
//! engine creates it locally, a `New*` draft type.

pub mod progress;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The four entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Issue,
    Sprint,
    Epic,
}

impl EntityKind {
    /// Remote collection name.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Task => "tasks",
            EntityKind::Issue => "issues",
            EntityKind::Sprint => "sprints",
            EntityKind::Epic => "epics",
        }
    }

    /// Singular name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Issue => "issue",
            EntityKind::Sprint => "sprint",
            EntityKind::Epic => "epic",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Common behavior of every synchronized entity.
pub trait Entity: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Which collection this entity belongs to.
    const KIND: EntityKind;

    /// Partial update applied by `apply`.
    type Patch: Clone + Default + fmt::Debug + Send + Sync;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Shallow-merge a patch on top of this entity.
    fn apply(&mut self, patch: &Self::Patch);

    /// Carry local-only state over from the cached copy when an authoritative
    /// record replaces it.
    fn keep_local_state(&mut self, _cached: &Self) {}
}

/// Task status on the sprint board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    ReadyTest,
    ReadyDeploy,
    Done,
    Archived,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::New,
        TaskStatus::InProgress,
        TaskStatus::ReadyTest,
        TaskStatus::ReadyDeploy,
        TaskStatus::Done,
        TaskStatus::Archived,
    ];

    /// Parse from the wire value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(TaskStatus::New),
            "in-progress" => Some(TaskStatus::InProgress),
            "ready-test" => Some(TaskStatus::ReadyTest),
            "ready-deploy" => Some(TaskStatus::ReadyDeploy),
            "done" => Some(TaskStatus::Done),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::ReadyTest => "ready-test",
            TaskStatus::ReadyDeploy => "ready-deploy",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        }
    }

    /// Column label shown to users and written into activity entries.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::New => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::ReadyTest => "Ready for Test",
            TaskStatus::ReadyDeploy => "Ready to Deploy",
            TaskStatus::Done => "Done",
            TaskStatus::Archived => "Archived",
        }
    }

    /// `done` and `archived` end a task's life within a sprint.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Archived)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Issue status. Shares the task vocabulary and adds `reopened`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    #[default]
    New,
    InProgress,
    ReadyTest,
    ReadyDeploy,
    Done,
    Archived,
    Reopened,
}

impl IssueStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reopened" => Some(IssueStatus::Reopened),
            other => TaskStatus::parse(other).map(IssueStatus::from),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::New => "new",
            IssueStatus::InProgress => "in-progress",
            IssueStatus::ReadyTest => "ready-test",
            IssueStatus::ReadyDeploy => "ready-deploy",
            IssueStatus::Done => "done",
            IssueStatus::Archived => "archived",
            IssueStatus::Reopened => "reopened",
        }
    }
}

impl From<TaskStatus> for IssueStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::New => IssueStatus::New,
            TaskStatus::InProgress => IssueStatus::InProgress,
            TaskStatus::ReadyTest => IssueStatus::ReadyTest,
            TaskStatus::ReadyDeploy => IssueStatus::ReadyDeploy,
            TaskStatus::Done => IssueStatus::Done,
            TaskStatus::Archived => IssueStatus::Archived,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority shared by tasks and issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
    Wishlist,
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "normal" => Some(Priority::Normal),
            "low" => Some(Priority::Low),
            "wishlist" => Some(Priority::Wishlist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Wishlist => "wishlist",
        }
    }
}

/// Kind of work item on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Story,
    #[default]
    Task,
    Bug,
}

impl TaskType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "story" => Some(TaskType::Story),
            "task" => Some(TaskType::Task),
            "bug" => Some(TaskType::Bug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Story => "story",
            TaskType::Task => "task",
            TaskType::Bug => "bug",
        }
    }
}

/// Kind of issue report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    #[default]
    Bug,
    Question,
    Enhancement,
}

impl IssueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bug" => Some(IssueType::Bug),
            "question" => Some(IssueType::Question),
            "enhancement" => Some(IssueType::Enhancement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Bug => "bug",
            IssueType::Question => "question",
            IssueType::Enhancement => "enhancement",
        }
    }
}

/// Sprint lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintStatus {
    #[default]
    Planning,
    Active,
    Completed,
}

impl SprintStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(SprintStatus::Planning),
            "active" => Some(SprintStatus::Active),
            "completed" => Some(SprintStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SprintStatus::Planning => "planning",
            SprintStatus::Active => "active",
            SprintStatus::Completed => "completed",
        }
    }
}

/// A checklist item inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default, deserialize_with = "crate::remote::wire::lenient_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub done: bool,
    /// Fields written by other clients, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subtask {
    pub fn new(id: impl Into<String>, title: impl Into<String>, done: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            done,
            extra: Map::new(),
        }
    }
}

/// What an activity entry records.
///
/// Kinds this client does not know are kept verbatim so rewriting a record
/// never changes another client's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Created,
    #[default]
    Status,
    Comment,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Created => "created",
            ActivityKind::Status => "status",
            ActivityKind::Comment => "comment",
            ActivityKind::Other(kind) => kind,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "created" => ActivityKind::Created,
            "status" => ActivityKind::Status,
            "comment" => ActivityKind::Comment,
            _ => ActivityKind::Other(kind),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

/// One line of a task's or issue's activity log (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, deserialize_with = "crate::remote::wire::lenient_id")]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: ActivityKind,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub user: String,

    /// Free-form time marker (RFC 3339 for locally generated entries)
    #[serde(default)]
    pub time: String,

    /// Fields written by other clients, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityEntry {
    /// Create an entry stamped with the current time and a fresh ID.
    pub fn new(kind: ActivityKind, text: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: format!("act-{}", uuid::Uuid::new_v4().simple()),
            kind,
            text: text.into(),
            user: user.into(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            extra: Map::new(),
        }
    }

    /// Entry recorded when a task changes board column.
    pub fn moved(to: TaskStatus, user: impl Into<String>) -> Self {
        Self::new(ActivityKind::Status, format!("Moved to {}", to.label()), user)
    }

    /// Entry recorded when an issue is reopened.
    pub fn reopened(user: impl Into<String>) -> Self {
        Self::new(ActivityKind::Status, "Issue reopened", user)
    }

    pub fn comment(text: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(ActivityKind::Comment, text, user)
    }
}

/// A story, task or bug on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Remote ID, or `tmp-N` until creation is confirmed
    pub id: String,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    pub title: String,

    pub desc: String,

    pub status: TaskStatus,

    pub priority: Priority,

    /// Owning sprint; `None` means backlog
    pub sprint_id: Option<String>,

    pub assignee_id: Option<String>,

    /// Story points
    pub points: u32,

    pub tags: Vec<String>,

    pub due_date: Option<NaiveDate>,

    pub subtasks: Vec<Subtask>,

    /// Activity log, newest first
    pub activity: Vec<ActivityEntry>,

    pub created_date: NaiveDate,
}

impl Task {
    /// Create a task with default fields.
    pub fn new(id: String, title: String) -> Self {
        Self {
            id,
            task_type: TaskType::default(),
            title,
            desc: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            sprint_id: None,
            assignee_id: None,
            points: 1,
            tags: Vec::new(),
            due_date: None,
            subtasks: Vec::new(),
            activity: Vec::new(),
            created_date: Utc::now().date_naive(),
        }
    }

    /// Build the optimistic entity for a draft under a temporary ID.
    pub fn from_draft(id: String, draft: &NewTask) -> Self {
        let mut task = Self::new(id, draft.title.clone());
        task.task_type = draft.task_type;
        task.desc = draft.desc.clone();
        task.status = draft.status;
        task.priority = draft.priority;
        task.sprint_id = draft.sprint_id.clone();
        task.assignee_id = draft.assignee_id.clone();
        task.points = draft.points;
        task.tags = draft.tags.clone();
        task.due_date = draft.due_date;
        task
    }
}

/// Partial update for a task. `None` leaves a field untouched; nullable
/// fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub task_type: Option<TaskType>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub sprint_id: Option<Option<String>>,
    pub assignee_id: Option<Option<String>>,
    pub points: Option<u32>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub activity: Option<Vec<ActivityEntry>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;
    type Patch = TaskPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn apply(&mut self, patch: &TaskPatch) {
        if let Some(v) = patch.task_type {
            self.task_type = v;
        }
        if let Some(ref v) = patch.title {
            self.title = v.clone();
        }
        if let Some(ref v) = patch.desc {
            self.desc = v.clone();
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.priority {
            self.priority = v;
        }
        if let Some(ref v) = patch.sprint_id {
            self.sprint_id = v.clone();
        }
        if let Some(ref v) = patch.assignee_id {
            self.assignee_id = v.clone();
        }
        if let Some(v) = patch.points {
            self.points = v;
        }
        if let Some(ref v) = patch.tags {
            self.tags = v.clone();
        }
        if let Some(v) = patch.due_date {
            self.due_date = v;
        }
        if let Some(ref v) = patch.subtasks {
            self.subtasks = v.clone();
        }
        if let Some(ref v) = patch.activity {
            self.activity = v.clone();
        }
    }
}

/// Fields supplied by the caller when creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub task_type: TaskType,
    pub title: String,
    pub desc: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub sprint_id: Option<String>,
    pub assignee_id: Option<String>,
    pub points: u32,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::default(),
            title: title.into(),
            desc: String::new(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            sprint_id: None,
            assignee_id: None,
            points: 1,
            tags: Vec::new(),
            due_date: None,
        }
    }

    pub fn in_sprint(mut self, sprint_id: impl Into<String>) -> Self {
        self.sprint_id = Some(sprint_id.into());
        self
    }
}

/// A bug report, question or enhancement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,

    #[serde(rename = "type")]
    pub issue_type: IssueType,

    pub title: String,

    pub desc: String,

    pub status: IssueStatus,

    pub priority: Priority,

    pub assignee_id: Option<String>,

    pub tags: Vec<String>,

    pub due_date: Option<NaiveDate>,

    pub activity: Vec<ActivityEntry>,

    pub created_date: NaiveDate,

    /// Local-only bulk selection flag; never sent to the remote store
    pub selected: bool,
}

impl Issue {
    pub fn new(id: String, title: String) -> Self {
        Self {
            id,
            issue_type: IssueType::default(),
            title,
            desc: String::new(),
            status: IssueStatus::default(),
            priority: Priority::default(),
            assignee_id: None,
            tags: Vec::new(),
            due_date: None,
            activity: Vec::new(),
            created_date: Utc::now().date_naive(),
            selected: false,
        }
    }

    pub fn from_draft(id: String, draft: &NewIssue) -> Self {
        let mut issue = Self::new(id, draft.title.clone());
        issue.issue_type = draft.issue_type;
        issue.desc = draft.desc.clone();
        issue.priority = draft.priority;
        issue.assignee_id = draft.assignee_id.clone();
        issue.tags = draft.tags.clone();
        issue.due_date = draft.due_date;
        issue
    }
}

/// Partial update for an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuePatch {
    pub issue_type: Option<IssueType>,
    pub title: Option<String>,
    pub desc: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub activity: Option<Vec<ActivityEntry>>,
}

impl Entity for Issue {
    const KIND: EntityKind = EntityKind::Issue;
    type Patch = IssuePatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn apply(&mut self, patch: &IssuePatch) {
        if let Some(v) = patch.issue_type {
            self.issue_type = v;
        }
        if let Some(ref v) = patch.title {
            self.title = v.clone();
        }
        if let Some(ref v) = patch.desc {
            self.desc = v.clone();
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.priority {
            self.priority = v;
        }
        if let Some(ref v) = patch.assignee_id {
            self.assignee_id = v.clone();
        }
        if let Some(ref v) = patch.tags {
            self.tags = v.clone();
        }
        if let Some(v) = patch.due_date {
            self.due_date = v;
        }
        if let Some(ref v) = patch.activity {
            self.activity = v.clone();
        }
    }

    fn keep_local_state(&mut self, cached: &Self) {
        self.selected = cached.selected;
    }
}

/// Fields supplied by the caller when creating an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub issue_type: IssueType,
    pub title: String,
    pub desc: String,
    pub priority: Priority,
    pub assignee_id: Option<String>,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            issue_type: IssueType::default(),
            title: title.into(),
            desc: String::new(),
            priority: Priority::default(),
            assignee_id: None,
            tags: Vec::new(),
            due_date: None,
        }
    }
}

/// A time-boxed iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: String,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: SprintStatus,
    pub goal: String,
    pub total_points: u32,
}

impl Sprint {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            start_date: None,
            end_date: None,
            status: SprintStatus::default(),
            goal: String::new(),
            total_points: 0,
        }
    }
}

/// Partial update for a sprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SprintPatch {
    pub name: Option<String>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub status: Option<SprintStatus>,
    pub goal: Option<String>,
    pub total_points: Option<u32>,
}

impl Entity for Sprint {
    const KIND: EntityKind = EntityKind::Sprint;
    type Patch = SprintPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn apply(&mut self, patch: &SprintPatch) {
        if let Some(ref v) = patch.name {
            self.name = v.clone();
        }
        if let Some(v) = patch.start_date {
            self.start_date = v;
        }
        if let Some(v) = patch.end_date {
            self.end_date = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(ref v) = patch.goal {
            self.goal = v.clone();
        }
        if let Some(v) = patch.total_points {
            self.total_points = v;
        }
    }
}

/// Default epic colors, assigned round-robin on creation.
pub const EPIC_COLORS: [&str; 6] = [
    "#6366f1", "#0891b2", "#a855f7", "#ea580c", "#16a34a", "#ef4444",
];

/// An epic swim-lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epic {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Derived completion percentage (0-100) over linked tasks
    pub progress_pct: u8,
    pub desc: String,
    pub linked_task_ids: Vec<String>,
}

impl Epic {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            color: EPIC_COLORS[0].to_string(),
            progress_pct: 0,
            desc: String::new(),
            linked_task_ids: Vec::new(),
        }
    }

    pub fn links(&self, task_id: &str) -> bool {
        self.linked_task_ids.iter().any(|id| id == task_id)
    }
}

/// Partial update for an epic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpicPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub progress_pct: Option<u8>,
    pub desc: Option<String>,
    pub linked_task_ids: Option<Vec<String>>,
}

impl Entity for Epic {
    const KIND: EntityKind = EntityKind::Epic;
    type Patch = EpicPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn apply(&mut self, patch: &EpicPatch) {
        if let Some(ref v) = patch.name {
            self.name = v.clone();
        }
        if let Some(ref v) = patch.color {
            self.color = v.clone();
        }
        if let Some(v) = patch.progress_pct {
            self.progress_pct = v.min(100);
        }
        if let Some(ref v) = patch.desc {
            self.desc = v.clone();
        }
        if let Some(ref v) = patch.linked_task_ids {
            self.linked_task_ids = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_names() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("reopened"), None);
        assert_eq!(
            serde_json::to_string(&TaskStatus::ReadyDeploy).unwrap(),
            "\"ready-deploy\""
        );
    }

    #[test]
    fn test_issue_status_allows_reopened() {
        assert_eq!(IssueStatus::parse("reopened"), Some(IssueStatus::Reopened));
        assert_eq!(IssueStatus::parse("ready-test"), Some(IssueStatus::ReadyTest));
        assert_eq!(IssueStatus::from(TaskStatus::Done), IssueStatus::Done);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Archived.is_terminal());
        assert!(!TaskStatus::ReadyDeploy.is_terminal());
    }

    #[test]
    fn test_task_patch_only_touches_set_fields() {
        let mut task = Task::new("1".to_string(), "Write docs".to_string());
        task.sprint_id = Some("s1".to_string());
        let before = task.clone();

        task.apply(&TaskPatch::status(TaskStatus::InProgress));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.sprint_id, before.sprint_id);
        assert_eq!(task.title, before.title);

        task.apply(&TaskPatch {
            sprint_id: Some(None),
            ..TaskPatch::default()
        });
        assert_eq!(task.sprint_id, None);
    }

    #[test]
    fn test_epic_patch_clamps_progress() {
        let mut epic = Epic::new("e1".to_string(), "Auth".to_string());
        epic.apply(&EpicPatch {
            progress_pct: Some(140),
            ..EpicPatch::default()
        });
        assert_eq!(epic.progress_pct, 100);
    }

    #[test]
    fn test_moved_entry_uses_column_label() {
        let entry = ActivityEntry::moved(TaskStatus::ReadyTest, "Alice");
        assert_eq!(entry.text, "Moved to Ready for Test");
        assert_eq!(entry.kind, ActivityKind::Status);
        assert!(entry.id.starts_with("act-"));
    }
}
