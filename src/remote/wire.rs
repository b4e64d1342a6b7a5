//! Record mapping between entities and the remote store's wire shape.
//!
//! Wire records are flat JSON objects with snake_case keys. Array-valued
//! fields (`tags`, `subtasks`, `activity`, `linked_stories`) travel as
//! JSON-encoded strings; anything malformed or absent decodes to an empty
//! array. Nothing outside this module sees the string encoding.

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use super::RemoteError;
use crate::models::{
    ActivityEntry, EPIC_COLORS, Entity, Epic, Issue, IssueStatus, IssueType, Priority, Sprint,
    SprintStatus, Subtask, Task, TaskStatus, TaskType,
};

/// An entity that can be mapped to and from a wire record.
pub trait WireRecord: Entity {
    /// Decode a record returned by the store.
    fn from_wire(value: Value) -> Result<Self, RemoteError>;

    /// Encode the mapped fields sent on create/replace (no `id`).
    fn to_wire(&self) -> Value;
}

/// Unwrap whatever shape a list endpoint returned.
pub fn rows(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => items,
            _ => match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    }
}

/// Decode a JSON-string (or already structured) array field.
///
/// Elements are decoded one at a time; an element that does not fit `T` is
/// dropped without taking its neighbours with it.
pub fn decode_array<T: DeserializeOwned>(value: &Value) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) if !s.is_empty() && s != "null" => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => items,
                _ => return Vec::new(),
            }
        }
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable array element");
                None
            }
        })
        .collect()
}

/// Encode an array field as a JSON string.
pub fn encode_array<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn json_array<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decode_array(&value))
}

pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Accept numbers, numeric strings and null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Accept any scalar as an optional string; numbers are stringified.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string.
fn parse_date(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?;
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn format_date(date: Option<NaiveDate>) -> Value {
    match date {
        Some(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}

fn non_negative(n: Option<f64>) -> Option<u32> {
    n.filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.min(u32::MAX as f64) as u32)
}

#[derive(Deserialize)]
struct TaskRecord {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    #[serde(default, rename = "type")]
    task_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    sprint_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    assignee_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pts: Option<f64>,
    #[serde(default, deserialize_with = "json_array")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    due_date: Option<String>,
    #[serde(default, deserialize_with = "json_array")]
    subtasks: Vec<Subtask>,
    #[serde(default, deserialize_with = "json_array")]
    activity: Vec<ActivityEntry>,
    #[serde(default)]
    created_at: Option<String>,
}

impl WireRecord for Task {
    fn from_wire(value: Value) -> Result<Self, RemoteError> {
        let r: TaskRecord = decode(value)?;
        Ok(Task {
            id: r.id,
            task_type: r.task_type.as_deref().and_then(TaskType::parse).unwrap_or_default(),
            title: r.title.unwrap_or_default(),
            desc: r.description.unwrap_or_default(),
            status: r.status.as_deref().and_then(TaskStatus::parse).unwrap_or_default(),
            priority: r.priority.as_deref().and_then(Priority::parse).unwrap_or_default(),
            sprint_id: r.sprint_id,
            assignee_id: r.assignee_id,
            points: non_negative(r.pts).unwrap_or(1),
            tags: r.tags,
            due_date: parse_date(r.due_date.as_deref()),
            subtasks: r.subtasks,
            activity: r.activity,
            created_date: parse_date(r.created_at.as_deref())
                .unwrap_or_else(|| Utc::now().date_naive()),
        })
    }

    fn to_wire(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.desc,
            "type": self.task_type.as_str(),
            "status": self.status.as_str(),
            "priority": self.priority.as_str(),
            "sprint_id": self.sprint_id,
            "assignee_id": self.assignee_id,
            "pts": self.points,
            "tags": encode_array(&self.tags),
            "due_date": format_date(self.due_date),
            "subtasks": encode_array(&self.subtasks),
            "activity": encode_array(&self.activity),
        })
    }
}

#[derive(Deserialize)]
struct IssueRecord {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    #[serde(default, rename = "type")]
    issue_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    assignee_id: Option<String>,
    #[serde(default, deserialize_with = "json_array")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    due_date: Option<String>,
    #[serde(default, deserialize_with = "json_array")]
    activity: Vec<ActivityEntry>,
    #[serde(default)]
    created_at: Option<String>,
}

impl WireRecord for Issue {
    fn from_wire(value: Value) -> Result<Self, RemoteError> {
        let r: IssueRecord = decode(value)?;
        Ok(Issue {
            id: r.id,
            issue_type: r.issue_type.as_deref().and_then(IssueType::parse).unwrap_or_default(),
            title: r.title.unwrap_or_default(),
            desc: r.description.unwrap_or_default(),
            status: r.status.as_deref().and_then(IssueStatus::parse).unwrap_or_default(),
            priority: r.priority.as_deref().and_then(Priority::parse).unwrap_or_default(),
            assignee_id: r.assignee_id,
            tags: r.tags,
            due_date: parse_date(r.due_date.as_deref()),
            activity: r.activity,
            created_date: parse_date(r.created_at.as_deref())
                .unwrap_or_else(|| Utc::now().date_naive()),
            selected: false,
        })
    }

    fn to_wire(&self) -> Value {
        json!({
            "title": self.title,
            "description": self.desc,
            "type": self.issue_type.as_str(),
            "status": self.status.as_str(),
            "priority": self.priority.as_str(),
            "assignee_id": self.assignee_id,
            "tags": encode_array(&self.tags),
            "due_date": format_date(self.due_date),
            "activity": encode_array(&self.activity),
        })
    }
}

#[derive(Deserialize)]
struct SprintRecord {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    end_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    goal: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    total_points: Option<f64>,
}

impl WireRecord for Sprint {
    fn from_wire(value: Value) -> Result<Self, RemoteError> {
        let r: SprintRecord = decode(value)?;
        Ok(Sprint {
            id: r.id,
            name: r
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Sprint".to_string()),
            start_date: parse_date(r.start_date.as_deref()),
            end_date: parse_date(r.end_date.as_deref()),
            status: r.status.as_deref().and_then(SprintStatus::parse).unwrap_or_default(),
            goal: r.goal.unwrap_or_default(),
            total_points: non_negative(r.total_points).unwrap_or(0),
        })
    }

    fn to_wire(&self) -> Value {
        json!({
            "name": self.name,
            "start_date": format_date(self.start_date),
            "end_date": format_date(self.end_date),
            "status": self.status.as_str(),
            "goal": self.goal,
            "total_points": self.total_points,
        })
    }
}

#[derive(Deserialize)]
struct EpicRecord {
    #[serde(deserialize_with = "lenient_id")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    color: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "json_array")]
    linked_stories: Vec<Value>,
}

impl WireRecord for Epic {
    fn from_wire(value: Value) -> Result<Self, RemoteError> {
        let r: EpicRecord = decode(value)?;
        Ok(Epic {
            id: r.id,
            name: r
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Epic".to_string()),
            color: r
                .color
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| EPIC_COLORS[0].to_string()),
            progress_pct: non_negative(r.progress).unwrap_or(0).min(100) as u8,
            desc: r.description.unwrap_or_default(),
            // Linked IDs may have been stored as numbers
            linked_task_ids: r
                .linked_stories
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        })
    }

    fn to_wire(&self) -> Value {
        json!({
            "name": self.name,
            "color": self.color,
            "progress": self.progress_pct,
            "description": self.desc,
            "linked_stories": encode_array(&self.linked_task_ids),
        })
    }
}
