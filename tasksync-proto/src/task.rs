//! Task wire types for the Task Store contract.
//!
//! A [`Task`] is owned by the Task Store; clients only ever hold a cached
//! copy. Updates are partial: [`UpdateTaskRequest`] carries any subset of
//! title, description and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp;

/// Store-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Wraps a raw store identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw store identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status partition of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is open.
    #[default]
    Open,
    /// Task has been completed.
    Completed,
}

impl TaskStatus {
    /// Returns the wire/query-string form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
        }
    }

    /// Returns the other status (open ⇄ completed).
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Completed,
            Self::Completed => Self::Open,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A task as returned by the Task Store.
///
/// Invariant: `completed_at` is `Some` if and only if `status` is
/// [`TaskStatus::Completed`]. See [`Task::is_consistent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier.
    pub id: TaskId,
    /// Task title (required, non-empty).
    pub title: String,
    /// Free-form description; `null` on the wire is read as empty.
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    /// Open or completed.
    pub status: TaskStatus,
    /// Display name of the creator.
    pub created_by: String,
    /// Creation time (UTC).
    #[serde(with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    /// Completion time (UTC), present only for completed tasks.
    #[serde(default, with = "timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Checks the `completed_at` ⇔ `status == Completed` invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        matches!(
            (self.status, self.completed_at),
            (TaskStatus::Completed, Some(_)) | (TaskStatus::Open, None)
        )
    }
}

/// Body of `POST /api/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Raw title as typed (trimmed).
    pub title: String,
    /// Raw description as typed (trimmed, may be empty).
    #[serde(default)]
    pub description: String,
    /// Whether server-side enrichment should run before persistence.
    #[serde(default = "default_use_ai")]
    pub use_ai: bool,
}

/// Response of `POST /api/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    /// Identifier of the new task.
    pub id: TaskId,
    /// Persisted title (may differ from the request after enrichment).
    pub title: String,
    /// Persisted description.
    #[serde(default)]
    pub description: String,
}

/// Body of `PUT /api/tasks/{id}`; absent fields are left untouched.
///
/// Title and description are always sent together by content edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl UpdateTaskRequest {
    /// Content update carrying both title and description.
    #[must_use]
    pub const fn content(title: String, description: String) -> Self {
        Self {
            title: Some(title),
            description: Some(description),
            status: None,
        }
    }

    /// Status-only update.
    #[must_use]
    pub const fn status(status: TaskStatus) -> Self {
        Self {
            title: None,
            description: None,
            status: Some(status),
        }
    }
}

/// Query parameters of `GET /api/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListQuery {
    /// Status partition to list.
    #[serde(default)]
    pub status: TaskStatus,
    /// Normalized search filter; omitted when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl TaskListQuery {
    /// Builds a query, dropping an empty search string.
    #[must_use]
    pub fn new(status: TaskStatus, search: &str) -> Self {
        let search = search.trim();
        Self {
            status,
            search: (!search.is_empty()).then(|| search.to_string()),
        }
    }
}

/// Store search semantics: case-insensitive substring match against the
/// title, the description, or any message content of the task.
#[must_use]
pub fn matches_search<'a>(
    task: &Task,
    mut message_contents: impl Iterator<Item = &'a str>,
    needle: &str,
) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(&needle)
        || task.description.to_lowercase().contains(&needle)
        || message_contents.any(|c| c.to_lowercase().contains(&needle))
}

const fn default_use_ai() -> bool {
    true
}

fn nullable_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}
