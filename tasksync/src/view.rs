//! View-model vocabulary shared by the engine and the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasksync_proto::message::MessageId;
use tasksync_proto::task::Task;

/// An editable field of the view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// Title of the task shown in the detail view.
    TaskTitle,
    /// Description of the task shown in the detail view.
    TaskDescription,
    /// Content of one chat message.
    Message(MessageId),
}

impl FieldId {
    /// The lock scope this field's edit session occupies.
    ///
    /// Title and description share the task-detail scope, so at most one of
    /// them is under edit at any time.
    #[must_use]
    pub const fn scope(self) -> LockScope {
        match self {
            Self::TaskTitle | Self::TaskDescription => LockScope::TaskDetail,
            Self::Message(id) => LockScope::Message(id),
        }
    }

    /// Editor kind the presentation layer uses for this field.
    #[must_use]
    pub const fn default_kind(self) -> FieldKind {
        match self {
            Self::TaskTitle => FieldKind::SingleLine,
            Self::TaskDescription | Self::Message(_) => FieldKind::MultiLine,
        }
    }

    /// Whether an empty value is invalid for this field.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Self::TaskTitle | Self::Message(_))
    }
}

/// Exclusive region guarded by the edit lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScope {
    /// All task-detail fields.
    TaskDetail,
    /// A single message.
    Message(MessageId),
}

/// Editor flavour of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One line; Enter commits.
    SingleLine,
    /// Several lines; Shift+Enter inserts a newline, Enter commits.
    MultiLine,
}

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No identity; the user must sign in.
    SignIn,
    /// The partitioned, searchable task list.
    TaskList,
    /// One task with its chat.
    TaskDetail(tasksync_proto::task::TaskId),
}

/// Category of a blocking user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// An optimistic update was rolled back.
    SaveFailed,
    /// The opened task no longer exists.
    TaskNotFound,
    /// A delete was refused by the store.
    DeleteFailed,
    /// A load failed for a reason other than auth or not-found.
    LoadFailed,
}

/// A blocking notice the user must dismiss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Category.
    pub kind: NoticeKind,
    /// Text shown to the user.
    pub text: String,
}

impl Notice {
    /// Builds a notice.
    pub fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Task list projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Cards in store order.
    #[default]
    Card,
    /// Table rows sorted by creation time.
    Table,
}

impl ViewMode {
    /// The other mode.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Card => Self::Table,
            Self::Table => Self::Card,
        }
    }
}

/// Table sort order by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// The other order.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Time a task has been open (or took, once completed) as `Hh Mm Ss`.
#[must_use]
pub fn format_elapsed(task: &Task, now: DateTime<Utc>) -> String {
    let end = task.completed_at.unwrap_or(now);
    let secs = (end - task.created_at).num_seconds().max(0);
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
