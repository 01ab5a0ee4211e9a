//! In-memory task and message store.
//!
//! Holds the authoritative collections behind the HTTP API. Ordering and
//! search follow the store contract: tasks newest first, messages oldest
//! first, search over title, description and message content. Timestamps
//! have whole-second precision; ties are broken by id.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use tasksync_proto::api::StoreConfig;
use tasksync_proto::message::{
    EditMessageRequest, Message, MessageId, SendMessageRequest, SentMessage, ValidationError,
    normalize_required,
};
use tasksync_proto::task::{
    CreateTaskRequest, CreatedTask, Task, TaskId, TaskListQuery, TaskStatus, UpdateTaskRequest,
    matches_search,
};

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No task with this id.
    #[error("Task not found")]
    TaskNotFound,
    /// No message with this id.
    #[error("Message not found")]
    MessageNotFound,
    /// A required field was empty or too large.
    #[error("invalid {field}: {source}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Validation failure.
        source: ValidationError,
    },
}

fn required(field: &'static str, raw: &str) -> Result<String, StoreError> {
    normalize_required(raw).map_err(|source| StoreError::Invalid { field, source })
}

/// Rewrites submitted content before persistence when enrichment runs.
///
/// The development store has no rewriting model; enrichment keeps the
/// content as submitted.
fn enrich(content: &str) -> String {
    content.to_string()
}

struct Inner {
    tasks: Vec<Task>,
    messages: Vec<StoredMessage>,
    next_task_id: i64,
    next_message_id: i64,
}

struct StoredMessage {
    message: Message,
    original_content: String,
}

/// Thread-safe in-memory store.
pub struct TaskStore {
    inner: Mutex<Inner>,
    ai_available: bool,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(ai_available: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: Vec::new(),
                messages: Vec::new(),
                next_task_id: 1,
                next_message_id: 1,
            }),
            ai_available,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }

    /// Store capabilities.
    #[must_use]
    pub const fn config(&self) -> StoreConfig {
        StoreConfig {
            ai_available: self.ai_available,
        }
    }

    /// Tasks of one status partition matching the search, newest first.
    #[must_use]
    pub fn list_tasks(&self, query: &TaskListQuery) -> Vec<Task> {
        let inner = self.inner.lock();
        let needle = query.search.as_deref().unwrap_or_default();
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|t| t.status == query.status)
            .filter(|t| {
                let contents = inner
                    .messages
                    .iter()
                    .filter(|m| m.message.task_id == t.id)
                    .map(|m| m.message.content.as_str());
                matches_search(t, contents, needle)
            })
            .cloned()
            .collect();
        drop(inner);
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        tasks
    }

    /// One task.
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskNotFound`] if it does not exist.
    pub fn get_task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.inner
            .lock()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::TaskNotFound)
    }

    /// Creates an open task authored by `author`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] if the title is blank.
    pub fn create_task(
        &self,
        req: &CreateTaskRequest,
        author: &str,
    ) -> Result<CreatedTask, StoreError> {
        let mut title = required("title", &req.title)?;
        let mut description = req.description.trim().to_string();
        if req.use_ai && self.ai_available {
            title = enrich(&title);
            description = enrich(&description);
        }
        let mut inner = self.inner.lock();
        let id = TaskId::new(inner.next_task_id);
        inner.next_task_id += 1;
        inner.tasks.push(Task {
            id,
            title: title.clone(),
            description: description.clone(),
            status: TaskStatus::Open,
            created_by: author.to_string(),
            created_at: Self::now(),
            completed_at: None,
        });
        drop(inner);
        tracing::info!(%id, %author, "task created");
        Ok(CreatedTask {
            id,
            title,
            description,
        })
    }

    /// Applies a partial update. A status change maintains `completed_at`.
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskNotFound`] or [`StoreError::Invalid`] for a blank
    /// title.
    pub fn update_task(&self, id: TaskId, req: &UpdateTaskRequest) -> Result<(), StoreError> {
        let title = req.title.as_deref().map(|t| required("title", t)).transpose()?;
        let mut inner = self.inner.lock();
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::TaskNotFound)?;
        if let Some(status) = req.status {
            if status != task.status {
                task.completed_at = match status {
                    TaskStatus::Completed => Some(Self::now()),
                    TaskStatus::Open => None,
                };
            }
            task.status = status;
        }
        if let Some(title) = title {
            task.title = title;
            task.description = req
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
        }
        drop(inner);
        tracing::info!(%id, "task updated");
        Ok(())
    }

    /// Deletes a task and its messages.
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskNotFound`] if it does not exist.
    pub fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        if inner.tasks.len() == before {
            return Err(StoreError::TaskNotFound);
        }
        inner.messages.retain(|m| m.message.task_id != id);
        drop(inner);
        tracing::info!(%id, "task deleted");
        Ok(())
    }

    /// Messages of a task, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskNotFound`] if the task does not exist.
    pub fn list_messages(&self, task: TaskId) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock();
        if !inner.tasks.iter().any(|t| t.id == task) {
            return Err(StoreError::TaskNotFound);
        }
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.message.task_id == task)
            .map(|m| m.message.clone())
            .collect();
        drop(inner);
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    /// Appends a message to a task, keeping the submitted text alongside the
    /// persisted one.
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskNotFound`] or [`StoreError::Invalid`] for blank
    /// content.
    pub fn send_message(
        &self,
        task: TaskId,
        req: &SendMessageRequest,
        author: &str,
    ) -> Result<SentMessage, StoreError> {
        let original_content = required("content", &req.content)?;
        let content = if req.use_ai && self.ai_available {
            enrich(&original_content)
        } else {
            original_content.clone()
        };
        let mut inner = self.inner.lock();
        if !inner.tasks.iter().any(|t| t.id == task) {
            return Err(StoreError::TaskNotFound);
        }
        let id = MessageId::new(inner.next_message_id);
        inner.next_message_id += 1;
        inner.messages.push(StoredMessage {
            message: Message {
                id,
                task_id: task,
                user_name: author.to_string(),
                content: content.clone(),
                is_edited: false,
                created_at: Self::now(),
            },
            original_content: original_content.clone(),
        });
        drop(inner);
        tracing::info!(%task, message = %id, %author, "message added");
        Ok(SentMessage {
            id,
            content,
            original_content,
        })
    }

    /// Replaces message content and marks it edited. Never enriched.
    ///
    /// # Errors
    ///
    /// [`StoreError::MessageNotFound`] or [`StoreError::Invalid`].
    pub fn edit_message(&self, id: MessageId, req: &EditMessageRequest) -> Result<(), StoreError> {
        let content = required("content", &req.content)?;
        let mut inner = self.inner.lock();
        let stored = inner
            .messages
            .iter_mut()
            .find(|m| m.message.id == id)
            .ok_or(StoreError::MessageNotFound)?;
        stored.message.content = content;
        stored.message.is_edited = true;
        drop(inner);
        tracing::info!(message = %id, "message edited");
        Ok(())
    }

    /// Deletes a message.
    ///
    /// # Errors
    ///
    /// [`StoreError::MessageNotFound`] if it does not exist.
    pub fn delete_message(&self, id: MessageId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.messages.len();
        inner.messages.retain(|m| m.message.id != id);
        if inner.messages.len() == before {
            return Err(StoreError::MessageNotFound);
        }
        Ok(())
    }

    /// Content of a message as originally submitted.
    #[must_use]
    pub fn original_content(&self, id: MessageId) -> Option<String> {
        self.inner
            .lock()
            .messages
            .iter()
            .find(|m| m.message.id == id)
            .map(|m| m.original_content.clone())
    }
}

/// Display names bound to session cookies by `POST /api/identify`.
#[derive(Default)]
pub struct SessionRegistry {
    names: Mutex<HashMap<String, String>>,
    next: Mutex<u64>,
}

/// Author used when a request carries no identified session.
pub const ANONYMOUS: &str = "Anonymous";

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `session`, allocating a session id if none is given.
    /// Returns the session id.
    pub fn identify(&self, session: Option<&str>, name: &str) -> String {
        let session = session.map_or_else(
            || {
                let mut next = self.next.lock();
                *next += 1;
                let id = *next;
                format!("s{id}")
            },
            str::to_string,
        );
        self.names.lock().insert(session.clone(), name.to_string());
        session
    }

    /// Display name of `session`, or [`ANONYMOUS`].
    #[must_use]
    pub fn author(&self, session: Option<&str>) -> String {
        session
            .and_then(|s| self.names.lock().get(s).cloned())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }
}
