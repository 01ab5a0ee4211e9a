//! Chat message wire types for the Task Store contract.
//!
//! Messages hang off a parent task. Sending may trigger server-side
//! enrichment, so the persisted `content` can differ from what was typed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;
use crate::timestamp;

/// Maximum accepted content size in bytes (64 KB).
pub const MAX_CONTENT_SIZE: usize = 64 * 1024;

/// Store-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
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

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat message attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Parent task.
    pub task_id: TaskId,
    /// Display name of the author.
    pub user_name: String,
    /// Persisted content (never empty).
    pub content: String,
    /// Whether the content was edited after sending.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_edited: bool,
    /// Creation time (UTC).
    #[serde(with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/tasks/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Raw content as typed (trimmed).
    pub content: String,
    /// Whether server-side enrichment should run before persistence.
    #[serde(default = "default_use_ai")]
    pub use_ai: bool,
}

/// Response of `POST /api/tasks/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Identifier of the new message.
    pub id: MessageId,
    /// Persisted (possibly enriched) content.
    pub content: String,
    /// Content exactly as submitted.
    pub original_content: String,
}

/// Body of `PUT /api/messages/{id}`. Edits are never enriched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMessageRequest {
    /// Replacement content (trimmed, non-empty).
    pub content: String,
}

/// Errors from client-side content validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Content is empty after trimming.
    #[error("content is empty")]
    Empty,
    /// Content exceeds the maximum allowed size.
    #[error("content too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
}

/// Trims `raw` and checks it is usable as required content.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] for blank input, or
/// [`ValidationError::TooLarge`] above [`MAX_CONTENT_SIZE`].
pub fn normalize_required(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if trimmed.len() > MAX_CONTENT_SIZE {
        return Err(ValidationError::TooLarge {
            size: trimmed.len(),
            max: MAX_CONTENT_SIZE,
        });
    }
    Ok(trimmed.to_string())
}

const fn default_use_ai() -> bool {
    true
}

/// Accepts `true`/`false` as well as the `0`/`1` integers SQLite-backed
/// stores emit for boolean columns.
fn lenient_bool<'de, D: serde::Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}
