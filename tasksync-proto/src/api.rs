//! Route table and auxiliary bodies of the Task Store HTTP API.
//!
//! Client and store share these so both sides agree on paths and headers.

use serde::{Deserialize, Serialize};

use crate::message::MessageId;
use crate::task::TaskId;

/// Header carrying the access credential on every `/api/` call.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// `GET` (list) and `POST` (create) tasks.
pub const TASKS: &str = "/api/tasks";

/// `GET` store capabilities.
pub const CONFIG: &str = "/api/config";

/// `POST` the display name of the current user.
pub const IDENTIFY: &str = "/api/identify";

/// Path of a single task.
#[must_use]
pub fn task(id: TaskId) -> String {
    format!("{TASKS}/{id}")
}

/// Path of the message collection of a task.
#[must_use]
pub fn task_messages(id: TaskId) -> String {
    format!("{TASKS}/{id}/messages")
}

/// Path of a single message.
#[must_use]
pub fn message(id: MessageId) -> String {
    format!("/api/messages/{id}")
}

/// Response of `GET /api/config`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Whether server-side enrichment is available.
    pub ai_available: bool,
}

/// Body of `POST /api/identify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    /// Display name of the user.
    pub name: String,
}

/// Generic acknowledgement body (`{"status": "updated"}` and friends).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    /// Short machine-readable outcome.
    pub status: String,
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error class, e.g. `Unauthorized`.
    pub error: String,
    /// Optional human-readable detail.
    #[serde(default)]
    pub message: Option<String>,
}
