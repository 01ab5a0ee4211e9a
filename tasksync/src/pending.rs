//! Pending operation tracker: placeholders for dispatched, unconfirmed
//! creates and sends.
//!
//! A placeholder lives from dispatch until its own call settles. Refreshes
//! that land in between keep it at the tail of the collection; only the
//! settlement removes it.

use chrono::{DateTime, Utc};
use tasksync_proto::task::TaskId;
use uuid::Uuid;

/// Shown in place of a message while enrichment runs.
pub const MESSAGE_PROCESSING_LABEL: &str = "✨ Improving message with AI...";

/// Shown in place of a task while enrichment runs.
pub const TASK_PROCESSING_LABEL: &str = "✨ Improving task with AI...";

/// Client-side identifier of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingId(Uuid);

impl PendingId {
    fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collection a placeholder is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// The task list.
    Tasks,
    /// The chat of one task.
    Messages(TaskId),
}

/// What a placeholder shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDisplay {
    /// The content as submitted.
    Literal(String),
    /// A processing indicator; enrichment was requested.
    Processing,
}

/// A placeholder for one in-flight create or send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Identifier, unique per call.
    pub id: PendingId,
    /// Target collection.
    pub collection: Collection,
    /// Rendered content.
    pub display: PendingDisplay,
    /// Author shown on the placeholder.
    pub author: String,
    /// Dispatch time.
    pub submitted_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Text to render.
    #[must_use]
    pub fn text(&self) -> &str {
        match (&self.display, self.collection) {
            (PendingDisplay::Literal(s), _) => s,
            (PendingDisplay::Processing, Collection::Messages(_)) => MESSAGE_PROCESSING_LABEL,
            (PendingDisplay::Processing, Collection::Tasks) => TASK_PROCESSING_LABEL,
        }
    }
}

/// Ordered set of outstanding placeholders.
#[derive(Debug, Default)]
pub struct PendingTracker {
    ops: Vec<PendingOperation>,
}

impl PendingTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a placeholder and returns its id.
    pub fn insert(
        &mut self,
        collection: Collection,
        content: &str,
        enrichment: bool,
        author: &str,
    ) -> PendingId {
        let id = PendingId::generate();
        let display = if enrichment {
            PendingDisplay::Processing
        } else {
            PendingDisplay::Literal(content.to_string())
        };
        tracing::debug!(%id, ?collection, enrichment, "placeholder inserted");
        self.ops.push(PendingOperation {
            id,
            collection,
            display,
            author: author.to_string(),
            submitted_at: Utc::now(),
        });
        id
    }

    /// Removes the placeholder of a settled call.
    ///
    /// Returns `false` if it was already gone (e.g. after a teardown).
    pub fn settle(&mut self, id: PendingId) -> bool {
        let before = self.ops.len();
        self.ops.retain(|op| op.id != id);
        let removed = self.ops.len() != before;
        tracing::debug!(%id, removed, "placeholder settled");
        removed
    }

    /// Placeholders of `collection`, oldest first.
    pub fn placeholders(&self, collection: Collection) -> impl Iterator<Item = &PendingOperation> {
        self.ops.iter().filter(move |op| op.collection == collection)
    }

    /// Number of outstanding placeholders in `collection`.
    #[must_use]
    pub fn count(&self, collection: Collection) -> usize {
        self.placeholders(collection).count()
    }

    /// Whether any placeholder is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops every placeholder.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}
