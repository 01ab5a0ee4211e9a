//! List synchronizer: applies authoritative snapshots to the view model.
//!
//! Every refresh of a collection is tagged with a sequence number and only
//! responses newer than the last applied one are accepted. Snapshots never
//! overwrite a field owned by an open edit session:
//! - message snapshots are deferred while any message edit is open and
//!   fetched again once the last one closes
//! - task-detail snapshots skip fields that are editing or saving
//!
//! Scroll position survives re-renders: a viewport within
//! `follow_threshold` units of the bottom stays pinned to the bottom,
//! otherwise the prior offset is restored.

use tasksync_proto::message::{Message, MessageId};
use tasksync_proto::task::{Task, TaskId, TaskListQuery, TaskStatus};

use crate::edit::{EditSessionManager, FieldPhase};
use crate::pending::{Collection, PendingTracker};
use crate::view::{FieldId, SortOrder, ViewMode};

/// Default distance from the bottom below which the list follows new content.
pub const DEFAULT_FOLLOW_THRESHOLD: u32 = 100;

/// Measures rendered row heights; supplied by the presentation layer.
pub trait RowMeasure: Send {
    /// Height in scroll units of `text` rendered as one row.
    fn height(&self, text: &str) -> u32;
}

/// One unit per line of content.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMeasure;

impl RowMeasure for LineMeasure {
    fn height(&self, text: &str) -> u32 {
        u32::try_from(text.lines().count().max(1)).unwrap_or(u32::MAX)
    }
}

/// Scroll state of one list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Units scrolled past the top.
    pub offset: u32,
    /// Total height of the rendered content.
    pub content_height: u32,
    /// Height of the visible window.
    pub viewport_height: u32,
}

/// Where a viewport should land after a re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAnchor {
    /// Pin to the bottom.
    Following,
    /// Keep this exact offset.
    Offset(u32),
}

impl Viewport {
    /// Largest valid offset.
    #[must_use]
    pub const fn max_offset(&self) -> u32 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    /// Units between the bottom of the window and the end of the content.
    #[must_use]
    pub const fn gap_to_bottom(&self) -> u32 {
        self.content_height
            .saturating_sub(self.offset.saturating_add(self.viewport_height))
    }

    /// Captures the anchor to restore after a re-render.
    #[must_use]
    pub const fn anchor(&self, follow_threshold: u32) -> ScrollAnchor {
        if self.gap_to_bottom() < follow_threshold {
            ScrollAnchor::Following
        } else {
            ScrollAnchor::Offset(self.offset)
        }
    }

    /// Applies new content height and lands on `anchor`.
    ///
    /// A restored offset past the new end is clamped.
    pub fn restore(&mut self, anchor: ScrollAnchor, content_height: u32) {
        self.content_height = content_height;
        self.offset = match anchor {
            ScrollAnchor::Following => self.max_offset(),
            ScrollAnchor::Offset(offset) => offset.min(self.max_offset()),
        };
    }

    /// Scrolls to the end of the content.
    pub const fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// Scrolls by `delta` units, clamped to the content.
    pub fn scroll_by(&mut self, delta: i64) {
        let target = i64::from(self.offset).saturating_add(delta);
        let clamped = target.clamp(0, i64::from(self.max_offset()));
        self.offset = u32::try_from(clamped).unwrap_or(0);
    }

    /// Resizes the visible window, keeping the offset valid.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height;
        self.offset = self.offset.min(self.max_offset());
    }
}

/// Sequencing of refreshes for one collection.
#[derive(Debug, Clone, Copy, Default)]
struct SeqGate {
    issued: u64,
    applied: u64,
}

impl SeqGate {
    const fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    const fn is_stale(&self, seq: u64) -> bool {
        seq <= self.applied
    }

    const fn accept(&mut self, seq: u64) {
        self.applied = seq;
    }

    /// Marks every issued refresh as stale.
    const fn invalidate(&mut self) {
        self.applied = self.issued;
    }
}

/// How a message snapshot was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagesApplied {
    /// Rendered.
    Applied,
    /// Older than the last applied snapshot, or for another task.
    Stale,
    /// A message edit is open; a refresh is owed once it closes.
    Deferred,
}

/// Authoritative collections plus their projection and scroll state.
pub struct ListSynchronizer {
    tasks: Vec<Task>,
    task_seq: SeqGate,
    task_viewport: Viewport,

    detail: Option<Task>,
    detail_seq: SeqGate,

    messages: Vec<Message>,
    messages_task: Option<TaskId>,
    message_seq: SeqGate,
    message_viewport: Viewport,
    refresh_owed: bool,

    partition: TaskStatus,
    search: String,
    view_mode: ViewMode,
    sort_order: SortOrder,
    follow_threshold: u32,
    measure: Box<dyn RowMeasure>,
}

impl std::fmt::Debug for ListSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListSynchronizer")
            .field("tasks", &self.tasks.len())
            .field("messages", &self.messages.len())
            .field("messages_task", &self.messages_task)
            .field("partition", &self.partition)
            .field("search", &self.search)
            .field("view_mode", &self.view_mode)
            .field("sort_order", &self.sort_order)
            .finish_non_exhaustive()
    }
}

impl Default for ListSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_FOLLOW_THRESHOLD)
    }
}

impl ListSynchronizer {
    /// Creates an empty synchronizer.
    #[must_use]
    pub fn new(follow_threshold: u32) -> Self {
        Self {
            tasks: Vec::new(),
            task_seq: SeqGate::default(),
            task_viewport: Viewport::default(),
            detail: None,
            detail_seq: SeqGate::default(),
            messages: Vec::new(),
            messages_task: None,
            message_seq: SeqGate::default(),
            message_viewport: Viewport::default(),
            refresh_owed: false,
            partition: TaskStatus::Open,
            search: String::new(),
            view_mode: ViewMode::default(),
            sort_order: SortOrder::default(),
            follow_threshold,
            measure: Box::new(LineMeasure),
        }
    }

    /// Replaces the row measure.
    pub fn set_measure(&mut self, measure: Box<dyn RowMeasure>) {
        self.measure = measure;
    }

    // -- query state --------------------------------------------------------

    /// Selected status partition.
    #[must_use]
    pub const fn partition(&self) -> TaskStatus {
        self.partition
    }

    /// Switches the status partition.
    pub const fn set_partition(&mut self, status: TaskStatus) {
        self.partition = status;
    }

    /// Settled search filter.
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Sets the settled search filter (trimmed).
    pub fn set_search(&mut self, query: &str) {
        query.trim().clone_into(&mut self.search);
    }

    /// Current list projection.
    #[must_use]
    pub const fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Switches the list projection.
    pub const fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    /// Table sort order.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Flips the table sort order.
    pub const fn toggle_sort_order(&mut self) {
        self.sort_order = self.sort_order.toggled();
    }

    // -- task list ----------------------------------------------------------

    /// Starts a task list refresh: returns its sequence number and query.
    pub fn begin_task_refresh(&mut self) -> (u64, TaskListQuery) {
        let seq = self.task_seq.issue();
        (seq, TaskListQuery::new(self.partition, &self.search))
    }

    /// Applies a task list snapshot. Returns `false` if it was stale.
    pub fn apply_tasks(&mut self, seq: u64, tasks: Vec<Task>, pending: &PendingTracker) -> bool {
        if self.task_seq.is_stale(seq) {
            tracing::debug!(seq, applied = self.task_seq.applied, "stale task list dropped");
            return false;
        }
        self.task_seq.accept(seq);
        let anchor = self.task_viewport.anchor(self.follow_threshold);
        self.tasks = tasks;
        let height = self.task_content_height(pending);
        self.task_viewport.restore(anchor, height);
        tracing::debug!(seq, count = self.tasks.len(), "task list applied");
        true
    }

    /// Tasks in display order for the current view mode.
    ///
    /// Card mode keeps store order; table mode sorts by creation time.
    #[must_use]
    pub fn task_rows(&self) -> Vec<&Task> {
        let mut rows: Vec<&Task> = self.tasks.iter().collect();
        if self.view_mode == ViewMode::Table {
            rows.sort_by(|a, b| {
                let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
                match self.sort_order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        rows
    }

    /// Task list viewport.
    #[must_use]
    pub const fn task_viewport(&self) -> &Viewport {
        &self.task_viewport
    }

    /// Mutable task list viewport.
    pub const fn task_viewport_mut(&mut self) -> &mut Viewport {
        &mut self.task_viewport
    }

    fn task_content_height(&self, pending: &PendingTracker) -> u32 {
        let rows: u32 = self
            .tasks
            .iter()
            .map(|t| match self.view_mode {
                ViewMode::Table => 1,
                ViewMode::Card if t.description.is_empty() => self.measure.height(&t.title),
                ViewMode::Card => {
                    self.measure.height(&t.title) + self.measure.height(&t.description)
                }
            })
            .sum();
        let placeholders: u32 = pending
            .placeholders(Collection::Tasks)
            .map(|p| self.measure.height(p.text()))
            .sum();
        rows + placeholders
    }

    // -- task detail --------------------------------------------------------

    /// Switches the detail view to `task`, dropping the previous chat.
    pub fn open_detail(&mut self, task: TaskId) {
        if self.detail.as_ref().is_some_and(|t| t.id != task) {
            self.detail = None;
        }
        if self.messages_task != Some(task) {
            self.messages.clear();
            self.message_viewport = Viewport {
                viewport_height: self.message_viewport.viewport_height,
                ..Viewport::default()
            };
            self.refresh_owed = false;
        }
        self.messages_task = Some(task);
    }

    /// Leaves the detail view.
    pub fn close_detail(&mut self) {
        self.detail = None;
        self.messages.clear();
        self.messages_task = None;
        self.refresh_owed = false;
    }

    /// Task shown in the detail view.
    #[must_use]
    pub const fn detail(&self) -> Option<&Task> {
        self.detail.as_ref()
    }

    /// Starts a detail load.
    pub const fn begin_detail_refresh(&mut self) -> u64 {
        self.detail_seq.issue()
    }

    /// Applies an authoritative task, preserving fields that are being
    /// edited or saved. Returns `false` if stale or for another task.
    pub fn apply_detail(&mut self, seq: u64, task: Task, edits: &EditSessionManager) -> bool {
        if self.detail_seq.is_stale(seq) || self.messages_task != Some(task.id) {
            return false;
        }
        self.detail_seq.accept(seq);
        if !self.detail.as_ref().is_some_and(|d| d.id == task.id) {
            self.detail = Some(task);
            return true;
        }
        let Some(current) = self.detail.as_mut() else {
            return false;
        };
        let keep_title = edits.phase(FieldId::TaskTitle) != FieldPhase::Idle;
        let keep_description = edits.phase(FieldId::TaskDescription) != FieldPhase::Idle;
        let Task {
            title,
            description,
            status,
            created_by,
            created_at,
            completed_at,
            ..
        } = task;
        if keep_title {
            tracing::debug!("detail refresh kept title under edit");
        } else {
            current.title = title;
        }
        if !keep_description {
            current.description = description;
        }
        current.status = status;
        current.created_by = created_by;
        current.created_at = created_at;
        current.completed_at = completed_at;
        true
    }

    /// Current view-model text of a field.
    #[must_use]
    pub fn field_text(&self, field: FieldId) -> Option<&str> {
        match field {
            FieldId::TaskTitle => self.detail.as_ref().map(|t| t.title.as_str()),
            FieldId::TaskDescription => self.detail.as_ref().map(|t| t.description.as_str()),
            FieldId::Message(id) => self
                .messages
                .iter()
                .find(|m| m.id == id)
                .map(|m| m.content.as_str()),
        }
    }

    /// Writes a field of the view model (optimistic apply or rollback).
    pub fn set_field_text(&mut self, field: FieldId, value: &str) {
        match field {
            FieldId::TaskTitle => {
                if let Some(task) = self.detail.as_mut() {
                    value.clone_into(&mut task.title);
                }
            }
            FieldId::TaskDescription => {
                if let Some(task) = self.detail.as_mut() {
                    value.clone_into(&mut task.description);
                }
            }
            FieldId::Message(id) => {
                if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
                    value.clone_into(&mut msg.content);
                }
            }
        }
    }

    // -- messages -----------------------------------------------------------

    /// Task whose chat is loaded.
    #[must_use]
    pub const fn messages_task(&self) -> Option<TaskId> {
        self.messages_task
    }

    /// Starts a message refresh.
    ///
    /// Returns `None` and records an owed refresh while any message edit is
    /// open.
    pub fn begin_message_refresh(&mut self, edits: &EditSessionManager) -> Option<(u64, TaskId)> {
        let task = self.messages_task?;
        if edits.has_message_edits() {
            tracing::debug!(%task, "message refresh deferred: edit open");
            self.refresh_owed = true;
            return None;
        }
        Some((self.message_seq.issue(), task))
    }

    /// Applies a message snapshot.
    pub fn apply_messages(
        &mut self,
        seq: u64,
        task: TaskId,
        messages: Vec<Message>,
        edits: &EditSessionManager,
        pending: &PendingTracker,
    ) -> MessagesApplied {
        if self.messages_task != Some(task) || self.message_seq.is_stale(seq) {
            return MessagesApplied::Stale;
        }
        if edits.has_message_edits() {
            self.refresh_owed = true;
            return MessagesApplied::Deferred;
        }
        self.message_seq.accept(seq);
        let anchor = self.message_viewport.anchor(self.follow_threshold);
        self.messages = messages;
        let height = self.message_content_height(pending);
        self.message_viewport.restore(anchor, height);
        tracing::debug!(%task, seq, count = self.messages.len(), ?anchor, "messages applied");
        MessagesApplied::Applied
    }

    /// Takes the owed refresh flag once no message edit is open.
    pub fn take_owed_refresh(&mut self, edits: &EditSessionManager) -> bool {
        if edits.has_message_edits() {
            return false;
        }
        std::mem::take(&mut self.refresh_owed)
    }

    /// Whether a deferred message refresh is owed.
    #[must_use]
    pub const fn refresh_owed(&self) -> bool {
        self.refresh_owed
    }

    /// Messages of the loaded chat, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Looks up a loaded message.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Message list viewport.
    #[must_use]
    pub const fn message_viewport(&self) -> &Viewport {
        &self.message_viewport
    }

    /// Mutable message list viewport.
    pub const fn message_viewport_mut(&mut self) -> &mut Viewport {
        &mut self.message_viewport
    }

    fn message_content_height(&self, pending: &PendingTracker) -> u32 {
        let rows: u32 = self
            .messages
            .iter()
            .map(|m| self.measure.height(&m.content))
            .sum();
        let placeholders: u32 = self
            .messages_task
            .map(|task| {
                pending
                    .placeholders(Collection::Messages(task))
                    .map(|p| self.measure.height(p.text()))
                    .sum()
            })
            .unwrap_or_default();
        rows + placeholders
    }

    /// Re-measures `collection` after a placeholder change and scrolls it to
    /// the bottom.
    pub fn reveal_bottom(&mut self, collection: Collection, pending: &PendingTracker) {
        match collection {
            Collection::Tasks => {
                self.task_viewport.content_height = self.task_content_height(pending);
                self.task_viewport.scroll_to_bottom();
            }
            Collection::Messages(task) if self.messages_task == Some(task) => {
                self.message_viewport.content_height = self.message_content_height(pending);
                self.message_viewport.scroll_to_bottom();
            }
            Collection::Messages(_) => {}
        }
    }

    /// Drops every loaded collection (identity teardown).
    ///
    /// Refreshes still in flight are treated as stale when they land.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.close_detail();
        self.task_seq.invalidate();
        self.detail_seq.invalidate();
        self.message_seq.invalidate();
        self.task_viewport = Viewport {
            viewport_height: self.task_viewport.viewport_height,
            ..Viewport::default()
        };
    }
}
