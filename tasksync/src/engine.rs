//! Sync engine: the composition root of the client.
//!
//! The engine owns the edit sessions, placeholders, lists and search
//! scheduler, and exposes the imperative entry points the presentation
//! layer binds keys to. It is driven from a single task:
//!
//! ```text
//! presentation ──entry point──▶ SyncEngine ──spawn──▶ gateway call / timer
//!      ▲                            ▲                        │
//!      └──── view model ────────────┴──── EngineEvent ◀──────┘
//! ```
//!
//! Spawned work never touches engine state. Results come back as
//! [`EngineEvent`]s which the owner feeds in with [`SyncEngine::drain_events`]
//! (non-blocking, once per UI tick) or [`SyncEngine::pump`] (async).

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::KeyEvent;
use tasksync_proto::api::StoreConfig;
use tasksync_proto::message::{EditMessageRequest, Message, MessageId, SendMessageRequest, normalize_required};
use tasksync_proto::task::{CreateTaskRequest, Task, TaskId, TaskStatus, UpdateTaskRequest};
use tokio::sync::mpsc;

use crate::debounce::{self, DebounceScheduler, SettledQuery};
use crate::edit::{CommitOutcome, EditSession, EditSessionManager, KeyAction, PendingSave, classify_key};
use crate::gateway::{GatewayError, StoreGateway};
use crate::identity::{Credentials, IdentityProvider};
use crate::pending::{Collection, PendingId, PendingTracker};
use crate::prefs::{PrefsStore, ViewPreferences};
use crate::sync::{self, ListSynchronizer};
use crate::view::{FieldId, FieldKind, Notice, NoticeKind, Route, ViewMode};

/// Default delay between a commit request and the commit itself.
pub const DEFAULT_COMMIT_SETTLE: Duration = Duration::from_millis(100);

/// Default capacity of the engine event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Tunables of the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay applied to blur/Enter commits.
    pub commit_settle: Duration,
    /// Quiet interval of the search debounce.
    pub search_quiet: Duration,
    /// Distance from the bottom below which lists follow new content.
    pub follow_threshold: u32,
    /// Capacity of the engine event channel.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            commit_settle: DEFAULT_COMMIT_SETTLE,
            search_quiet: debounce::DEFAULT_QUIET,
            follow_threshold: sync::DEFAULT_FOLLOW_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Results of spawned work, fed back into the engine.
#[derive(Debug)]
pub enum EngineEvent {
    /// The search input went quiet.
    SearchSettled(SettledQuery),
    /// The settle delay of a commit request elapsed.
    CommitDue {
        /// Field to commit.
        field: FieldId,
        /// Session generation the request was made for.
        generation: u64,
    },
    /// Task list refresh finished.
    TasksLoaded {
        /// Refresh sequence number.
        seq: u64,
        /// Outcome.
        result: Result<Vec<Task>, GatewayError>,
    },
    /// Task detail load finished.
    TaskLoaded {
        /// Load sequence number.
        seq: u64,
        /// Requested task.
        task: TaskId,
        /// Outcome.
        result: Result<Task, GatewayError>,
    },
    /// Message refresh finished.
    MessagesLoaded {
        /// Refresh sequence number.
        seq: u64,
        /// Task whose chat was fetched.
        task: TaskId,
        /// Outcome.
        result: Result<Vec<Message>, GatewayError>,
    },
    /// Persisting an inline edit finished.
    SaveSettled {
        /// The save that was attempted.
        save: PendingSave,
        /// Task the field belongs to.
        task: TaskId,
        /// Outcome.
        result: Result<(), GatewayError>,
    },
    /// A create or send finished.
    SubmitSettled {
        /// Placeholder of the call.
        pending: PendingId,
        /// Collection to refresh.
        collection: Collection,
        /// Outcome.
        result: Result<(), GatewayError>,
    },
    /// A status change finished.
    StatusUpdated {
        /// Task that was updated.
        task: TaskId,
        /// Outcome.
        result: Result<(), GatewayError>,
    },
    /// A task delete finished.
    TaskDeleted {
        /// Task that was deleted.
        task: TaskId,
        /// Outcome.
        result: Result<(), GatewayError>,
    },
    /// A message delete finished.
    MessageDeleted {
        /// Task the message belonged to.
        task: TaskId,
        /// Outcome.
        result: Result<(), GatewayError>,
    },
    /// Store capabilities arrived.
    ConfigLoaded(Result<StoreConfig, GatewayError>),
    /// The identify call finished.
    Identified(Result<(), GatewayError>),
}

/// The optimistic-edit and reconciliation engine.
pub struct SyncEngine<G: StoreGateway + 'static, I: IdentityProvider> {
    gateway: Arc<G>,
    identity: I,
    edits: EditSessionManager,
    pending: PendingTracker,
    lists: ListSynchronizer,
    search: DebounceScheduler<EngineEvent>,
    search_input: String,
    prefs: ViewPreferences,
    prefs_store: PrefsStore,
    ai_available: bool,
    route: Route,
    notices: VecDeque<Notice>,
    commit_settle: Duration,
    tx: mpsc::Sender<EngineEvent>,
    rx: mpsc::Receiver<EngineEvent>,
}

impl<G: StoreGateway + 'static, I: IdentityProvider> std::fmt::Debug for SyncEngine<G, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("route", &self.route)
            .field("edits", &self.edits)
            .field("pending", &self.pending)
            .field("lists", &self.lists)
            .field("prefs", &self.prefs)
            .field("ai_available", &self.ai_available)
            .finish_non_exhaustive()
    }
}

impl<G: StoreGateway + 'static, I: IdentityProvider> SyncEngine<G, I> {
    /// Creates an engine. Preferences are loaded from `prefs_store`; a
    /// broken file falls back to defaults.
    pub fn new(gateway: Arc<G>, identity: I, config: &SyncConfig, prefs_store: PrefsStore) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let prefs = prefs_store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable preferences");
            ViewPreferences::default()
        });
        let mut lists = ListSynchronizer::new(config.follow_threshold);
        lists.set_view_mode(prefs.view_mode);
        let route = if identity.credentials().is_some() {
            Route::TaskList
        } else {
            Route::SignIn
        };
        Self {
            gateway,
            identity,
            edits: EditSessionManager::new(),
            pending: PendingTracker::new(),
            lists,
            search: DebounceScheduler::new(config.search_quiet, tx.clone(), EngineEvent::SearchSettled),
            search_input: String::new(),
            prefs,
            prefs_store,
            ai_available: false,
            route,
            notices: VecDeque::new(),
            commit_settle: config.commit_settle,
            tx,
            rx,
        }
    }

    // -- read side ------------------------------------------------------------

    /// Current screen.
    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    /// Authoritative lists and their projection.
    #[must_use]
    pub const fn lists(&self) -> &ListSynchronizer {
        &self.lists
    }

    /// Mutable lists, for viewport and measure updates from the presentation.
    pub const fn lists_mut(&mut self) -> &mut ListSynchronizer {
        &mut self.lists
    }

    /// Open edit sessions.
    #[must_use]
    pub const fn edits(&self) -> &EditSessionManager {
        &self.edits
    }

    /// Outstanding placeholders.
    #[must_use]
    pub const fn pending(&self) -> &PendingTracker {
        &self.pending
    }

    /// Persisted view preferences.
    #[must_use]
    pub const fn prefs(&self) -> &ViewPreferences {
        &self.prefs
    }

    /// Whether the store reported enrichment as available.
    #[must_use]
    pub const fn ai_available(&self) -> bool {
        self.ai_available
    }

    /// Enrichment flag sent with creates and sends.
    #[must_use]
    pub const fn enrichment_requested(&self) -> bool {
        self.prefs.use_ai && self.ai_available
    }

    /// Raw search input as typed.
    #[must_use]
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    /// Signed-in user name.
    #[must_use]
    pub fn user_name(&self) -> Option<String> {
        self.identity.credentials().map(|c| c.user_name)
    }

    /// Oldest undismissed notice.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    /// Dismisses the oldest notice.
    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    // -- session lifecycle ----------------------------------------------------

    /// Loads store capabilities, identifies the user and fetches the list.
    pub fn start(&mut self) {
        let Some(creds) = self.credentials() else {
            return;
        };
        self.dispatch(creds.clone(), |gw, creds| async move {
            EngineEvent::ConfigLoaded(gw.store_config(&creds).await)
        });
        self.dispatch(creds, |gw, creds| async move {
            EngineEvent::Identified(gw.identify(&creds).await)
        });
        self.refresh_tasks();
    }

    /// Installs a new identity and starts a session.
    pub fn sign_in(&mut self, credentials: Credentials) {
        self.identity.sign_in(credentials);
        self.route = Route::TaskList;
        self.start();
    }

    /// Drops the identity and every piece of session state.
    pub fn sign_out(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        tracing::warn!("tearing down session");
        self.identity.invalidate();
        self.edits.clear();
        self.pending.clear();
        self.search.cancel();
        self.search_input.clear();
        self.lists.clear();
        self.route = Route::SignIn;
    }

    fn credentials(&mut self) -> Option<Credentials> {
        let creds = self.identity.credentials();
        if creds.is_none() {
            self.route = Route::SignIn;
        }
        creds
    }

    /// Runs `call` on a spawned task and posts its event back.
    fn dispatch<F, Fut>(&self, creds: Credentials, call: F)
    where
        F: FnOnce(Arc<G>, Credentials) -> Fut,
        Fut: Future<Output = EngineEvent> + Send + 'static,
    {
        let fut = call(Arc::clone(&self.gateway), creds);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if tx.send(fut.await).await.is_err() {
                tracing::debug!("engine gone before call settled");
            }
        });
    }

    // -- event pump -----------------------------------------------------------

    /// Handles every event already queued. Returns how many were handled.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handles events as they arrive for up to `max_wait`.
    pub async fn pump(&mut self, max_wait: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + max_wait;
        let mut handled = 0;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Applies one event to the view model.
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SearchSettled(settled) => self.on_search_settled(settled),
            EngineEvent::CommitDue { field, generation } => self.commit(field, Some(generation)),
            EngineEvent::TasksLoaded { seq, result } => self.on_tasks_loaded(seq, result),
            EngineEvent::TaskLoaded { seq, task, result } => self.on_task_loaded(seq, task, result),
            EngineEvent::MessagesLoaded { seq, task, result } => {
                self.on_messages_loaded(seq, task, result);
            }
            EngineEvent::SaveSettled { save, task, result } => {
                self.on_save_settled(save, task, result);
            }
            EngineEvent::SubmitSettled {
                pending,
                collection,
                result,
            } => self.on_submit_settled(pending, collection, result),
            EngineEvent::StatusUpdated { task, result } => self.on_status_updated(task, result),
            EngineEvent::TaskDeleted { task, result } => self.on_task_deleted(task, result),
            EngineEvent::MessageDeleted { task, result } => self.on_message_deleted(task, result),
            EngineEvent::ConfigLoaded(result) => match result {
                Ok(config) => {
                    tracing::info!(ai_available = config.ai_available, "store config loaded");
                    self.ai_available = config.ai_available;
                }
                Err(e) => self.on_background_failure("store config", &e),
            },
            EngineEvent::Identified(result) => {
                if let Err(e) = result {
                    self.on_background_failure("identify", &e);
                }
            }
        }
    }

    /// Failures nobody is waiting on: auth tears down, the rest is logged.
    fn on_background_failure(&mut self, what: &str, err: &GatewayError) {
        if err.is_auth() {
            self.teardown();
        } else {
            tracing::warn!(error = %err, "{what} failed");
        }
    }

    // -- inline edits ---------------------------------------------------------

    /// Opens an inline edit of `field` over its current view-model text.
    ///
    /// Returns `false` (no-op) if the field's scope is locked, the field is
    /// still saving, or the field is not on screen.
    pub fn begin_edit(&mut self, field: FieldId, kind: FieldKind) -> bool {
        self.begin_edit_at(field, kind, None)
    }

    /// [`begin_edit`](Self::begin_edit) with the width the editor is drawn at.
    pub fn begin_edit_at(&mut self, field: FieldId, kind: FieldKind, width: Option<u16>) -> bool {
        let Some(current) = self.lists.field_text(field) else {
            return false;
        };
        let current = current.to_string();
        self.edits.begin(field, kind, &current, width).is_some()
    }

    /// Routes a key to the session of `field`.
    ///
    /// Enter (no modifier) requests a commit, Escape cancels, anything else
    /// edits the draft.
    pub fn handle_key(&mut self, field: FieldId, key: &KeyEvent) -> KeyAction {
        let action = classify_key(key);
        match action {
            KeyAction::Commit => {
                self.request_commit(field);
            }
            KeyAction::Cancel => self.cancel_edit(field),
            KeyAction::PassThrough => {
                if let Some(session) = self.edits.session_mut(field) {
                    session.apply_key(key);
                }
            }
        }
        action
    }

    /// Mutable draft access for callers that edit text directly.
    pub fn draft_mut(&mut self, field: FieldId) -> Option<&mut EditSession> {
        self.edits.session_mut(field)
    }

    /// Schedules a commit of `field` after the settle delay (Enter or blur).
    ///
    /// Returns `false` if no session is open for `field`.
    pub fn request_commit(&mut self, field: FieldId) -> bool {
        let Some(generation) = self.edits.session(field).map(EditSession::generation) else {
            return false;
        };
        let delay = self.commit_settle;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(EngineEvent::CommitDue { field, generation }).await.is_err() {
                tracing::debug!(?field, "engine gone before commit was due");
            }
        });
        true
    }

    /// Commits `field` immediately, ignoring the settle delay.
    pub fn commit_now(&mut self, field: FieldId) {
        self.commit(field, None);
    }

    /// Closes the session of `field`, restoring its snapshot verbatim.
    pub fn cancel_edit(&mut self, field: FieldId) {
        if let Some(snapshot) = self.edits.cancel(field) {
            self.lists.set_field_text(field, &snapshot);
            self.after_edit_closed();
        }
    }

    fn commit(&mut self, field: FieldId, generation: Option<u64>) {
        match self.edits.commit(field, generation) {
            CommitOutcome::NoSession => {}
            CommitOutcome::Unchanged { .. } => self.after_edit_closed(),
            CommitOutcome::Rejected { field, restored } => {
                self.lists.set_field_text(field, &restored);
                self.after_edit_closed();
            }
            CommitOutcome::Changed(save) => {
                self.lists.set_field_text(save.field, &save.value);
                self.persist(save);
                self.after_edit_closed();
            }
        }
    }

    /// Replays a message refresh owed to an edit that just closed.
    fn after_edit_closed(&mut self) {
        if self.lists.take_owed_refresh(&self.edits) {
            self.refresh_messages();
        }
    }

    fn persist(&mut self, save: PendingSave) {
        let Some(task) = self.lists.messages_task() else {
            self.edits.settle(save.field);
            return;
        };
        let Some(creds) = self.credentials() else {
            self.edits.settle(save.field);
            return;
        };
        tracing::info!(field = ?save.field, %task, "saving edit");
        match save.field {
            FieldId::TaskTitle | FieldId::TaskDescription => {
                // Title and description travel together; the sibling is
                // whatever the view model currently shows.
                let (title, description) = self
                    .lists
                    .detail()
                    .map(|t| (t.title.clone(), t.description.clone()))
                    .unwrap_or_default();
                let req = UpdateTaskRequest::content(title, description);
                self.dispatch(creds, move |gw, creds| async move {
                    let result = gw.update_task(&creds, task, &req).await;
                    EngineEvent::SaveSettled { save, task, result }
                });
            }
            FieldId::Message(id) => {
                let req = EditMessageRequest {
                    content: save.value.clone(),
                };
                self.dispatch(creds, move |gw, creds| async move {
                    let result = gw.edit_message(&creds, id, &req).await;
                    EngineEvent::SaveSettled { save, task, result }
                });
            }
        }
    }

    fn on_save_settled(&mut self, save: PendingSave, task: TaskId, result: Result<(), GatewayError>) {
        self.edits.settle(save.field);
        match result {
            Ok(()) => tracing::info!(field = ?save.field, %task, "edit saved"),
            Err(e) if e.is_auth() => {
                self.teardown();
                return;
            }
            Err(e) => {
                tracing::warn!(field = ?save.field, %task, error = %e, "edit rejected, rolling back");
                if self.lists.messages_task() == Some(task) {
                    self.lists.set_field_text(save.field, &save.original);
                }
                self.notices.push_back(Notice::new(
                    NoticeKind::SaveFailed,
                    format!("Failed to save changes: {e}"),
                ));
            }
        }
        if matches!(save.field, FieldId::Message(_)) && self.lists.messages_task() == Some(task) {
            self.lists.take_owed_refresh(&self.edits);
            self.refresh_messages();
        }
    }

    // -- lists ----------------------------------------------------------------

    /// Fetches the task list for the current partition and settled search.
    pub fn refresh_tasks(&mut self) {
        let Some(creds) = self.credentials() else {
            return;
        };
        let (seq, query) = self.lists.begin_task_refresh();
        tracing::debug!(seq, ?query, "refreshing tasks");
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.list_tasks(&creds, &query).await;
            EngineEvent::TasksLoaded { seq, result }
        });
    }

    fn on_tasks_loaded(&mut self, seq: u64, result: Result<Vec<Task>, GatewayError>) {
        match result {
            Ok(tasks) => {
                self.lists.apply_tasks(seq, tasks, &self.pending);
            }
            Err(e) => self.on_background_failure("task list refresh", &e),
        }
    }

    /// Shows `task` with its chat.
    pub fn open_task(&mut self, task: TaskId) {
        if self.route != Route::TaskDetail(task) {
            self.edits.clear();
        }
        self.route = Route::TaskDetail(task);
        self.lists.open_detail(task);
        self.refresh_detail();
        self.refresh_messages();
    }

    /// Returns to the task list and refreshes it.
    pub fn show_task_list(&mut self) {
        self.edits.clear();
        self.lists.close_detail();
        self.route = Route::TaskList;
        self.refresh_tasks();
    }

    /// Re-fetches the task shown in the detail view.
    pub fn refresh_detail(&mut self) {
        let Route::TaskDetail(task) = self.route else {
            return;
        };
        let Some(creds) = self.credentials() else {
            return;
        };
        let seq = self.lists.begin_detail_refresh();
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.get_task(&creds, task).await;
            EngineEvent::TaskLoaded { seq, task, result }
        });
    }

    fn on_task_loaded(&mut self, seq: u64, task: TaskId, result: Result<Task, GatewayError>) {
        match result {
            Ok(loaded) => {
                self.lists.apply_detail(seq, loaded, &self.edits);
            }
            Err(e) if e.is_auth() => self.teardown(),
            Err(GatewayError::NotFound) => {
                if self.route == Route::TaskDetail(task) {
                    tracing::warn!(%task, "opened task no longer exists");
                    self.notices
                        .push_back(Notice::new(NoticeKind::TaskNotFound, "Task not found"));
                    self.show_task_list();
                }
            }
            Err(e) => {
                tracing::warn!(%task, error = %e, "task load failed");
                self.notices.push_back(Notice::new(
                    NoticeKind::LoadFailed,
                    format!("Failed to load task: {e}"),
                ));
            }
        }
    }

    /// Fetches the chat of the open task, or records an owed refresh while
    /// a message edit is open.
    pub fn refresh_messages(&mut self) {
        let Some(creds) = self.credentials() else {
            return;
        };
        let Some((seq, task)) = self.lists.begin_message_refresh(&self.edits) else {
            return;
        };
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.list_messages(&creds, task).await;
            EngineEvent::MessagesLoaded { seq, task, result }
        });
    }

    fn on_messages_loaded(&mut self, seq: u64, task: TaskId, result: Result<Vec<Message>, GatewayError>) {
        match result {
            Ok(messages) => {
                let outcome = self
                    .lists
                    .apply_messages(seq, task, messages, &self.edits, &self.pending);
                tracing::debug!(%task, seq, ?outcome, "message snapshot");
            }
            Err(e) => self.on_background_failure("message refresh", &e),
        }
    }

    // -- submissions ----------------------------------------------------------

    /// Sends a chat message to the open task.
    ///
    /// Returns `true` if the message was dispatched, in which case the
    /// caller clears its input. Blank content is a silent no-op.
    pub fn submit_message(&mut self, content: &str) -> bool {
        let Some(task) = self.lists.messages_task() else {
            return false;
        };
        let Ok(content) = normalize_required(content) else {
            return false;
        };
        let Some(creds) = self.credentials() else {
            return false;
        };
        let use_ai = self.enrichment_requested();
        let collection = Collection::Messages(task);
        let pending = self
            .pending
            .insert(collection, &content, use_ai, &creds.user_name);
        self.lists.reveal_bottom(collection, &self.pending);
        tracing::info!(%task, %pending, use_ai, "sending message");
        let req = SendMessageRequest { content, use_ai };
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.send_message(&creds, task, &req).await.map(drop);
            EngineEvent::SubmitSettled {
                pending,
                collection,
                result,
            }
        });
        true
    }

    /// Creates a task. The title is required, the description optional.
    ///
    /// Returns `true` if the task was dispatched.
    pub fn create_task(&mut self, title: &str, description: &str) -> bool {
        let Ok(title) = normalize_required(title) else {
            return false;
        };
        let Some(creds) = self.credentials() else {
            return false;
        };
        let use_ai = self.enrichment_requested();
        let pending = self
            .pending
            .insert(Collection::Tasks, &title, use_ai, &creds.user_name);
        self.lists.reveal_bottom(Collection::Tasks, &self.pending);
        tracing::info!(%pending, use_ai, "creating task");
        let req = CreateTaskRequest {
            title,
            description: description.trim().to_string(),
            use_ai,
        };
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.create_task(&creds, &req).await.map(drop);
            EngineEvent::SubmitSettled {
                pending,
                collection: Collection::Tasks,
                result,
            }
        });
        true
    }

    fn on_submit_settled(&mut self, pending: PendingId, collection: Collection, result: Result<(), GatewayError>) {
        self.pending.settle(pending);
        match result {
            Ok(()) => tracing::info!(%pending, ?collection, "submission confirmed"),
            Err(e) if e.is_auth() => {
                self.teardown();
                return;
            }
            // Surfaced only by the reconciling refresh below.
            Err(e) => tracing::warn!(%pending, ?collection, error = %e, "submission failed"),
        }
        match collection {
            // A new task is always open: show it.
            Collection::Tasks => self.set_status_partition(TaskStatus::Open),
            Collection::Messages(task) if self.lists.messages_task() == Some(task) => {
                self.refresh_messages();
            }
            Collection::Messages(_) => {}
        }
    }

    // -- search & view --------------------------------------------------------

    /// Records a keystroke in the search box.
    pub fn on_search_input(&mut self, raw: &str) {
        raw.clone_into(&mut self.search_input);
        self.search.on_input(raw);
    }

    fn on_search_settled(&mut self, settled: SettledQuery) {
        if let Some(query) = self.search.acknowledge(settled) {
            tracing::debug!(%query, "search settled");
            self.lists.set_search(&query);
            self.refresh_tasks();
        }
    }

    /// Switches the list projection and persists it.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.lists.set_view_mode(mode);
        self.prefs.view_mode = mode;
        self.save_prefs();
        self.refresh_tasks();
    }

    /// Flips the table sort order (not persisted).
    pub fn toggle_sort_order(&mut self) {
        self.lists.toggle_sort_order();
        self.refresh_tasks();
    }

    /// Switches between open and completed tasks.
    pub fn set_status_partition(&mut self, status: TaskStatus) {
        self.lists.set_partition(status);
        self.refresh_tasks();
    }

    /// Sets the enrichment preference and persists it.
    pub fn set_use_ai(&mut self, use_ai: bool) {
        self.prefs.use_ai = use_ai;
        self.save_prefs();
    }

    fn save_prefs(&self) {
        if let Err(e) = self.prefs_store.save(&self.prefs) {
            tracing::warn!(error = %e, "failed to persist preferences");
        }
    }

    // -- task & message commands ----------------------------------------------

    /// Sets the status of the open task.
    pub fn update_status(&mut self, status: TaskStatus) {
        let Route::TaskDetail(task) = self.route else {
            return;
        };
        let Some(creds) = self.credentials() else {
            return;
        };
        tracing::info!(%task, %status, "updating status");
        let req = UpdateTaskRequest::status(status);
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.update_task(&creds, task, &req).await;
            EngineEvent::StatusUpdated { task, result }
        });
    }

    fn on_status_updated(&mut self, task: TaskId, result: Result<(), GatewayError>) {
        match result {
            Ok(()) => {
                if self.route == Route::TaskDetail(task) {
                    self.refresh_detail();
                }
            }
            Err(e) if e.is_auth() => self.teardown(),
            Err(e) => {
                tracing::warn!(%task, error = %e, "status update failed");
                self.notices.push_back(Notice::new(
                    NoticeKind::SaveFailed,
                    format!("Failed to update status: {e}"),
                ));
            }
        }
    }

    /// Deletes `task`.
    pub fn delete_task(&mut self, task: TaskId) {
        let Some(creds) = self.credentials() else {
            return;
        };
        tracing::info!(%task, "deleting task");
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.delete_task(&creds, task).await;
            EngineEvent::TaskDeleted { task, result }
        });
    }

    fn on_task_deleted(&mut self, task: TaskId, result: Result<(), GatewayError>) {
        match result {
            Ok(()) if self.route == Route::TaskDetail(task) => self.show_task_list(),
            Ok(()) => self.refresh_tasks(),
            Err(e) if e.is_auth() => self.teardown(),
            Err(e) => {
                tracing::warn!(%task, error = %e, "task delete failed");
                self.notices.push_back(Notice::new(
                    NoticeKind::DeleteFailed,
                    format!("Failed to delete task: {e}"),
                ));
            }
        }
    }

    /// Deletes a message of the open task.
    pub fn delete_message(&mut self, id: MessageId) {
        let Some(task) = self.lists.messages_task() else {
            return;
        };
        let Some(creds) = self.credentials() else {
            return;
        };
        tracing::info!(%task, message = %id, "deleting message");
        self.dispatch(creds, move |gw, creds| async move {
            let result = gw.delete_message(&creds, id).await;
            EngineEvent::MessageDeleted { task, result }
        });
    }

    fn on_message_deleted(&mut self, task: TaskId, result: Result<(), GatewayError>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_auth() => {
                self.teardown();
                return;
            }
            Err(e) => {
                tracing::warn!(%task, error = %e, "message delete failed");
                self.notices.push_back(Notice::new(
                    NoticeKind::DeleteFailed,
                    format!("Failed to delete message: {e}"),
                ));
            }
        }
        if self.lists.messages_task() == Some(task) {
            self.refresh_messages();
        }
    }
}
