//! Application state and key handling.
//!
//! [`App`] owns the [`SyncEngine`] and the purely local widgets (search
//! box, composer, forms, selection). Keys are mapped to engine entry
//! points; everything the user sees about tasks and messages comes from
//! the engine's view model.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tasksync_proto::message::MessageId;
use tasksync_proto::task::{Task, TaskId};

use crate::engine::{SyncConfig, SyncEngine};
use crate::gateway::StoreGateway;
use crate::identity::{Credentials, SessionIdentity};
use crate::prefs::PrefsStore;
use crate::ui;
use crate::view::{FieldId, Route};

/// Which widget receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Sign-in name box.
    SignInName,
    /// Sign-in API key box.
    SignInKey,
    /// Task search box.
    Search,
    /// Task list.
    Tasks,
    /// New-task title box.
    NewTitle,
    /// New-task description box.
    NewDescription,
    /// Task title in the detail header.
    Title,
    /// Task description in the detail header.
    Description,
    /// Chat message list.
    Messages,
    /// Chat composer.
    Composer,
}

impl Focus {
    const fn fits(self, route: Route) -> bool {
        match route {
            Route::SignIn => matches!(self, Self::SignInName | Self::SignInKey),
            Route::TaskList => matches!(
                self,
                Self::Search | Self::Tasks | Self::NewTitle | Self::NewDescription
            ),
            Route::TaskDetail(_) => matches!(
                self,
                Self::Title | Self::Description | Self::Messages | Self::Composer
            ),
        }
    }

    const fn home(route: Route) -> Self {
        match route {
            Route::SignIn => Self::SignInName,
            Route::TaskList => Self::Tasks,
            Route::TaskDetail(_) => Self::Composer,
        }
    }

    /// Composer -> Messages -> Title -> Description -> Composer.
    const fn next_in_detail(self) -> Self {
        match self {
            Self::Composer => Self::Messages,
            Self::Messages => Self::Title,
            Self::Title => Self::Description,
            _ => Self::Composer,
        }
    }
}

/// A one-line local text box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInput {
    text: String,
    caret: usize,
}

impl LineInput {
    /// Current text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text with a block caret when focused.
    #[must_use]
    pub fn display(&self, focused: bool) -> String {
        let mut shown = self.text.clone();
        if focused {
            shown.insert(self.byte_at(self.caret), '█');
        }
        shown
    }

    /// Empties the box.
    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    fn byte_at(&self, caret: usize) -> usize {
        self.text
            .char_indices()
            .nth(caret)
            .map_or(self.text.len(), |(i, _)| i)
    }

    /// Applies an editing key. Returns `true` if the text changed.
    pub fn apply_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_at(self.caret);
                self.text.insert(at, c);
                self.caret += 1;
                true
            }
            KeyCode::Backspace if self.caret > 0 => {
                self.caret -= 1;
                let at = self.byte_at(self.caret);
                self.text.remove(at);
                true
            }
            KeyCode::Delete if self.caret < self.text.chars().count() => {
                let at = self.byte_at(self.caret);
                self.text.remove(at);
                true
            }
            KeyCode::Left => {
                self.caret = self.caret.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.caret = (self.caret + 1).min(self.text.chars().count());
                false
            }
            KeyCode::Home => {
                self.caret = 0;
                false
            }
            KeyCode::End => {
                self.caret = self.text.chars().count();
                false
            }
            _ => false,
        }
    }
}

/// Sign-in form state.
#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    /// Display name box.
    pub name: LineInput,
    /// API key box.
    pub key: LineInput,
    /// Last validation error.
    pub error: Option<String>,
}

/// New-task form state.
#[derive(Debug, Clone, Default)]
pub struct NewTaskForm {
    /// Title box.
    pub title: LineInput,
    /// Description box.
    pub description: LineInput,
}

/// Main application state.
pub struct App<G: StoreGateway + 'static> {
    engine: SyncEngine<G, SessionIdentity>,
    /// Which widget is focused.
    pub focus: Focus,
    /// Sign-in form.
    pub sign_in: SignInForm,
    /// Search box; the engine debounces what is typed here.
    pub search: LineInput,
    /// Open new-task form.
    pub new_task: Option<NewTaskForm>,
    /// Chat composer.
    pub composer: LineInput,
    /// Index into the displayed task rows.
    pub selected_task: usize,
    /// Index into the loaded messages.
    pub selected_message: usize,
    /// chrono format for message timestamps.
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
    content_width: u16,
}

impl<G: StoreGateway + 'static> App<G> {
    /// Creates the app and starts a session if credentials are known.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        gateway: Arc<G>,
        credentials: Option<Credentials>,
        config: &SyncConfig,
        prefs: PrefsStore,
    ) -> Self {
        let mut engine = SyncEngine::new(gateway, SessionIdentity::new(credentials), config, prefs);
        engine.start();
        let focus = Focus::home(engine.route());
        Self {
            engine,
            focus,
            sign_in: SignInForm::default(),
            search: LineInput::default(),
            new_task: None,
            composer: LineInput::default(),
            selected_task: 0,
            selected_message: 0,
            timestamp_format: "%H:%M".to_string(),
            should_quit: false,
            content_width: 0,
        }
    }

    /// Sets the chrono format for message timestamps.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// The sync engine.
    #[must_use]
    pub const fn engine(&self) -> &SyncEngine<G, SessionIdentity> {
        &self.engine
    }

    /// Mutable sync engine.
    pub const fn engine_mut(&mut self) -> &mut SyncEngine<G, SessionIdentity> {
        &mut self.engine
    }

    /// Applies finished background work. Call once per frame.
    pub fn tick(&mut self) -> usize {
        let handled = self.engine.drain_events();
        if handled > 0 {
            self.fit_focus();
        }
        handled
    }

    /// Waits up to `max_wait` for background work and applies it.
    pub async fn pump(&mut self, max_wait: std::time::Duration) -> usize {
        let handled = self.engine.pump(max_wait).await;
        if handled > 0 {
            self.fit_focus();
        }
        handled
    }

    /// Pushes terminal geometry into the engine's list viewports.
    pub fn resize(&mut self, width: u16, height: u16) {
        let route = self.engine.route();
        let area = ratatui::layout::Rect::new(0, 0, width, height);
        let areas = ui::areas(area, route, self.new_task.is_some());
        let inner = u32::from(ui::inner_height(areas.list));
        let width = ui::content_width(areas.list);
        let lists = self.engine.lists_mut();
        match route {
            Route::TaskList => lists.task_viewport_mut().set_viewport_height(inner),
            Route::TaskDetail(_) => lists.message_viewport_mut().set_viewport_height(inner),
            Route::SignIn => {}
        }
        if width != self.content_width {
            self.content_width = width;
            lists.set_measure(Box::new(ui::WrapMeasure { width }));
        }
    }

    /// Width list content wraps at.
    #[must_use]
    pub const fn content_width(&self) -> u16 {
        self.content_width
    }

    /// Task under the list selection.
    #[must_use]
    pub fn selected_task(&self) -> Option<&Task> {
        self.engine.lists().task_rows().get(self.selected_task).copied()
    }

    /// Message under the chat selection.
    #[must_use]
    pub fn selected_message_id(&self) -> Option<MessageId> {
        self.engine
            .lists()
            .messages()
            .get(self.selected_message)
            .map(|m| m.id)
    }

    /// The field whose open edit session receives keys under the current
    /// focus, if any.
    #[must_use]
    pub fn editing_field(&self) -> Option<FieldId> {
        let field = match self.focus {
            Focus::Title => FieldId::TaskTitle,
            Focus::Description => FieldId::TaskDescription,
            Focus::Messages => FieldId::Message(self.selected_message_id()?),
            _ => return None,
        };
        self.engine.edits().session(field).map(|_| field)
    }

    fn fit_focus(&mut self) {
        let route = self.engine.route();
        if !self.focus.fits(route) {
            self.focus = Focus::home(route);
        }
        let tasks = self.engine.lists().task_rows().len();
        self.selected_task = self.selected_task.min(tasks.saturating_sub(1));
        let messages = self.engine.lists().messages().len();
        self.selected_message = self.selected_message.min(messages.saturating_sub(1));
    }

    /// Handle a key event.
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.engine.notice().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.engine.dismiss_notice();
            }
            return;
        }
        if key.code == KeyCode::Char('o')
            && key.modifiers.contains(KeyModifiers::CONTROL)
            && self.engine.route() != Route::SignIn
        {
            self.engine.sign_out();
            self.fit_focus();
            return;
        }

        match self.focus {
            Focus::SignInName | Focus::SignInKey => self.handle_sign_in_key(&key),
            Focus::Search => self.handle_search_key(&key),
            Focus::Tasks => self.handle_tasks_key(&key),
            Focus::NewTitle | Focus::NewDescription => self.handle_form_key(&key),
            Focus::Title | Focus::Description | Focus::Messages => self.handle_detail_key(&key),
            Focus::Composer => self.handle_composer_key(&key),
        }
        self.fit_focus();
    }

    fn handle_sign_in_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = if self.focus == Focus::SignInName {
                    Focus::SignInKey
                } else {
                    Focus::SignInName
                };
            }
            KeyCode::Enter => {
                match Credentials::new(self.sign_in.name.text(), self.sign_in.key.text()) {
                    Ok(creds) => {
                        self.sign_in = SignInForm::default();
                        self.engine.sign_in(creds);
                    }
                    Err(e) => self.sign_in.error = Some(e.to_string()),
                }
            }
            KeyCode::Esc => self.should_quit = true,
            _ => {
                let input = if self.focus == Focus::SignInName {
                    &mut self.sign_in.name
                } else {
                    &mut self.sign_in.key
                };
                input.apply_key(key);
            }
        }
    }

    fn handle_search_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Tasks,
            _ => {
                if self.search.apply_key(key) {
                    self.engine.on_search_input(self.search.text());
                }
            }
        }
    }

    fn handle_tasks_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_task = self.selected_task.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => self.selected_task += 1,
            KeyCode::PageUp => self.engine.lists_mut().task_viewport_mut().scroll_by(-10),
            KeyCode::PageDown => self.engine.lists_mut().task_viewport_mut().scroll_by(10),
            KeyCode::Enter => {
                if let Some(id) = self.selected_task().map(|t| t.id) {
                    self.open_task(id);
                }
            }
            KeyCode::Char('/') | KeyCode::Tab => self.focus = Focus::Search,
            KeyCode::Char('n') => {
                self.new_task = Some(NewTaskForm::default());
                self.focus = Focus::NewTitle;
            }
            KeyCode::Char('v') => {
                let mode = self.engine.lists().view_mode().toggled();
                self.engine.set_view_mode(mode);
            }
            KeyCode::Char('s') => self.engine.toggle_sort_order(),
            KeyCode::Char('c') => {
                let partition = self.engine.lists().partition().toggled();
                self.selected_task = 0;
                self.engine.set_status_partition(partition);
            }
            KeyCode::Char('a') => {
                let use_ai = !self.engine.prefs().use_ai;
                self.engine.set_use_ai(use_ai);
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task().map(|t| t.id) {
                    self.engine.delete_task(id);
                }
            }
            KeyCode::Char('r') => self.engine.refresh_tasks(),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: &KeyEvent) {
        let Some(form) = self.new_task.as_mut() else {
            self.focus = Focus::Tasks;
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.new_task = None;
                self.focus = Focus::Tasks;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = if self.focus == Focus::NewTitle {
                    Focus::NewDescription
                } else {
                    Focus::NewTitle
                };
            }
            KeyCode::Enter => {
                let (title, description) = (form.title.text().to_string(), form.description.text().to_string());
                if self.engine.create_task(&title, &description) {
                    self.new_task = None;
                    self.focus = Focus::Tasks;
                }
            }
            _ => {
                let input = if self.focus == Focus::NewTitle {
                    &mut form.title
                } else {
                    &mut form.description
                };
                input.apply_key(key);
            }
        }
    }

    fn handle_composer_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                if self.engine.submit_message(self.composer.text()) {
                    self.composer.clear();
                }
            }
            KeyCode::Tab => self.focus = self.focus.next_in_detail(),
            KeyCode::Esc => self.engine.show_task_list(),
            _ => {
                self.composer.apply_key(key);
            }
        }
    }

    fn handle_detail_key(&mut self, key: &KeyEvent) {
        if let Some(field) = self.editing_field() {
            if key.code == KeyCode::Tab {
                // Leaving the field is a blur: commit after the settle delay.
                self.engine.request_commit(field);
                self.focus = self.focus.next_in_detail();
            } else {
                self.engine.handle_key(field, key);
            }
            return;
        }

        let field = match self.focus {
            Focus::Title => Some(FieldId::TaskTitle),
            Focus::Description => Some(FieldId::TaskDescription),
            _ => self.selected_message_id().map(FieldId::Message),
        };
        match key.code {
            KeyCode::Tab => self.focus = self.focus.next_in_detail(),
            KeyCode::Esc => self.engine.show_task_list(),
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(field) = field {
                    let width = self.content_width;
                    self.engine
                        .begin_edit_at(field, field.default_kind(), Some(width));
                }
            }
            KeyCode::Up | KeyCode::Char('k') if self.focus == Focus::Messages => {
                self.selected_message = self.selected_message.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') if self.focus == Focus::Messages => {
                self.selected_message += 1;
            }
            KeyCode::PageUp => self.engine.lists_mut().message_viewport_mut().scroll_by(-10),
            KeyCode::PageDown => self.engine.lists_mut().message_viewport_mut().scroll_by(10),
            KeyCode::Char('x') => {
                if let Some(status) = self.engine.lists().detail().map(|t| t.status.toggled()) {
                    self.engine.update_status(status);
                }
            }
            KeyCode::Char('d') => match (self.focus, self.engine.route()) {
                (Focus::Messages, _) => {
                    if let Some(id) = self.selected_message_id() {
                        self.engine.delete_message(id);
                    }
                }
                (_, Route::TaskDetail(task)) => self.engine.delete_task(task),
                _ => {}
            },
            _ => {}
        }
    }

    fn open_task(&mut self, id: TaskId) {
        self.composer.clear();
        self.selected_message = 0;
        self.engine.open_task(id);
        self.focus = Focus::Composer;
    }
}
