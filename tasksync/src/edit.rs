//! Edit session manager: inline edits under a single-writer discipline.
//!
//! Task-detail fields (title, description) share one slot, so opening an
//! edit on either while the other is open is a no-op. Each message has its
//! own slot. A field whose save is still in flight cannot be reopened until
//! the save settles.
//!
//! Per-field lifecycle:
//!
//! ```text
//! Idle ──begin──▶ Editing ──commit(changed)──▶ Saving ──settle──▶ Idle
//!                    │
//!                    └──cancel / commit(unchanged|rejected)──▶ Idle
//! ```

use std::collections::{HashMap, HashSet};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tasksync_proto::message::MessageId;

use crate::view::{FieldId, FieldKind, LockScope};

/// An open inline edit of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    field: FieldId,
    kind: FieldKind,
    original: String,
    draft: String,
    /// Caret position in chars.
    caret: usize,
    locked_width: Option<u16>,
    generation: u64,
}

impl EditSession {
    /// Field under edit.
    #[must_use]
    pub const fn field(&self) -> FieldId {
        self.field
    }

    /// Editor kind.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Snapshot taken when the session opened.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Current draft text.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Caret position in chars.
    #[must_use]
    pub const fn caret(&self) -> usize {
        self.caret
    }

    /// Width the editor was rendered at when the session opened.
    #[must_use]
    pub const fn locked_width(&self) -> Option<u16> {
        self.locked_width
    }

    /// Session generation, unique per manager.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    fn byte_at(&self, caret: usize) -> usize {
        self.draft
            .char_indices()
            .nth(caret)
            .map_or(self.draft.len(), |(i, _)| i)
    }

    /// Inserts `c` at the caret.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_at(self.caret);
        self.draft.insert(at, c);
        self.caret += 1;
    }

    /// Deletes the char before the caret.
    pub fn backspace(&mut self) {
        if self.caret == 0 {
            return;
        }
        self.caret -= 1;
        let at = self.byte_at(self.caret);
        self.draft.remove(at);
    }

    /// Deletes the char under the caret.
    pub fn delete(&mut self) {
        if self.caret < self.draft.chars().count() {
            let at = self.byte_at(self.caret);
            self.draft.remove(at);
        }
    }

    /// Moves the caret one char left.
    pub const fn move_left(&mut self) {
        self.caret = self.caret.saturating_sub(1);
    }

    /// Moves the caret one char right.
    pub fn move_right(&mut self) {
        self.caret = (self.caret + 1).min(self.draft.chars().count());
    }

    /// Moves the caret to the start.
    pub const fn home(&mut self) {
        self.caret = 0;
    }

    /// Moves the caret to the end.
    pub fn end(&mut self) {
        self.caret = self.draft.chars().count();
    }

    /// Replaces the whole draft, caret at the end.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.end();
    }

    /// Applies a passed-through key to the draft.
    ///
    /// Shift+Enter inserts a newline in multi-line fields. Returns `false`
    /// for keys the editor ignores.
    pub fn apply_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
            }
            KeyCode::Enter if self.kind == FieldKind::MultiLine => self.insert_char('\n'),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.home(),
            KeyCode::End => self.end(),
            _ => return false,
        }
        true
    }
}

/// What a key does to an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Enter without modifiers: save.
    Commit,
    /// Escape: restore the snapshot.
    Cancel,
    /// Anything else, applied to the draft by the caller.
    PassThrough,
}

/// Classifies a key pressed while a session is open.
#[must_use]
pub fn classify_key(key: &KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter if key.modifiers.is_empty() => KeyAction::Commit,
        KeyCode::Esc => KeyAction::Cancel,
        _ => KeyAction::PassThrough,
    }
}

/// Lifecycle phase of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPhase {
    /// No session, no save in flight.
    Idle,
    /// A session is open.
    Editing,
    /// A changed value is being persisted.
    Saving,
}

/// A changed value ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    /// Field being saved.
    pub field: FieldId,
    /// Snapshot to roll back to on failure.
    pub original: String,
    /// Trimmed new value, already applied optimistically.
    pub value: String,
}

/// Result of committing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No matching session (already closed, or replaced by a newer one).
    NoSession,
    /// Trimmed draft equals the snapshot; lock released, nothing to save.
    Unchanged {
        /// Field that was under edit.
        field: FieldId,
    },
    /// Empty value for a required field; lock released, snapshot restored.
    Rejected {
        /// Field that was under edit.
        field: FieldId,
        /// Snapshot the field reverts to.
        restored: String,
    },
    /// Lock released and the field is now [`FieldPhase::Saving`].
    Changed(PendingSave),
}

/// Owner of every open inline edit.
#[derive(Debug, Default)]
pub struct EditSessionManager {
    detail: Option<EditSession>,
    messages: HashMap<MessageId, EditSession>,
    saving: HashSet<FieldId>,
    next_generation: u64,
}

impl EditSessionManager {
    /// Creates a manager with no open sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an edit of `field`, snapshotting `current`.
    ///
    /// Returns the session generation, or `None` (no-op) when the field's
    /// scope is already locked or the field is still saving.
    pub fn begin(
        &mut self,
        field: FieldId,
        kind: FieldKind,
        current: &str,
        width: Option<u16>,
    ) -> Option<u64> {
        if self.is_locked(field.scope()) {
            tracing::debug!(?field, "edit ignored: scope locked");
            return None;
        }
        if self.saving.contains(&field) {
            tracing::debug!(?field, "edit ignored: save in flight");
            return None;
        }
        self.next_generation += 1;
        let session = EditSession {
            field,
            kind,
            original: current.to_string(),
            draft: current.to_string(),
            caret: current.chars().count(),
            locked_width: width,
            generation: self.next_generation,
        };
        match field.scope() {
            LockScope::TaskDetail => self.detail = Some(session),
            LockScope::Message(id) => {
                self.messages.insert(id, session);
            }
        }
        tracing::debug!(?field, generation = self.next_generation, "edit opened");
        Some(self.next_generation)
    }

    /// The open session of `field`, if any.
    #[must_use]
    pub fn session(&self, field: FieldId) -> Option<&EditSession> {
        match field.scope() {
            LockScope::TaskDetail => self.detail.as_ref().filter(|s| s.field == field),
            LockScope::Message(id) => self.messages.get(&id),
        }
    }

    /// Mutable access to the open session of `field`.
    pub fn session_mut(&mut self, field: FieldId) -> Option<&mut EditSession> {
        match field.scope() {
            LockScope::TaskDetail => self.detail.as_mut().filter(|s| s.field == field),
            LockScope::Message(id) => self.messages.get_mut(&id),
        }
    }

    /// The session holding the task-detail lock.
    #[must_use]
    pub const fn detail_session(&self) -> Option<&EditSession> {
        self.detail.as_ref()
    }

    /// Open message sessions, in no particular order.
    pub fn message_sessions(&self) -> impl Iterator<Item = &EditSession> {
        self.messages.values()
    }

    fn take(&mut self, field: FieldId) -> Option<EditSession> {
        match field.scope() {
            LockScope::TaskDetail => self.detail.take_if(|s| s.field == field),
            LockScope::Message(id) => self.messages.remove(&id),
        }
    }

    /// Closes the session of `field` without saving.
    ///
    /// Returns the snapshot to restore, or `None` if nothing was open.
    pub fn cancel(&mut self, field: FieldId) -> Option<String> {
        let session = self.take(field)?;
        tracing::debug!(?field, "edit cancelled");
        Some(session.original)
    }

    /// Commits the session of `field`.
    ///
    /// With `generation` set, only the session of that generation is
    /// committed; a closed or replaced session yields
    /// [`CommitOutcome::NoSession`].
    pub fn commit(&mut self, field: FieldId, generation: Option<u64>) -> CommitOutcome {
        let matches = self
            .session(field)
            .is_some_and(|s| generation.is_none_or(|g| g == s.generation));
        if !matches {
            return CommitOutcome::NoSession;
        }
        let Some(session) = self.take(field) else {
            return CommitOutcome::NoSession;
        };

        let value = session.draft.trim().to_string();
        if value == session.original.trim() {
            tracing::debug!(?field, "edit unchanged");
            return CommitOutcome::Unchanged { field };
        }
        if value.is_empty() && field.is_required() {
            tracing::debug!(?field, "edit rejected: required field empty");
            return CommitOutcome::Rejected {
                field,
                restored: session.original,
            };
        }
        self.saving.insert(field);
        CommitOutcome::Changed(PendingSave {
            field,
            original: session.original,
            value,
        })
    }

    /// Marks the save of `field` as settled.
    pub fn settle(&mut self, field: FieldId) {
        self.saving.remove(&field);
    }

    /// Number of saves in flight.
    #[must_use]
    pub fn saving_count(&self) -> usize {
        self.saving.len()
    }

    /// Lifecycle phase of `field`.
    #[must_use]
    pub fn phase(&self, field: FieldId) -> FieldPhase {
        if self.saving.contains(&field) {
            FieldPhase::Saving
        } else if self.session(field).is_some() {
            FieldPhase::Editing
        } else {
            FieldPhase::Idle
        }
    }

    /// Whether `scope` is held by an open session.
    #[must_use]
    pub fn is_locked(&self, scope: LockScope) -> bool {
        match scope {
            LockScope::TaskDetail => self.detail.is_some(),
            LockScope::Message(id) => self.messages.contains_key(&id),
        }
    }

    /// Whether any message edit is open or still saving.
    #[must_use]
    pub fn has_message_edits(&self) -> bool {
        !self.messages.is_empty()
            || self
                .saving
                .iter()
                .any(|f| matches!(f, FieldId::Message(_)))
    }

    /// Drops every session and forgets in-flight saves.
    pub fn clear(&mut self) {
        self.detail = None;
        self.messages.clear();
        self.saving.clear();
    }
}
