//! Integration tests for inline editing of task fields and messages.
//!
//! Drives a `SyncEngine` against the scriptable `MemoryGateway` with a paused
//! clock and checks:
//! - Enter commits after the settle delay and persists title + description
//! - A rejected save rolls the view back to the snapshot and raises a notice
//! - Escape, unchanged drafts and blank required fields never reach the store
//! - At most one task-detail field is under edit at a time
//! - Message refreshes wait for an open message edit and are replayed after

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use proptest::prelude::*;
use tasksync::edit::{CommitOutcome, EditSessionManager, FieldPhase, KeyAction};
use tasksync::engine::{SyncConfig, SyncEngine};
use tasksync::gateway::GatewayError;
use tasksync::gateway::memory::{Call, MemoryGateway, Op};
use tasksync::identity::{Credentials, SessionIdentity};
use tasksync::prefs::PrefsStore;
use tasksync::view::{FieldId, FieldKind, LockScope, NoticeKind};
use tasksync_proto::message::{EditMessageRequest, MessageId};
use tasksync_proto::task::{TaskId, UpdateTaskRequest};

/// Long enough for every settle delay and gateway call to finish.
const SETTLE: Duration = Duration::from_secs(1);

type Engine = SyncEngine<MemoryGateway, SessionIdentity>;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent {
        code,
        modifiers: KeyModifiers::NONE,
        kind: KeyEventKind::Press,
        state: KeyEventState::NONE,
    }
}

/// Engine signed in as alice with `task` open and every load settled.
async fn open_task(gw: &Arc<MemoryGateway>, task: TaskId) -> Engine {
    let creds = Credentials::new("alice", "k").unwrap();
    let mut eng = SyncEngine::new(
        Arc::clone(gw),
        SessionIdentity::new(Some(creds)),
        &SyncConfig::default(),
        PrefsStore::in_memory(),
    );
    eng.start();
    eng.open_task(task);
    eng.pump(SETTLE).await;
    gw.clear_calls();
    eng
}

fn type_text(eng: &mut Engine, field: FieldId, text: &str) {
    for c in text.chars() {
        eng.handle_key(field, &key(KeyCode::Char(c)));
    }
}

// =============================================================================
// Task title and description
// =============================================================================

#[tokio::test(start_paused = true)]
async fn title_edit_persists_through_enter() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "Safari only");
    let mut eng = open_task(&gw, task).await;

    assert!(eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine));
    // Caret starts at the end: move before "bug" and insert.
    for _ in 0.."bug".len() {
        eng.handle_key(FieldId::TaskTitle, &key(KeyCode::Left));
    }
    type_text(&mut eng, FieldId::TaskTitle, "login ");
    assert_eq!(
        eng.edits().session(FieldId::TaskTitle).map(|s| s.draft().to_string()),
        Some("Fix login bug".to_string())
    );
    let action = eng.handle_key(FieldId::TaskTitle, &key(KeyCode::Enter));
    assert_eq!(action, KeyAction::Commit);

    eng.pump(SETTLE).await;

    assert_eq!(gw.task(task).unwrap().title, "Fix login bug");
    assert_eq!(gw.task(task).unwrap().description, "Safari only");
    assert_eq!(
        gw.calls_of(Op::UpdateTask),
        vec![Call::UpdateTask(
            task,
            UpdateTaskRequest::content("Fix login bug".to_string(), "Safari only".to_string())
        )]
    );
    assert_eq!(eng.lists().field_text(FieldId::TaskTitle), Some("Fix login bug"));
    assert!(eng.notice().is_none());
}

#[tokio::test(start_paused = true)]
async fn description_edit_sends_current_title() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task).await;

    assert!(eng.begin_edit(FieldId::TaskDescription, FieldKind::MultiLine));
    eng.draft_mut(FieldId::TaskDescription)
        .unwrap()
        .set_draft("  Repro: log in on Safari  ");
    eng.commit_now(FieldId::TaskDescription);
    eng.pump(SETTLE).await;

    assert_eq!(
        gw.calls_of(Op::UpdateTask),
        vec![Call::UpdateTask(
            task,
            UpdateTaskRequest::content("Fix bug".to_string(), "Repro: log in on Safari".to_string())
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_title_save_rolls_back() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task).await;
    gw.hold(Op::UpdateTask);
    gw.fail_next(
        Op::UpdateTask,
        GatewayError::Status {
            status: 500,
            detail: "database locked".to_string(),
        },
    );

    eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine);
    eng.draft_mut(FieldId::TaskTitle).unwrap().set_draft("Fix login bug");
    eng.handle_key(FieldId::TaskTitle, &key(KeyCode::Enter));
    eng.pump(SETTLE).await;

    // Optimistic value shows while the save is parked.
    assert_eq!(eng.lists().field_text(FieldId::TaskTitle), Some("Fix login bug"));
    assert_eq!(eng.edits().phase(FieldId::TaskTitle), FieldPhase::Saving);
    // A saving field cannot be reopened.
    assert!(!eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine));

    gw.release(Op::UpdateTask);
    eng.pump(SETTLE).await;

    assert_eq!(eng.lists().field_text(FieldId::TaskTitle), Some("Fix bug"));
    assert_eq!(eng.edits().phase(FieldId::TaskTitle), FieldPhase::Idle);
    let notice = eng.notice().unwrap();
    assert_eq!(notice.kind, NoticeKind::SaveFailed);
    assert!(notice.text.contains("database locked"));
    assert_eq!(gw.task(task).unwrap().title, "Fix bug");
}

#[tokio::test(start_paused = true)]
async fn escape_restores_snapshot_without_saving() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task).await;

    eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine);
    type_text(&mut eng, FieldId::TaskTitle, " now");
    assert_eq!(eng.handle_key(FieldId::TaskTitle, &key(KeyCode::Esc)), KeyAction::Cancel);
    eng.pump(SETTLE).await;

    assert!(gw.calls_of(Op::UpdateTask).is_empty());
    assert_eq!(eng.lists().field_text(FieldId::TaskTitle), Some("Fix bug"));
    assert!(!eng.edits().is_locked(LockScope::TaskDetail));
}

#[tokio::test(start_paused = true)]
async fn whitespace_only_change_is_not_saved() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task).await;

    eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine);
    type_text(&mut eng, FieldId::TaskTitle, "   ");
    assert!(eng.request_commit(FieldId::TaskTitle));
    eng.pump(SETTLE).await;

    assert!(gw.calls_of(Op::UpdateTask).is_empty());
    assert_eq!(eng.edits().phase(FieldId::TaskTitle), FieldPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn blank_title_is_restored() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task).await;

    eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine);
    eng.draft_mut(FieldId::TaskTitle).unwrap().set_draft("  ");
    eng.commit_now(FieldId::TaskTitle);
    eng.pump(SETTLE).await;

    assert!(gw.calls_of(Op::UpdateTask).is_empty());
    assert_eq!(eng.lists().field_text(FieldId::TaskTitle), Some("Fix bug"));
}

#[tokio::test(start_paused = true)]
async fn second_detail_edit_is_refused_while_first_is_open() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "desc");
    let mut eng = open_task(&gw, task).await;

    assert!(eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine));
    assert!(!eng.begin_edit(FieldId::TaskDescription, FieldKind::MultiLine));
    assert_eq!(
        eng.edits().detail_session().map(|s| s.field()),
        Some(FieldId::TaskTitle)
    );
}

#[tokio::test(start_paused = true)]
async fn reopened_edit_is_not_committed_by_stale_request() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task).await;

    eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine);
    eng.draft_mut(FieldId::TaskTitle).unwrap().set_draft("first");
    eng.request_commit(FieldId::TaskTitle);
    eng.cancel_edit(FieldId::TaskTitle);
    eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine);
    eng.draft_mut(FieldId::TaskTitle).unwrap().set_draft("second");
    eng.pump(SETTLE).await;

    // The deferred commit belonged to the cancelled session.
    assert!(gw.calls_of(Op::UpdateTask).is_empty());
    assert_eq!(eng.edits().phase(FieldId::TaskTitle), FieldPhase::Editing);
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test(start_paused = true)]
async fn message_edit_defers_refresh_until_closed() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mine = gw.seed_message(task, "alice", "hi");
    let mut eng = open_task(&gw, task).await;
    let field = FieldId::Message(mine);

    assert!(eng.begin_edit(field, FieldKind::MultiLine));
    gw.seed_message(task, "bob", "arrived meanwhile");
    eng.refresh_messages();
    eng.pump(SETTLE).await;

    assert!(gw.calls_of(Op::ListMessages).is_empty());
    assert_eq!(eng.lists().messages().len(), 1);
    assert!(eng.lists().refresh_owed());

    eng.draft_mut(field).unwrap().set_draft("hi there");
    eng.handle_key(field, &key(KeyCode::Enter));
    eng.pump(SETTLE).await;

    assert_eq!(
        gw.calls_of(Op::EditMessage),
        vec![Call::EditMessage(
            mine,
            EditMessageRequest {
                content: "hi there".to_string()
            }
        )]
    );
    assert!(!gw.calls_of(Op::ListMessages).is_empty());
    let contents: Vec<_> = eng
        .lists()
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["hi there", "arrived meanwhile"]);
    assert!(eng.lists().message(mine).unwrap().is_edited);
    assert!(!eng.lists().refresh_owed());
}

#[tokio::test(start_paused = true)]
async fn rejected_message_edit_restores_content() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mine = gw.seed_message(task, "alice", "hi");
    let mut eng = open_task(&gw, task).await;
    gw.fail_next(Op::EditMessage, GatewayError::NotFound);
    let field = FieldId::Message(mine);

    eng.begin_edit(field, FieldKind::MultiLine);
    eng.draft_mut(field).unwrap().set_draft("edited");
    eng.commit_now(field);
    assert_eq!(eng.lists().field_text(field), Some("edited"));
    eng.pump(SETTLE).await;

    assert_eq!(eng.lists().field_text(field), Some("hi"));
    assert_eq!(eng.notice().map(|n| n.kind), Some(NoticeKind::SaveFailed));
}

#[tokio::test(start_paused = true)]
async fn message_edits_lock_independently() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let a = gw.seed_message(task, "alice", "one");
    let b = gw.seed_message(task, "alice", "two");
    let mut eng = open_task(&gw, task).await;

    assert!(eng.begin_edit(FieldId::Message(a), FieldKind::MultiLine));
    assert!(eng.begin_edit(FieldId::Message(b), FieldKind::MultiLine));
    assert!(eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine));
    assert!(!eng.begin_edit(FieldId::Message(a), FieldKind::MultiLine));
    assert_eq!(eng.edits().message_sessions().count(), 2);
}

// =============================================================================
// Single-writer property
// =============================================================================

#[derive(Debug, Clone)]
enum Step {
    Begin(FieldId),
    Commit(FieldId),
    Cancel(FieldId),
    Settle(FieldId),
}

fn arb_field() -> impl Strategy<Value = FieldId> {
    prop_oneof![
        Just(FieldId::TaskTitle),
        Just(FieldId::TaskDescription),
        (1i64..4).prop_map(|id| FieldId::Message(MessageId::new(id))),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        arb_field().prop_map(Step::Begin),
        arb_field().prop_map(Step::Commit),
        arb_field().prop_map(Step::Cancel),
        arb_field().prop_map(Step::Settle),
    ]
}

proptest! {
    /// Whatever the interleaving, each lock scope has at most one session,
    /// and a field is never both under edit and saving.
    #[test]
    fn one_writer_per_scope(steps in proptest::collection::vec(arb_step(), 0..60)) {
        let mut edits = EditSessionManager::new();
        for step in steps {
            match step {
                Step::Begin(field) => {
                    let opened = edits.begin(field, field.default_kind(), "text", None).is_some();
                    if opened {
                        prop_assert_eq!(edits.session(field).map(|s| s.field()), Some(field));
                    }
                }
                Step::Commit(field) => {
                    if let CommitOutcome::Changed(save) = edits.commit(field, None) {
                        prop_assert_eq!(save.field, field);
                    }
                }
                Step::Cancel(field) => {
                    edits.cancel(field);
                }
                Step::Settle(field) => edits.settle(field),
            }

            let detail_open = usize::from(edits.detail_session().is_some());
            prop_assert!(detail_open <= 1);
            for id in 1..4 {
                let field = FieldId::Message(MessageId::new(id));
                let holder = edits.session(field).map(|s| s.field());
                prop_assert!(holder.is_none() || holder == Some(field));
            }
            for field in [FieldId::TaskTitle, FieldId::TaskDescription] {
                let editing = edits.session(field).is_some();
                prop_assert!(!(editing && edits.phase(field) == FieldPhase::Saving));
            }
        }
    }
}
