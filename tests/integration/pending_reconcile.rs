//! Integration tests for optimistic creates and sends.
//!
//! Validates:
//! - A placeholder appears at dispatch and shows the literal content, or a
//!   processing label when enrichment is requested
//! - Refreshes landing while the call is in flight keep the placeholder
//! - Settlement removes the placeholder and reconciles from the store
//! - Failed submissions vanish silently after the reconciling refresh
//! - Scroll position follows the bottom only when the user was near it

use std::sync::Arc;
use std::time::Duration;

use tasksync::engine::{SyncConfig, SyncEngine};
use tasksync::gateway::GatewayError;
use tasksync::gateway::memory::{Call, MemoryGateway, Op};
use tasksync::identity::{Credentials, SessionIdentity};
use tasksync::pending::{Collection, MESSAGE_PROCESSING_LABEL, PendingDisplay, TASK_PROCESSING_LABEL};
use tasksync::prefs::PrefsStore;
use tasksync_proto::message::SendMessageRequest;
use tasksync_proto::task::{CreateTaskRequest, TaskId};

const SETTLE: Duration = Duration::from_secs(1);

type Engine = SyncEngine<MemoryGateway, SessionIdentity>;

fn engine(gw: &Arc<MemoryGateway>) -> Engine {
    let creds = Credentials::new("alice", "k").unwrap();
    SyncEngine::new(
        Arc::clone(gw),
        SessionIdentity::new(Some(creds)),
        &SyncConfig::default(),
        PrefsStore::in_memory(),
    )
}

async fn open_task(gw: &Arc<MemoryGateway>, task: TaskId, use_ai: bool) -> Engine {
    let mut eng = engine(gw);
    eng.start();
    eng.set_use_ai(use_ai);
    eng.open_task(task);
    eng.pump(SETTLE).await;
    gw.clear_calls();
    eng
}

fn placeholder_texts(eng: &Engine, collection: Collection) -> Vec<String> {
    eng.pending()
        .placeholders(collection)
        .map(|p| p.text().to_string())
        .collect()
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sent_message_shows_literal_placeholder_until_settled() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task, false).await;
    let chat = Collection::Messages(task);
    gw.hold(Op::SendMessage);

    assert!(eng.submit_message("  on it  "));
    assert_eq!(placeholder_texts(&eng, chat), vec!["on it".to_string()]);
    let placeholder = eng.pending().placeholders(chat).next().unwrap();
    assert_eq!(placeholder.author, "alice");
    assert_eq!(placeholder.display, PendingDisplay::Literal("on it".to_string()));

    eng.pump(SETTLE).await;
    assert_eq!(eng.pending().count(chat), 1);
    assert!(eng.lists().messages().is_empty());

    gw.release(Op::SendMessage);
    eng.pump(SETTLE).await;

    assert!(eng.pending().is_empty());
    let messages = eng.lists().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "on it");
    assert_eq!(messages[0].user_name, "alice");
    assert_eq!(
        gw.calls_of(Op::SendMessage),
        vec![Call::SendMessage(
            task,
            SendMessageRequest {
                content: "on it".to_string(),
                use_ai: false,
            }
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn enrichment_shows_processing_label() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task, true).await;
    gw.hold(Op::SendMessage);

    assert!(eng.submit_message("pls fix asap"));
    assert_eq!(
        placeholder_texts(&eng, Collection::Messages(task)),
        vec![MESSAGE_PROCESSING_LABEL.to_string()]
    );
    gw.release(Op::SendMessage);
    eng.pump(SETTLE).await;

    let sent = gw.calls_of(Op::SendMessage);
    assert!(matches!(&sent[..], [Call::SendMessage(_, req)] if req.use_ai));
}

#[tokio::test(start_paused = true)]
async fn enrichment_not_requested_when_store_lacks_it() {
    let gw = Arc::new(MemoryGateway::new("k"));
    gw.set_ai_available(false);
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task, true).await;
    gw.hold(Op::SendMessage);

    eng.submit_message("hello");
    assert_eq!(
        placeholder_texts(&eng, Collection::Messages(task)),
        vec!["hello".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn refresh_during_send_keeps_placeholder_at_tail() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    gw.seed_message(task, "bob", "first");
    let mut eng = open_task(&gw, task, false).await;
    let chat = Collection::Messages(task);
    gw.hold(Op::SendMessage);

    eng.submit_message("mine");
    gw.seed_message(task, "bob", "second");
    eng.refresh_messages();
    eng.pump(SETTLE).await;

    let contents: Vec<_> = eng.lists().messages().iter().map(|m| m.content.clone()).collect();
    assert_eq!(contents, vec!["first", "second"]);
    assert_eq!(placeholder_texts(&eng, chat), vec!["mine".to_string()]);

    gw.release(Op::SendMessage);
    eng.pump(SETTLE).await;
    let contents: Vec<_> = eng.lists().messages().iter().map(|m| m.content.clone()).collect();
    assert_eq!(contents, vec!["first", "second", "mine"]);
    assert_eq!(eng.pending().count(chat), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_send_disappears_without_notice() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task, false).await;
    gw.fail_next(Op::SendMessage, GatewayError::Timeout);

    assert!(eng.submit_message("lost"));
    eng.pump(SETTLE).await;

    assert!(eng.pending().is_empty());
    assert!(eng.lists().messages().is_empty());
    assert!(eng.notice().is_none());
    // The settlement still reconciles against the store.
    assert_eq!(gw.calls_of(Op::ListMessages), vec![Call::ListMessages(task)]);
}

#[tokio::test(start_paused = true)]
async fn blank_message_is_not_sent() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task, false).await;

    assert!(!eng.submit_message(" \n "));
    eng.pump(SETTLE).await;
    assert!(eng.pending().is_empty());
    assert!(gw.calls_of(Op::SendMessage).is_empty());
}

#[tokio::test(start_paused = true)]
async fn placeholders_keep_submission_order() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Fix bug", "");
    let mut eng = open_task(&gw, task, false).await;
    gw.hold(Op::SendMessage);

    eng.submit_message("one");
    eng.submit_message("two");
    assert_eq!(
        placeholder_texts(&eng, Collection::Messages(task)),
        vec!["one".to_string(), "two".to_string()]
    );

    gw.release(Op::SendMessage);
    eng.pump(SETTLE).await;
    assert!(eng.pending().is_empty());
    assert_eq!(eng.lists().messages().len(), 2);
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test(start_paused = true)]
async fn created_task_replaces_placeholder() {
    let gw = Arc::new(MemoryGateway::new("k"));
    gw.seed_task("Existing", "");
    let mut eng = engine(&gw);
    eng.start();
    eng.set_use_ai(false);
    eng.pump(SETTLE).await;
    gw.hold(Op::CreateTask);

    assert!(eng.create_task(" Write docs ", " for v2 "));
    assert_eq!(
        placeholder_texts(&eng, Collection::Tasks),
        vec!["Write docs".to_string()]
    );
    eng.pump(SETTLE).await;
    assert_eq!(eng.lists().task_rows().len(), 1);

    gw.release(Op::CreateTask);
    eng.pump(SETTLE).await;

    assert!(eng.pending().is_empty());
    let titles: Vec<_> = eng.lists().task_rows().iter().map(|t| t.title.clone()).collect();
    assert_eq!(titles, vec!["Write docs", "Existing"]);
    assert_eq!(
        gw.calls_of(Op::CreateTask),
        vec![Call::CreateTask(CreateTaskRequest {
            title: "Write docs".to_string(),
            description: "for v2".to_string(),
            use_ai: false,
        })]
    );
}

#[tokio::test(start_paused = true)]
async fn enriched_task_shows_processing_label() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let mut eng = engine(&gw);
    eng.start();
    eng.pump(SETTLE).await;
    gw.hold(Op::CreateTask);

    assert!(eng.create_task("draft", ""));
    assert_eq!(
        placeholder_texts(&eng, Collection::Tasks),
        vec![TASK_PROCESSING_LABEL.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn task_without_title_is_refused() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let mut eng = engine(&gw);
    eng.start();
    eng.pump(SETTLE).await;

    assert!(!eng.create_task("   ", "description only"));
    assert!(eng.pending().is_empty());
    assert!(gw.calls_of(Op::CreateTask).is_empty());
}

// =============================================================================
// Scroll preservation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn chat_follows_bottom_only_when_near_it() {
    let gw = Arc::new(MemoryGateway::new("k"));
    let task = gw.seed_task("Busy thread", "");
    for i in 0..300 {
        gw.seed_message(task, "bob", &format!("message {i}"));
    }
    let mut eng = engine(&gw);
    eng.start();
    eng.set_use_ai(false);
    eng.open_task(task);
    eng.lists_mut().message_viewport_mut().set_viewport_height(20);
    eng.pump(SETTLE).await;

    // Initial load lands at the bottom.
    assert_eq!(eng.lists().message_viewport().offset, 280);

    // Near the bottom: new content is followed.
    gw.seed_message(task, "bob", "new");
    eng.refresh_messages();
    eng.pump(SETTLE).await;
    assert_eq!(eng.lists().message_viewport().offset, 281);

    // Scrolled up: the exact offset survives the refresh.
    eng.lists_mut().message_viewport_mut().scroll_by(-200);
    assert_eq!(eng.lists().message_viewport().offset, 81);
    gw.seed_message(task, "bob", "another");
    eng.refresh_messages();
    eng.pump(SETTLE).await;
    assert_eq!(eng.lists().message_viewport().offset, 81);

    // Sending always reveals the bottom, placeholder included.
    gw.hold(Op::SendMessage);
    eng.submit_message("mine");
    let vp = *eng.lists().message_viewport();
    assert_eq!(vp.content_height, 303);
    assert_eq!(vp.offset, 283);
}
