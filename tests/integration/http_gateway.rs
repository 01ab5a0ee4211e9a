//! Integration tests for `HttpGateway` against an in-process `tasksync-store`.
//!
//! Tests that the HTTP gateway speaks the store's JSON API end to end:
//! - Identify binds the author of later writes through the session cookie
//! - Task and message CRUD round-trips with store ordering and search
//! - 401 maps to `Unauthorized`, 404 to `NotFound`, a stalled server to `Timeout`
//! - The sync engine drives a full edit cycle over real HTTP

use std::sync::Arc;
use std::time::Duration;

use tasksync::engine::{SyncConfig, SyncEngine};
use tasksync::gateway::http::{DEFAULT_TIMEOUT, HttpGateway};
use tasksync::gateway::{GatewayError, StoreGateway};
use tasksync::identity::{Credentials, SessionIdentity};
use tasksync::prefs::PrefsStore;
use tasksync::view::{FieldId, FieldKind, Route};
use tasksync_proto::message::{EditMessageRequest, SendMessageRequest};
use tasksync_proto::task::{CreateTaskRequest, TaskId, TaskListQuery, TaskStatus, UpdateTaskRequest};
use tasksync_store::server::{self, StoreState};
use tasksync_store::store::{ANONYMOUS, TaskStore};

const KEY: &str = "test-key";

/// Start the store in-process and return its base URL.
async fn start_store(ai_available: bool) -> (String, tokio::task::JoinHandle<()>) {
    let state = Arc::new(StoreState::new(
        TaskStore::new(ai_available),
        Some(KEY.to_string()),
    ));
    let (addr, handle) = server::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start task store");
    (format!("http://{addr}"), handle)
}

fn gateway(base: &str) -> HttpGateway {
    HttpGateway::new(base, DEFAULT_TIMEOUT).expect("valid base url")
}

fn creds(name: &str) -> Credentials {
    Credentials::new(name, KEY).unwrap()
}

fn new_task(title: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.to_string(),
        description: String::new(),
        use_ai: false,
    }
}

// =============================================================================
// Identity and access
// =============================================================================

#[tokio::test]
async fn identified_user_authors_writes() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let alice = creds("alice");

    gw.identify(&alice).await.unwrap();
    let created = gw.create_task(&alice, &new_task("Fix bug")).await.unwrap();
    let task = gw.get_task(&alice, created.id).await.unwrap();
    assert_eq!(task.created_by, "alice");

    let sent = gw
        .send_message(
            &alice,
            created.id,
            &SendMessageRequest {
                content: "on it".to_string(),
                use_ai: false,
            },
        )
        .await
        .unwrap();
    let messages = gw.list_messages(&alice, created.id).await.unwrap();
    assert_eq!(messages[0].id, sent.id);
    assert_eq!(messages[0].user_name, "alice");
}

#[tokio::test]
async fn unidentified_writes_are_anonymous() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let bob = creds("bob");

    let created = gw.create_task(&bob, &new_task("Fix bug")).await.unwrap();
    assert_eq!(gw.get_task(&bob, created.id).await.unwrap().created_by, ANONYMOUS);
}

#[tokio::test]
async fn wrong_key_is_unauthorized() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let intruder = Credentials::new("mallory", "wrong").unwrap();

    let err = gw
        .list_tasks(&intruder, &TaskListQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Unauthorized);
    assert!(err.is_auth());
}

#[tokio::test]
async fn store_config_reports_enrichment() {
    let (base, _handle) = start_store(true).await;
    let config = gateway(&base).store_config(&creds("alice")).await.unwrap();
    assert!(config.ai_available);
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn missing_task_is_not_found() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let alice = creds("alice");

    assert_eq!(
        gw.get_task(&alice, TaskId::new(404)).await.unwrap_err(),
        GatewayError::NotFound
    );
    assert_eq!(
        gw.delete_task(&alice, TaskId::new(404)).await.unwrap_err(),
        GatewayError::NotFound
    );
}

#[tokio::test]
async fn status_partitions_and_completion_time() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let alice = creds("alice");
    let first = gw.create_task(&alice, &new_task("first")).await.unwrap().id;
    let second = gw.create_task(&alice, &new_task("second")).await.unwrap().id;

    gw.update_task(&alice, first, &UpdateTaskRequest::status(TaskStatus::Completed))
        .await
        .unwrap();

    let open = gw
        .list_tasks(&alice, &TaskListQuery::new(TaskStatus::Open, ""))
        .await
        .unwrap();
    assert_eq!(open.iter().map(|t| t.id).collect::<Vec<_>>(), vec![second]);
    let done = gw
        .list_tasks(&alice, &TaskListQuery::new(TaskStatus::Completed, ""))
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert!(done[0].completed_at.is_some());
    assert!(done[0].is_consistent());
}

#[tokio::test]
async fn content_update_and_search() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let alice = creds("alice");
    let id = gw.create_task(&alice, &new_task("Fix bug")).await.unwrap().id;
    gw.create_task(&alice, &new_task("Write docs")).await.unwrap();

    gw.update_task(
        &alice,
        id,
        &UpdateTaskRequest::content("Fix login bug".to_string(), "Safari only".to_string()),
    )
    .await
    .unwrap();

    let hits = gw
        .list_tasks(&alice, &TaskListQuery::new(TaskStatus::Open, "LOGIN"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Fix login bug");
    assert_eq!(hits[0].description, "Safari only");
}

#[tokio::test]
async fn blank_title_is_rejected_with_status() {
    let (base, _handle) = start_store(false).await;
    let err = gateway(&base)
        .create_task(&creds("alice"), &new_task("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 400, .. }));
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test]
async fn message_lifecycle() {
    let (base, _handle) = start_store(true).await;
    let gw = gateway(&base);
    let alice = creds("alice");
    let task = gw.create_task(&alice, &new_task("Fix bug")).await.unwrap().id;

    let sent = gw
        .send_message(
            &alice,
            task,
            &SendMessageRequest {
                content: "  first draft ".to_string(),
                use_ai: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(sent.original_content, "first draft");

    gw.edit_message(
        &alice,
        sent.id,
        &EditMessageRequest {
            content: "final text".to_string(),
        },
    )
    .await
    .unwrap();
    let messages = gw.list_messages(&alice, task).await.unwrap();
    assert_eq!(messages[0].content, "final text");
    assert!(messages[0].is_edited);

    gw.delete_message(&alice, sent.id).await.unwrap();
    assert!(gw.list_messages(&alice, task).await.unwrap().is_empty());
    assert_eq!(
        gw.delete_message(&alice, sent.id).await.unwrap_err(),
        GatewayError::NotFound
    );
}

#[tokio::test]
async fn deleting_task_removes_its_chat() {
    let (base, _handle) = start_store(false).await;
    let gw = gateway(&base);
    let alice = creds("alice");
    let task = gw.create_task(&alice, &new_task("Fix bug")).await.unwrap().id;
    gw.send_message(
        &alice,
        task,
        &SendMessageRequest {
            content: "hi".to_string(),
            use_ai: false,
        },
    )
    .await
    .unwrap();

    gw.delete_task(&alice, task).await.unwrap();
    assert_eq!(
        gw.list_messages(&alice, task).await.unwrap_err(),
        GatewayError::NotFound
    );
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn stalled_store_times_out() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _hold = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let gw = HttpGateway::new(&format!("http://{addr}"), Duration::from_millis(200)).unwrap();
    let err = gw.store_config(&creds("alice")).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout);
}

#[tokio::test]
async fn unreachable_store_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway(&format!("http://{addr}"))
        .store_config(&creds("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}

// =============================================================================
// Engine over HTTP
// =============================================================================

#[tokio::test]
async fn engine_edits_title_over_http() {
    let (base, _handle) = start_store(false).await;
    let seed = gateway(&base);
    let alice = creds("alice");
    let task = seed.create_task(&alice, &new_task("Fix bug")).await.unwrap().id;

    let mut eng = SyncEngine::new(
        Arc::new(gateway(&base)),
        SessionIdentity::new(Some(alice.clone())),
        &SyncConfig::default(),
        PrefsStore::in_memory(),
    );
    eng.start();
    eng.pump(Duration::from_millis(300)).await;
    assert_eq!(eng.lists().task_rows().len(), 1);

    eng.open_task(task);
    eng.pump(Duration::from_millis(300)).await;
    assert_eq!(eng.route(), Route::TaskDetail(task));
    assert_eq!(eng.lists().field_text(FieldId::TaskTitle), Some("Fix bug"));

    assert!(eng.begin_edit(FieldId::TaskTitle, FieldKind::SingleLine));
    eng.draft_mut(FieldId::TaskTitle).unwrap().set_draft("Fix login bug");
    eng.request_commit(FieldId::TaskTitle);
    eng.pump(Duration::from_millis(500)).await;

    assert_eq!(seed.get_task(&alice, task).await.unwrap().title, "Fix login bug");
    assert!(eng.notice().is_none());

    assert!(eng.submit_message("shipped"));
    eng.pump(Duration::from_millis(300)).await;
    assert!(eng.pending().is_empty());
    let messages = eng.lists().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].user_name, "alice");
}

#[tokio::test]
async fn engine_signs_out_on_rejected_key() {
    let (base, _handle) = start_store(false).await;
    let wrong = Credentials::new("alice", "stale").unwrap();
    let mut eng = SyncEngine::new(
        Arc::new(gateway(&base)),
        SessionIdentity::new(Some(wrong)),
        &SyncConfig::default(),
        PrefsStore::in_memory(),
    );
    eng.start();
    eng.pump(Duration::from_millis(300)).await;

    assert_eq!(eng.route(), Route::SignIn);
    assert!(eng.user_name().is_none());
}
