//! Integration tests wiring key events through `App` into rendered frames.
//!
//! Renders with ratatui's `TestBackend` and asserts on the visible text:
//! - Sign-in form, then the task list once credentials are entered
//! - Opening a task shows its header, chat and composer
//! - Inline title edit from the keyboard persists to the store
//! - Placeholders render at the tail of the chat while a send is in flight
//! - Failed saves pop a notice that Enter dismisses
//! - Table view shows the sortable header

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tasksync::app::{App, Focus};
use tasksync::engine::SyncConfig;
use tasksync::gateway::GatewayError;
use tasksync::gateway::memory::{MemoryGateway, Op};
use tasksync::identity::Credentials;
use tasksync::prefs::PrefsStore;
use tasksync::ui;
use tasksync::view::{FieldId, Route};
use tasksync_proto::task::TaskId;

const SETTLE: Duration = Duration::from_secs(1);
const WIDTH: u16 = 100;
const HEIGHT: u16 = 30;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent {
        code,
        modifiers: KeyModifiers::NONE,
        kind: KeyEventKind::Press,
        state: KeyEventState::NONE,
    }
}

fn type_text(app: &mut App<MemoryGateway>, text: &str) {
    for c in text.chars() {
        app.handle_key_event(key(KeyCode::Char(c)));
    }
}

/// Draws one frame and returns the screen as text, one line per row.
fn render(terminal: &mut Terminal<TestBackend>, app: &mut App<MemoryGateway>) -> String {
    app.resize(WIDTH, HEIGHT);
    terminal.draw(|frame| ui::draw(frame, app)).unwrap();
    let buffer = terminal.backend().buffer();
    let mut screen = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            screen.push_str(buffer[(x, y)].symbol());
        }
        screen.push('\n');
    }
    screen
}

fn terminal() -> Terminal<TestBackend> {
    Terminal::new(TestBackend::new(WIDTH, HEIGHT)).unwrap()
}

/// Demo store, signed in as alice, task list loaded.
async fn signed_in() -> (Arc<MemoryGateway>, App<MemoryGateway>) {
    let gw = Arc::new(MemoryGateway::demo("k"));
    let creds = Credentials::new("alice", "k").unwrap();
    let mut app = App::new(
        Arc::clone(&gw),
        Some(creds),
        &SyncConfig::default(),
        PrefsStore::in_memory(),
    );
    app.pump(SETTLE).await;
    (gw, app)
}

/// Opens "Fix bug" (task #1, second row of the open list).
async fn open_fix_bug(app: &mut App<MemoryGateway>) {
    app.handle_key_event(key(KeyCode::Char('j')));
    assert_eq!(app.selected_task().map(|t| t.title.as_str()), Some("Fix bug"));
    app.handle_key_event(key(KeyCode::Enter));
    app.pump(SETTLE).await;
}

#[tokio::test(start_paused = true)]
async fn sign_in_then_task_list() {
    let gw = Arc::new(MemoryGateway::demo("k"));
    let mut app = App::new(gw, None, &SyncConfig::default(), PrefsStore::in_memory());
    let mut term = terminal();

    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Sign in to the task store"));
    assert!(screen.contains("signed out"));

    type_text(&mut app, "alice");
    app.handle_key_event(key(KeyCode::Tab));
    type_text(&mut app, "k");
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("alice"));
    assert!(!screen.contains("API key: k"));

    app.handle_key_event(key(KeyCode::Enter));
    app.pump(SETTLE).await;
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Open tasks"));
    assert!(screen.contains("Write release notes"));
    assert!(screen.contains("Fix bug"));
    assert!(!screen.contains("Rotate staging keys"));
    assert!(screen.contains("AI on"));
}

#[tokio::test(start_paused = true)]
async fn completed_partition_lists_done_tasks() {
    let (_gw, mut app) = signed_in().await;
    let mut term = terminal();

    app.handle_key_event(key(KeyCode::Char('c')));
    app.pump(SETTLE).await;
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Completed tasks"));
    assert!(screen.contains("Rotate staging keys"));
    assert!(screen.contains("[✓]"));
}

#[tokio::test(start_paused = true)]
async fn opening_a_task_shows_header_and_chat() {
    let (_gw, mut app) = signed_in().await;
    let mut term = terminal();
    open_fix_bug(&mut app).await;

    assert_eq!(app.engine().route(), Route::TaskDetail(TaskId::new(1)));
    assert_eq!(app.focus, Focus::Composer);
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Task #1"));
    assert!(screen.contains("Login fails on Safari"));
    assert!(screen.contains("Reproduced on Safari 17"));
    assert!(screen.contains("session cookie is dropped"));
    assert!(screen.contains("Message ("));
    assert!(screen.contains("AI on)"));

    app.handle_key_event(key(KeyCode::Esc));
    app.pump(SETTLE).await;
    assert_eq!(app.engine().route(), Route::TaskList);
}

#[tokio::test(start_paused = true)]
async fn keyboard_title_edit_persists() {
    let (gw, mut app) = signed_in().await;
    let mut term = terminal();
    open_fix_bug(&mut app).await;

    // Composer -> Messages -> Title.
    app.handle_key_event(key(KeyCode::Tab));
    app.handle_key_event(key(KeyCode::Tab));
    assert_eq!(app.focus, Focus::Title);
    app.handle_key_event(key(KeyCode::Enter));
    assert_eq!(app.editing_field(), Some(FieldId::TaskTitle));

    for _ in 0.."bug".len() {
        app.handle_key_event(key(KeyCode::Left));
    }
    type_text(&mut app, "login ");
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Fix login "));
    assert!(screen.contains("Enter: save"));

    app.handle_key_event(key(KeyCode::Enter));
    app.pump(SETTLE).await;

    assert_eq!(gw.task(TaskId::new(1)).unwrap().title, "Fix login bug");
    assert!(app.editing_field().is_none());
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Fix login bug"));
}

#[tokio::test(start_paused = true)]
async fn tab_away_from_edit_saves() {
    let (gw, mut app) = signed_in().await;
    open_fix_bug(&mut app).await;

    app.handle_key_event(key(KeyCode::Tab));
    app.handle_key_event(key(KeyCode::Tab));
    app.handle_key_event(key(KeyCode::Tab));
    assert_eq!(app.focus, Focus::Description);
    app.handle_key_event(key(KeyCode::Char('e')));
    type_text(&mut app, " (17.2)");
    app.handle_key_event(key(KeyCode::Tab));
    assert_eq!(app.focus, Focus::Composer);
    app.pump(SETTLE).await;

    assert_eq!(
        gw.task(TaskId::new(1)).unwrap().description,
        "Login fails on Safari after the redirect (17.2)"
    );
}

#[tokio::test(start_paused = true)]
async fn in_flight_send_renders_placeholder() {
    let (gw, mut app) = signed_in().await;
    let mut term = terminal();
    open_fix_bug(&mut app).await;
    gw.hold(Op::SendMessage);

    type_text(&mut app, "pushing a fix");
    app.handle_key_event(key(KeyCode::Enter));
    assert_eq!(app.composer.text(), "");
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Improving message with AI"));

    // Turn enrichment off: the next send shows its own text.
    app.engine_mut().set_use_ai(false);
    type_text(&mut app, "and a test");
    app.handle_key_event(key(KeyCode::Enter));
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("and a test"));
    assert!(screen.contains("Message "));
    assert!(!screen.contains("AI on)"));

    gw.release(Op::SendMessage);
    app.pump(SETTLE).await;
    let screen = render(&mut term, &mut app);
    assert!(!screen.contains("Improving message with AI"));
    assert!(screen.contains("pushing a fix"));
    assert!(screen.contains("and a test"));
}

#[tokio::test(start_paused = true)]
async fn failed_save_pops_notice() {
    let (gw, mut app) = signed_in().await;
    let mut term = terminal();
    open_fix_bug(&mut app).await;
    gw.fail_next(
        Op::UpdateTask,
        GatewayError::Status {
            status: 500,
            detail: "disk full".to_string(),
        },
    );

    app.handle_key_event(key(KeyCode::Tab));
    app.handle_key_event(key(KeyCode::Tab));
    app.handle_key_event(key(KeyCode::Enter));
    type_text(&mut app, "!");
    app.handle_key_event(key(KeyCode::Enter));
    app.pump(SETTLE).await;

    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Notice"));
    assert!(screen.contains("Failed to save changes"));
    assert!(screen.contains("Fix bug"));
    assert!(!screen.contains("Fix bug!"));

    // Keys other than Enter/Esc are swallowed while the notice is up.
    app.handle_key_event(key(KeyCode::Char('x')));
    app.handle_key_event(key(KeyCode::Enter));
    assert!(app.engine().notice().is_none());
    let screen = render(&mut term, &mut app);
    assert!(!screen.contains("Failed to save changes"));
}

#[tokio::test(start_paused = true)]
async fn table_view_shows_sort_header() {
    let (_gw, mut app) = signed_in().await;
    let mut term = terminal();

    app.handle_key_event(key(KeyCode::Char('v')));
    app.pump(SETTLE).await;
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Owner"));
    assert!(screen.contains("Created ▼"));

    app.handle_key_event(key(KeyCode::Char('s')));
    app.pump(SETTLE).await;
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Created ▲"));
    // Oldest first: "Fix bug" above "Write release notes".
    let fix = screen.find("Fix bug").unwrap();
    let notes = screen.find("Write release notes").unwrap();
    assert!(fix < notes);
}

#[tokio::test(start_paused = true)]
async fn new_task_form_creates_task() {
    let (gw, mut app) = signed_in().await;
    let mut term = terminal();
    app.engine_mut().set_use_ai(false);

    app.handle_key_event(key(KeyCode::Char('n')));
    assert_eq!(app.focus, Focus::NewTitle);
    type_text(&mut app, "Ship it");
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("New task (Enter: create)"));

    app.handle_key_event(key(KeyCode::Enter));
    assert!(app.new_task.is_none());
    app.pump(SETTLE).await;

    assert_eq!(gw.calls_of(Op::CreateTask).len(), 1);
    let screen = render(&mut term, &mut app);
    assert!(screen.contains("Ship it"));
}
