//! `tasksync`: terminal client for a shared task and chat store.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/tasksync/config.toml`).
//!
//! ```bash
//! # Offline demo against a seeded in-memory store
//! cargo run --bin tasksync -- --offline
//!
//! # Against a running store
//! cargo run --bin tasksync -- --store-url http://127.0.0.1:8080 \
//!     --user alice --api-key secret
//!
//! # Or via environment variables
//! TASKSYNC_STORE_URL=http://127.0.0.1:8080 TASKSYNC_USER=alice cargo run
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_appender::non_blocking::WorkerGuard;

use tasksync::app::App;
use tasksync::config::{CliArgs, ClientConfig};
use tasksync::gateway::StoreGateway;
use tasksync::gateway::http::HttpGateway;
use tasksync::gateway::memory::MemoryGateway;
use tasksync::identity::Credentials;
use tasksync::prefs::PrefsStore;
use tasksync::ui;

const OFFLINE_KEY: &str = "offline";

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; ratatui owns stdout.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(offline = config.offline, store = %config.store_url, "tasksync starting");

    let prefs = config
        .prefs_path
        .clone()
        .or_else(PrefsStore::default_path)
        .map_or_else(PrefsStore::in_memory, PrefsStore::at);

    // Build the gateway before touching the terminal so a bad URL is
    // reported on a normal screen.
    let gateway = if config.offline {
        None
    } else {
        match HttpGateway::new(&config.store_url, config.request_timeout) {
            Ok(gw) => Some(Arc::new(gw)),
            Err(e) => {
                eprintln!("Error: invalid store URL {}: {e}", config.store_url);
                return Err(io::Error::new(io::ErrorKind::InvalidInput, e));
            }
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = match gateway {
        Some(gw) => {
            let app = App::new(gw, config.credentials(), &config.sync, prefs)
                .with_timestamp_format(config.timestamp_format.clone());
            run_app(&mut terminal, app, &config).await
        }
        None => {
            let key = config.api_key.clone().unwrap_or_else(|| OFFLINE_KEY.to_string());
            let gw = Arc::new(MemoryGateway::demo(key.clone()));
            let creds = config.credentials().or_else(|| {
                let user = config.user_name.as_deref().unwrap_or("you");
                Credentials::new(user, &key).ok()
            });
            let app = App::new(gw, creds, &config.sync, prefs)
                .with_timestamp_format(config.timestamp_format.clone());
            run_app(&mut terminal, app, &config).await
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("tasksync exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasksync.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main loop: draw, wait for background work, then drain pending keys.
///
/// The engine lives on this task. While it waits in `pump`, gateway calls
/// and timers make progress on the same thread.
async fn run_app<G: StoreGateway + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App<G>,
    config: &ClientConfig,
) -> io::Result<()> {
    loop {
        let size = terminal.size()?;
        app.resize(size.width, size.height);

        terminal.draw(|frame| ui::draw(frame, &app))?;

        app.pump(config.poll_timeout).await;

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                app.handle_key_event(key);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
