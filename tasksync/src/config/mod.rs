//! Configuration for the `tasksync` client.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasksync/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config`
//! path that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::SyncConfig;
use crate::identity::Credentials;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    store: StoreFileConfig,
    identity: IdentityFileConfig,
    sync: SyncFileConfig,
    ui: UiFileConfig,
}

/// `[store]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[identity]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct IdentityFileConfig {
    user_name: Option<String>,
    api_key: Option<String>,
}

/// `[sync]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    commit_settle_ms: Option<u64>,
    search_debounce_ms: Option<u64>,
    follow_threshold: Option<u32>,
    channel_capacity: Option<usize>,
}

/// `[ui]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
    prefs_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Store --
    /// Base URL of the Task Store.
    pub store_url: String,
    /// Per-request timeout of the HTTP gateway.
    pub request_timeout: Duration,
    /// Run against a seeded in-memory store instead of HTTP.
    pub offline: bool,

    // -- Identity --
    /// Display name to sign in with.
    pub user_name: Option<String>,
    /// Shared API key.
    pub api_key: Option<String>,

    // -- Sync --
    /// Engine tunables.
    pub sync: SyncConfig,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
    /// Preferences file; `None` means the default location.
    pub prefs_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            offline: false,
            user_name: None,
            api_key: None,
            sync: SyncConfig::default(),
            poll_timeout: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
            prefs_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// or if any config file cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let sync_defaults = defaults.sync;

        Self {
            store_url: cli
                .store_url
                .clone()
                .or_else(|| file.store.base_url.clone())
                .unwrap_or(defaults.store_url),
            request_timeout: file
                .store
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            offline: cli.offline,
            user_name: cli
                .user
                .clone()
                .or_else(|| file.identity.user_name.clone()),
            api_key: cli
                .api_key
                .clone()
                .or_else(|| file.identity.api_key.clone()),
            sync: SyncConfig {
                commit_settle: file
                    .sync
                    .commit_settle_ms
                    .map_or(sync_defaults.commit_settle, Duration::from_millis),
                search_quiet: file
                    .sync
                    .search_debounce_ms
                    .map_or(sync_defaults.search_quiet, Duration::from_millis),
                follow_threshold: file
                    .sync
                    .follow_threshold
                    .unwrap_or(sync_defaults.follow_threshold),
                channel_capacity: file
                    .sync
                    .channel_capacity
                    .unwrap_or(sync_defaults.channel_capacity),
            },
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
            prefs_path: file.ui.prefs_path.clone(),
        }
    }

    /// Credentials from config, if both name and key are present and valid.
    ///
    /// Returns `None` when the user has to sign in interactively.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        let name = self.user_name.as_deref()?;
        let key = self.api_key.as_deref()?;
        match Credentials::new(name, key) {
            Ok(creds) => Some(creds),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring configured identity");
                None
            }
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal client for a shared task and chat store")]
pub struct CliArgs {
    /// Base URL of the Task Store.
    #[arg(long, env = "TASKSYNC_STORE_URL")]
    pub store_url: Option<String>,

    /// Display name to sign in with.
    #[arg(long, env = "TASKSYNC_USER")]
    pub user: Option<String>,

    /// Shared API key of the store.
    #[arg(long, env = "TASKSYNC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to config file (default: `~/.config/tasksync/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use a seeded in-memory store instead of HTTP.
    #[arg(long)]
    pub offline: bool,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKSYNC_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tasksync.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Load and parse a TOML config file.
///
/// An explicit path must exist. Otherwise the default path is tried and a
/// missing file is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("tasksync").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
