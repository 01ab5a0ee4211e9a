//! Persisted view preferences (`~/.config/tasksync/prefs.toml`).
//!
//! Only the view mode and the enrichment preference survive restarts; the
//! table sort order is per-session.

use std::path::{Path, PathBuf};

use crate::view::ViewMode;

/// Errors reading or writing the preferences file.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    /// Failed to read or write the file.
    #[error("preferences file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`ViewPreferences`].
    #[error("failed to parse preferences: {0}")]
    Parse(#[from] toml::de::Error),

    /// Preferences could not be serialized.
    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// User-facing view preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewPreferences {
    /// Card or table projection of the task list.
    pub view_mode: ViewMode,
    /// Request server-side enrichment on create/send.
    pub use_ai: bool,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Card,
            use_ai: true,
        }
    }
}

/// Where preferences are stored. `None` keeps them in memory only.
#[derive(Debug, Clone, Default)]
pub struct PrefsStore {
    path: Option<PathBuf>,
}

impl PrefsStore {
    /// Store backed by `path`.
    #[must_use]
    pub const fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Store that never touches disk.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self { path: None }
    }

    /// Default location under the user's config directory, if known.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tasksync").join("prefs.toml"))
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loads preferences; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PrefsError`] if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<ViewPreferences, PrefsError> {
        let Some(path) = &self.path else {
            return Ok(ViewPreferences::default());
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ViewPreferences::default()),
            Err(source) => Err(PrefsError::Io {
                path: path.clone(),
                source,
            }),
        }
    }

    /// Writes preferences, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`PrefsError`] on I/O or serialization failure.
    pub fn save(&self, prefs: &ViewPreferences) -> Result<(), PrefsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| PrefsError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = toml::to_string(prefs)?;
        std::fs::write(path, contents).map_err(io_err)
    }
}
