use crate::error::{ClonekitError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CLONEKIT_DIR: &str = ".clonekit";
pub const CONFIG_FILE: &str = ".clonekit/config.yaml";

pub const DEFAULT_STORAGE_DIR: &str = "web/storage";
pub const UPLOADS_DIR: &str = "uploads";
pub const LOGS_DIR: &str = "logs";
pub const INCOMING_DIR: &str = "incoming";

pub const METADATA_FILE: &str = "metadata.json";
pub const STATE_FILE: &str = "pipeline.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolved storage locations for one portal root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub uploads: PathBuf,
    pub logs: PathBuf,
    /// Partially received uploads, moved into a run folder once complete.
    pub incoming: PathBuf,
}

impl StorageLayout {
    pub fn new(storage: &Path) -> Self {
        Self {
            uploads: storage.join(UPLOADS_DIR),
            logs: storage.join(LOGS_DIR),
            incoming: storage.join(INCOMING_DIR),
        }
    }

    /// Fresh path for an upload that is still being received.
    pub fn incoming_file(&self) -> PathBuf {
        self.incoming
            .join(format!("{}.part", uuid::Uuid::new_v4().simple()))
    }

    pub fn run_dir(&self, folder: &str) -> PathBuf {
        self.uploads.join(folder)
    }

    pub fn metadata_path(&self, folder: &str) -> PathBuf {
        self.run_dir(folder).join(METADATA_FILE)
    }

    pub fn state_path(&self, folder: &str) -> PathBuf {
        self.run_dir(folder).join(STATE_FILE)
    }

    /// Resolve a log file name recorded in a state file. Only bare file
    /// names are accepted; anything with a path component is rejected.
    pub fn log_path(&self, log_file: &str) -> Result<PathBuf> {
        validate_log_name(log_file)?;
        Ok(self.logs.join(log_file))
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

static FOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn folder_re() -> &'static Regex {
    FOLDER_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

pub fn validate_folder(folder: &str) -> Result<()> {
    if folder.len() > 128 || !folder_re().is_match(folder) {
        return Err(ClonekitError::InvalidFolder(folder.to_string()));
    }
    Ok(())
}

pub fn validate_log_name(name: &str) -> Result<()> {
    let bare = Path::new(name)
        .file_name()
        .map(|f| f == std::ffi::OsStr::new(name))
        .unwrap_or(false);
    if name.is_empty() || !bare || name.starts_with('.') {
        return Err(ClonekitError::InvalidLogName(name.to_string()));
    }
    Ok(())
}

/// New run folder identifier: `<YYYYmmddTHHMMSS>-<8 hex>`.
pub fn new_folder_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%dT%H%M%S"), &suffix[..8])
}

/// Log file name for one launch of `folder`. Millisecond precision keeps
/// retries from reusing an earlier launch's log.
pub fn log_file_name(folder: &str, now: DateTime<Utc>) -> String {
    format!("{folder}-{}Z.log", now.format("%Y%m%dT%H%M%S%3f"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
