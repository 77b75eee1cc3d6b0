//! Persisted run records.
//!
//! Every run folder holds two JSON documents: `metadata.json`, written once
//! at intake, and `pipeline.json`, owned by the launcher and rewritten on
//! launch start and on launch completion. Both are written atomically.

use crate::error::Result;
use crate::types::{Platform, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

// ---------------------------------------------------------------------------
// RunMetadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub id: String,
    pub app_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub notes: String,
    pub filename: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub platform: Option<Platform>,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl RunMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::write_json(path, self)
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// How a launch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The process ran and exited; `-1` when it was terminated by a signal.
    Exited(i32),
    /// The process could not be started at all.
    SpawnFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub id: String,
    #[serde(default)]
    pub platform: Option<Platform>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PipelineState {
    pub fn running(id: impl Into<String>, platform: Platform, log_file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform: Some(platform),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            log_file: Some(log_file.into()),
            exit_code: None,
            note: None,
        }
    }

    /// A run that was staged but never launched.
    pub fn skipped(id: impl Into<String>, note: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            platform: None,
            status: RunStatus::Skipped,
            started_at: now,
            completed_at: Some(now),
            log_file: None,
            exit_code: None,
            note: Some(note.into()),
        }
    }

    /// Apply the terminal transition. Returns `false` and leaves the record
    /// untouched when it is not `running`.
    pub fn finish(&mut self, outcome: LaunchOutcome) -> bool {
        if self.status != RunStatus::Running {
            return false;
        }
        let now = Utc::now();
        self.completed_at = Some(now.max(self.started_at));
        match outcome {
            LaunchOutcome::Exited(0) => {
                self.status = RunStatus::Succeeded;
                self.exit_code = Some(0);
            }
            LaunchOutcome::Exited(code) => {
                self.status = RunStatus::Failed;
                self.exit_code = Some(code);
            }
            LaunchOutcome::SpawnFailed(message) => {
                self.status = RunStatus::Failed;
                self.exit_code = None;
                self.note = Some(message);
            }
        }
        true
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::write_json(path, self)
    }

    /// Read a state file. A missing file or one that cannot be parsed
    /// yields `None`; callers treat that as `pending`.
    pub fn read(path: &Path) -> Option<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable pipeline state");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unparsable pipeline state");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LaunchPlan
// ---------------------------------------------------------------------------

/// Everything the launcher needs for one launch of one run folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
    pub id: String,
    pub folder: String,
    pub platform: Platform,
    pub binary_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_file: String,
    pub state_path: PathBuf,
}

impl LaunchPlan {
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.log_file)
    }
}
