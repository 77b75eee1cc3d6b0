//! Read side of run tracking.
//!
//! The registry never writes: it merges each run folder's `metadata.json`
//! with whatever `pipeline.json` currently says and presents the result
//! newest-first. Folders without parsable metadata are excluded; a missing
//! or half-written state file reads as `pending`.
//!
//! `logFile` comes from the state file only. The name recorded in
//! `metadata.pipelineLog` at intake is a plan, not a log that exists.

use crate::error::{ClonekitError, Result};
use crate::paths::{self, StorageLayout};
use crate::run::{LaunchPlan, PipelineState, RunMetadata};
use crate::types::{Platform, RunStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

pub const DEFAULT_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// RunView
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub id: String,
    pub app_name: String,
    pub version: String,
    pub received_at: DateTime<Utc>,
    pub platform: Option<Platform>,
    pub status: RunStatus,
    pub log_file: Option<String>,
    pub notes: String,
    pub folder: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub note: Option<String>,
    pub can_view_log: bool,
    pub can_retry: bool,
}

impl RunView {
    fn merge(folder: &str, meta: RunMetadata, state: Option<PipelineState>) -> Self {
        let (status, platform, log_file, completed_at, exit_code, note) = match state {
            Some(s) => (
                s.status,
                s.platform.or(meta.platform),
                s.log_file,
                s.completed_at,
                s.exit_code,
                s.note,
            ),
            None => (
                RunStatus::Pending,
                meta.platform,
                None,
                None,
                None,
                None,
            ),
        };
        Self {
            id: meta.id,
            app_name: meta.app_name,
            version: meta.version,
            received_at: meta.received_at,
            can_view_log: log_file.is_some(),
            can_retry: platform.is_some() && status != RunStatus::Running,
            platform,
            status,
            log_file,
            notes: meta.notes,
            folder: folder.to_string(),
            completed_at,
            exit_code,
            note,
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

fn load_view(layout: &StorageLayout, folder: &str) -> Option<RunView> {
    let meta = match RunMetadata::load(&layout.metadata_path(folder)) {
        Ok(m) => m,
        Err(e) => {
            debug!(folder, error = %e, "skipping run folder without usable metadata");
            return None;
        }
    };
    let state = PipelineState::read(&layout.state_path(folder));
    Some(RunView::merge(folder, meta, state))
}

/// List up to `limit` runs, most recently modified run folder first.
///
/// Every state write replaces `pipeline.json` inside the folder, so a run
/// that was just launched, retried or finished sorts to the top.
pub fn list_runs(layout: &StorageLayout, limit: usize) -> Result<Vec<RunView>> {
    let entries = match std::fs::read_dir(&layout.uploads) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut candidates: Vec<(SystemTime, RunView)> = Vec::new();
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_dir() {
            continue;
        }
        let Some(folder) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(view) = load_view(layout, &folder) {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            candidates.push((mtime, view));
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.folder.cmp(&a.1.folder)));
    candidates.truncate(limit);
    Ok(candidates.into_iter().map(|(_, view)| view).collect())
}

/// Load a single run by folder identifier.
pub fn find_run(layout: &StorageLayout, folder: &str) -> Result<RunView> {
    paths::validate_folder(folder)?;
    if !layout.run_dir(folder).is_dir() {
        return Err(ClonekitError::RunNotFound(folder.to_string()));
    }
    load_view(layout, folder).ok_or_else(|| ClonekitError::RunNotFound(folder.to_string()))
}

// ---------------------------------------------------------------------------
// Row actions
// ---------------------------------------------------------------------------

/// "View log": current contents of the run's latest log file.
pub fn read_log(layout: &StorageLayout, folder: &str) -> Result<String> {
    let view = find_run(layout, folder)?;
    let name = view
        .log_file
        .ok_or_else(|| ClonekitError::LogNotFound(folder.to_string()))?;
    let path = layout.log_path(&name)?;
    match std::fs::read(&path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ClonekitError::LogNotFound(folder.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Path of the binary staged for a run, if the recorded name is a bare file name.
fn staged_binary(layout: &StorageLayout, folder: &str, filename: &str) -> Option<PathBuf> {
    let name = Path::new(filename).file_name()?;
    if name != std::ffi::OsStr::new(filename) {
        return None;
    }
    Some(layout.run_dir(folder).join(name))
}

/// "Retry": resolve a fresh launch of an existing run folder.
///
/// Rejected while the run is `running`, when its platform is unknown, and
/// when the staged binary is no longer on disk.
pub fn prepare_retry(layout: &StorageLayout, folder: &str) -> Result<LaunchPlan> {
    paths::validate_folder(folder)?;
    let meta = RunMetadata::load(&layout.metadata_path(folder))
        .map_err(|_| ClonekitError::RunNotFound(folder.to_string()))?;
    let state = PipelineState::read(&layout.state_path(folder));

    if state.as_ref().map(|s| s.status) == Some(RunStatus::Running) {
        return Err(ClonekitError::RunActive(folder.to_string()));
    }

    let platform = state
        .as_ref()
        .and_then(|s| s.platform)
        .or(meta.platform)
        .ok_or_else(|| ClonekitError::UnknownPlatform(folder.to_string()))?;

    let binary_path = staged_binary(layout, folder, &meta.filename)
        .filter(|p| p.is_file())
        .ok_or_else(|| ClonekitError::BinaryNotFound(format!("{folder}/{}", meta.filename)))?;

    Ok(LaunchPlan {
        id: meta.id,
        folder: folder.to_string(),
        platform,
        binary_path,
        log_dir: layout.logs.clone(),
        log_file: paths::log_file_name(folder, Utc::now()),
        state_path: layout.state_path(folder),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
