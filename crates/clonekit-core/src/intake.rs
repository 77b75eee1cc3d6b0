//! Staging of uploaded binaries into run folders.

use crate::error::{ClonekitError, Result};
use crate::paths::{self, StorageLayout};
use crate::run::{LaunchPlan, PipelineState, RunMetadata};
use crate::types::Platform;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Operator-supplied fields accompanying an upload.
#[derive(Debug, Clone, Default)]
pub struct IntakeRequest {
    pub filename: String,
    pub app_name: String,
    pub version: String,
    pub notes: String,
}

/// Result of staging one upload. `plan` is `None` when the file type was
/// not recognized and the run was recorded as skipped.
#[derive(Debug, Clone)]
pub struct StagedRun {
    pub folder: String,
    pub metadata: RunMetadata,
    pub plan: Option<LaunchPlan>,
}

enum Source<'a> {
    Bytes(&'a [u8]),
    Copy(&'a Path),
    Move(&'a Path),
}

/// Stage an upload held in memory.
pub fn stage_bytes(layout: &StorageLayout, req: &IntakeRequest, data: &[u8]) -> Result<StagedRun> {
    stage(layout, req, Source::Bytes(data))
}

/// Stage a binary already on disk by copying it into a new run folder.
pub fn stage_file(layout: &StorageLayout, req: &IntakeRequest, source: &Path) -> Result<StagedRun> {
    if !source.is_file() {
        return Err(ClonekitError::BinaryNotFound(source.display().to_string()));
    }
    stage(layout, req, Source::Copy(source))
}

/// Stage a fully received upload by moving it out of the incoming area.
/// The incoming file is removed whether or not staging succeeds.
pub fn stage_upload(layout: &StorageLayout, req: &IntakeRequest, received: &Path) -> Result<StagedRun> {
    let result = stage(layout, req, Source::Move(received));
    if received.exists() {
        let _ = std::fs::remove_file(received);
    }
    result
}

fn stage(layout: &StorageLayout, req: &IntakeRequest, source: Source<'_>) -> Result<StagedRun> {
    let filename = Path::new(req.filename.trim())
        .file_name()
        .and_then(|f| f.to_str())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ClonekitError::MissingField("file".to_string()))?
        .to_string();
    let app_name = req.app_name.trim();
    if app_name.is_empty() {
        return Err(ClonekitError::MissingField("appName".to_string()));
    }

    let now = Utc::now();
    let folder = paths::new_folder_id(now);
    let run_dir = layout.run_dir(&folder);
    crate::io::ensure_dir(&run_dir)?;

    let binary_path = run_dir.join(&filename);
    match source {
        Source::Bytes(data) => std::fs::write(&binary_path, data)?,
        Source::Copy(src) => {
            std::fs::copy(src, &binary_path)?;
        }
        Source::Move(src) => std::fs::rename(src, &binary_path)?,
    }
    let size_bytes = std::fs::metadata(&binary_path)?.len();
    let sha256 = sha256_file(&binary_path)?;

    let platform = Platform::from_filename(&filename);
    let plan = platform.map(|platform| LaunchPlan {
        id: uuid::Uuid::new_v4().to_string(),
        folder: folder.clone(),
        platform,
        binary_path: binary_path.clone(),
        log_dir: layout.logs.clone(),
        log_file: paths::log_file_name(&folder, now),
        state_path: layout.state_path(&folder),
    });

    let metadata = RunMetadata {
        id: plan
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        app_name: app_name.to_string(),
        version: req.version.trim().to_string(),
        notes: req.notes.trim().to_string(),
        filename: filename.clone(),
        size_bytes,
        platform,
        received_at: now,
        pipeline_log: plan.as_ref().map(|p| p.log_file.clone()),
        sha256: Some(sha256),
    };
    metadata.save(&layout.metadata_path(&folder))?;

    if plan.is_none() {
        PipelineState::skipped(&metadata.id, format!("Unsupported file type: {filename}"))
            .save(&layout.state_path(&folder))?;
        info!(folder = %folder, filename = %filename, "staged run skipped: unsupported file type");
    } else {
        info!(folder = %folder, filename = %filename, size_bytes, "staged run");
    }

    Ok(StagedRun {
        folder,
        metadata,
        plan,
    })
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut file = std::fs::File::open(path)?;
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
