//! Out-of-band pruning of aged uploads and logs.

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything older than `days` before `now`.
pub fn cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

/// Direct children of `root` last modified before `cutoff`, sorted.
/// A missing root has no targets.
pub fn collect_targets(root: &Path, cutoff: DateTime<Utc>) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(root) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut targets = Vec::new();
    for entry in entries.flatten() {
        let Ok(meta) = entry.path().symlink_metadata() else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if DateTime::<Utc>::from(modified) < cutoff {
            targets.push(entry.path());
        }
    }
    targets.sort();
    Ok(targets)
}

#[derive(Debug, Default)]
pub struct RemovalReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Delete each target; a failure is recorded and the rest still proceed.
pub fn remove_targets(targets: &[PathBuf]) -> RemovalReport {
    let mut report = RemovalReport::default();
    for path in targets {
        let result = match path.symlink_metadata() {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => report.removed.push(path.clone()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove");
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }
    report
}
