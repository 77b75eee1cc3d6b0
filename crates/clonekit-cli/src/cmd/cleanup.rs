use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use clonekit_core::retention;
use std::path::{Path, PathBuf};

#[derive(serde::Serialize)]
struct CleanupReport {
    cutoff: chrono::DateTime<Utc>,
    dry_run: bool,
    removed: Vec<PathBuf>,
    failed: Vec<(PathBuf, String)>,
}

pub fn run(root: &Path, retention_days: Option<u32>, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let layout = config.layout(root);
    let days = retention_days.unwrap_or(config.retention.days);
    let cutoff = retention::cutoff(Utc::now(), days);

    let mut targets = Vec::new();
    for dir in [&layout.uploads, &layout.logs, &layout.incoming] {
        targets.extend(
            retention::collect_targets(dir, cutoff)
                .with_context(|| format!("failed to scan {}", dir.display()))?,
        );
    }

    let report = if dry_run {
        CleanupReport {
            cutoff,
            dry_run,
            removed: targets,
            failed: Vec::new(),
        }
    } else {
        let outcome = retention::remove_targets(&targets);
        CleanupReport {
            cutoff,
            dry_run,
            removed: outcome.removed,
            failed: outcome.failed,
        }
    };

    if json {
        print_json(&report)?;
    } else {
        let verb = if dry_run { "Would remove" } else { "Removed" };
        for path in &report.removed {
            println!("{verb} {}", path.display());
        }
        for (path, error) in &report.failed {
            eprintln!("Failed to remove {}: {error}", path.display());
        }
        if report.removed.is_empty() && report.failed.is_empty() {
            println!("Nothing older than {days} day(s).");
        }
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} path(s) could not be removed", report.failed.len());
    }
    Ok(())
}
