use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use clonekit_core::snapshot;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum SnapshotSubcommand {
    /// Report screenshots added, removed or resized between two capture runs
    Diff {
        previous: PathBuf,
        current: PathBuf,
    },
}

pub fn run(subcmd: SnapshotSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SnapshotSubcommand::Diff { previous, current } => {
            let diff = snapshot::diff_dirs(&previous, &current)
                .context("failed to collect snapshots")?;
            if json {
                return print_json(&diff);
            }
            if diff.is_empty() {
                println!("No screenshot changes.");
                return Ok(());
            }
            for path in &diff.added {
                println!("+ {path}");
            }
            for path in &diff.removed {
                println!("- {path}");
            }
            for change in &diff.changed {
                println!("~ {} ({} -> {} bytes)", change.path, change.before, change.after);
            }
            Ok(())
        }
    }
}
