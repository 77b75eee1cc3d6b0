use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use clonekit_core::tokens::{self, DesignTokens};
use clonekit_core::types::Platform;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum TokensSubcommand {
    /// Merge a walkthrough summary and a layout summary into design tokens
    Merge {
        /// Walkthrough summary JSON (`{"screens": [...]}`)
        #[arg(long)]
        walkthrough: PathBuf,
        /// Layout metrics JSON keyed by screen slug
        #[arg(long)]
        layout: PathBuf,
        /// ios | android
        #[arg(long)]
        platform: Option<Platform>,
        /// Write the tokens here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compare two design-token documents
    Diff {
        previous: PathBuf,
        current: PathBuf,
    },
}

pub fn run(subcmd: TokensSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TokensSubcommand::Merge {
            walkthrough,
            layout,
            platform,
            output,
        } => merge(&walkthrough, &layout, platform, output.as_deref(), json),
        TokensSubcommand::Diff { previous, current } => diff(&previous, &current, json),
    }
}

fn merge(
    walkthrough: &std::path::Path,
    layout: &std::path::Path,
    platform: Option<Platform>,
    output: Option<&std::path::Path>,
    json: bool,
) -> anyhow::Result<()> {
    let summary = tokens::load_walkthrough(walkthrough)
        .with_context(|| format!("failed to read walkthrough {}", walkthrough.display()))?;
    let metrics = tokens::load_layout(layout)
        .with_context(|| format!("failed to read layout {}", layout.display()))?;
    let merged = tokens::merge(&summary, &metrics, platform);

    match output {
        Some(path) => {
            merged
                .save(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if json {
                print_json(&serde_json::json!({
                    "output": path,
                    "screens": merged.screens.len(),
                }))?;
            } else {
                println!(
                    "Wrote {} screen(s) to {}",
                    merged.screens.len(),
                    path.display()
                );
            }
            Ok(())
        }
        None => print_json(&merged),
    }
}

fn diff(previous: &std::path::Path, current: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let before = DesignTokens::load(previous)
        .with_context(|| format!("failed to read {}", previous.display()))?;
    let after = DesignTokens::load(current)
        .with_context(|| format!("failed to read {}", current.display()))?;
    let drift = tokens::diff_tokens(&before, &after);

    if json {
        return print_json(&drift);
    }
    if drift.added.is_empty() && drift.removed.is_empty() && drift.changed.is_empty() {
        println!("No token changes.");
        return Ok(());
    }
    for slug in &drift.added {
        println!("+ {slug}");
    }
    for slug in &drift.removed {
        println!("- {slug}");
    }
    for change in &drift.changed {
        let mut parts = Vec::new();
        if change.metrics_changed {
            parts.push("metrics".to_string());
        }
        if change.status_before != change.status_after {
            parts.push(format!(
                "status {} -> {}",
                change.status_before.as_deref().unwrap_or("-"),
                change.status_after.as_deref().unwrap_or("-")
            ));
        }
        println!("~ {} ({})", change.screen, parts.join(", "));
    }
    Ok(())
}
