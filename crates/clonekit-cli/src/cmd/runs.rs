use crate::output::{format_size, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use clonekit_core::config::Config;
use clonekit_core::registry::{self, RunView};
use clonekit_core::run::LaunchPlan;
use clonekit_core::types::RunStatus;
use clonekit_server::launcher::{self, PipelineCommand, PipelineEvent};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

#[derive(Subcommand)]
pub enum RunsSubcommand {
    /// List recent runs, newest first
    List {
        /// Number of runs to show (default: registry.limit from config)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one run
    Show { folder: String },
    /// Print the run's latest log
    Log { folder: String },
    /// Relaunch the pipeline for an existing run and follow it to completion
    Retry { folder: String },
}

pub fn run(root: &Path, subcmd: RunsSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    match subcmd {
        RunsSubcommand::List { limit } => list(root, &config, limit, json),
        RunsSubcommand::Show { folder } => show(root, &config, &folder, json),
        RunsSubcommand::Log { folder } => log(root, &config, &folder),
        RunsSubcommand::Retry { folder } => retry(root, &config, &folder, json),
    }
}

fn list(root: &Path, config: &Config, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let limit = limit.unwrap_or(config.registry.limit);
    let runs = registry::list_runs(&config.layout(root), limit).context("failed to list runs")?;

    if json {
        return print_json(&runs);
    }
    if runs.is_empty() {
        println!("No runs yet.");
        return Ok(());
    }
    let rows = runs
        .iter()
        .map(|r| {
            vec![
                r.folder.clone(),
                r.app_name.clone(),
                r.version.clone(),
                r.platform
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                r.status.to_string(),
                r.received_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(
        &["FOLDER", "APP", "VERSION", "PLATFORM", "STATUS", "RECEIVED"],
        rows,
    );
    Ok(())
}

fn show(root: &Path, config: &Config, folder: &str, json: bool) -> anyhow::Result<()> {
    let view = registry::find_run(&config.layout(root), folder)?;
    if json {
        return print_json(&view);
    }
    print_view(root, config, &view);
    Ok(())
}

fn print_view(root: &Path, config: &Config, view: &RunView) {
    let layout = config.layout(root);
    let size = clonekit_core::run::RunMetadata::load(&layout.metadata_path(&view.folder))
        .map(|m| format!("{} ({})", m.filename, format_size(m.size_bytes)))
        .unwrap_or_default();

    println!("Run:       {}", view.folder);
    println!("App:       {} {}", view.app_name, view.version);
    println!("Binary:    {size}");
    println!(
        "Platform:  {}",
        view.platform.map(|p| p.as_str()).unwrap_or("unknown")
    );
    println!("Status:    {}", view.status);
    println!("Received:  {}", view.received_at.to_rfc3339());
    if let Some(done) = view.completed_at {
        println!("Completed: {}", done.to_rfc3339());
    }
    if let Some(code) = view.exit_code {
        println!("Exit code: {code}");
    }
    if let Some(note) = &view.note {
        println!("Note:      {note}");
    }
    if let Some(log) = &view.log_file {
        println!("Log:       {log}");
    }
    if !view.notes.is_empty() {
        println!("Notes:     {}", view.notes);
    }
}

fn log(root: &Path, config: &Config, folder: &str) -> anyhow::Result<()> {
    let text = registry::read_log(&config.layout(root), folder)?;
    print!("{text}");
    Ok(())
}

fn retry(root: &Path, config: &Config, folder: &str, json: bool) -> anyhow::Result<()> {
    let plan = registry::prepare_retry(&config.layout(root), folder)?;
    launch_and_follow(root, config, &plan, json)
}

/// Launch `plan` in-process and block until it reaches a terminal state.
///
/// Pipeline output is echoed as it arrives unless `json` is set, in which
/// case only the final run view is printed. A failed run is an error.
pub(crate) fn launch_and_follow(
    root: &Path,
    config: &Config,
    plan: &LaunchPlan,
    json: bool,
) -> anyhow::Result<()> {
    let command = PipelineCommand {
        argv: config.pipeline.command.clone(),
        working_dir: config.pipeline_working_dir(root),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let state = rt.block_on(async {
        let handle = launcher::launch(&command, plan)?;
        let mut rx = handle.subscribe();
        loop {
            match rx.recv().await {
                Ok(PipelineEvent::Stdout { line }) if !json => println!("{line}"),
                Ok(PipelineEvent::Stderr { line }) if !json => eprintln!("{line}"),
                Ok(PipelineEvent::Finished { .. } | PipelineEvent::Error { .. }) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
        handle
            .wait()
            .await
            .context("launch ended without recording a final state")
    })?;

    let view = registry::find_run(&config.layout(root), &plan.folder)?;
    if json {
        print_json(&view)?;
    } else {
        println!();
        print_view(root, config, &view);
    }

    if state.status == RunStatus::Failed {
        match (&state.exit_code, &state.note) {
            (Some(code), _) => anyhow::bail!("pipeline failed with exit code {code}"),
            (None, Some(note)) => anyhow::bail!("pipeline failed: {note}"),
            (None, None) => anyhow::bail!("pipeline failed"),
        }
    }
    Ok(())
}
