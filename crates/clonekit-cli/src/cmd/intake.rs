use crate::output::print_json;
use anyhow::Context;
use clonekit_core::intake::{self, IntakeRequest};
use std::path::{Path, PathBuf};

pub struct IntakeArgs {
    pub file: PathBuf,
    pub app_name: String,
    pub version: String,
    pub notes: String,
    pub stage_only: bool,
}

pub fn run(root: &Path, args: IntakeArgs, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let layout = config.layout(root);

    let filename = args
        .file
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let req = IntakeRequest {
        filename,
        app_name: args.app_name,
        version: args.version,
        notes: args.notes,
    };
    let staged = intake::stage_file(&layout, &req, &args.file)
        .with_context(|| format!("failed to stage {}", args.file.display()))?;

    let plan = match staged.plan {
        Some(plan) if !args.stage_only => plan,
        _ => {
            let view = clonekit_core::registry::find_run(&layout, &staged.folder)?;
            if json {
                print_json(&view)?;
            } else if let Some(note) = &view.note {
                println!("Staged {} ({}): {note}", staged.folder, view.status);
            } else {
                println!("Staged {} ({})", staged.folder, view.status);
            }
            return Ok(());
        }
    };

    if !json {
        println!("Staged {}; launching {} pipeline", staged.folder, plan.platform);
    }
    super::runs::launch_and_follow(root, &config, &plan, json)
}
