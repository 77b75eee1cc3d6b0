use crate::output::{print_json, print_table};
use clap::ValueEnum;
use clonekit_core::toolchain;
use clonekit_core::types::Platform;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DoctorTarget {
    Ios,
    Android,
    Both,
}

impl DoctorTarget {
    fn platforms(self) -> Vec<Platform> {
        match self {
            DoctorTarget::Ios => vec![Platform::Ios],
            DoctorTarget::Android => vec![Platform::Android],
            DoctorTarget::Both => Platform::all().to_vec(),
        }
    }
}

pub fn run(target: DoctorTarget, additional: &[String], json: bool) -> anyhow::Result<()> {
    let mut commands: Vec<&str> = toolchain::required_commands(&target.platforms());
    for extra in additional {
        if !commands.contains(&extra.as_str()) {
            commands.push(extra);
        }
    }
    let checks = toolchain::check(&commands);
    let missing: Vec<&str> = checks
        .iter()
        .filter(|c| !c.found())
        .map(|c| c.command.as_str())
        .collect();

    if json {
        print_json(&serde_json::json!({
            "checks": checks,
            "missing": missing,
        }))?;
    } else {
        let rows = checks
            .iter()
            .map(|c| {
                vec![
                    c.command.clone(),
                    match &c.path {
                        Some(p) => p.display().to_string(),
                        None => "MISSING".to_string(),
                    },
                    c.version.clone().unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        print_table(&["COMMAND", "PATH", "VERSION"], rows);
    }

    if !missing.is_empty() {
        anyhow::bail!("missing required tools: {}", missing.join(", "));
    }
    Ok(())
}
