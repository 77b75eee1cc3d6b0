mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    doctor::DoctorTarget, runs::RunsSubcommand, snapshot::SnapshotSubcommand,
    tokens::TokensSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clonekit",
    about = "Intake portal and tooling for the mobile capture pipeline",
    version,
    propagate_version = true
)]
struct Cli {
    /// Portal root (default: auto-detect from .clonekit/ or .git/)
    #[arg(long, global = true, env = "CLONEKIT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the intake portal
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
        /// Don't open browser automatically
        #[arg(long)]
        no_open: bool,
    },

    /// Stage a binary as a new run and launch the pipeline against it
    #[command(disable_version_flag = true)]
    Intake {
        /// Path to the .ipa, .apk or .aab file
        file: PathBuf,
        #[arg(long)]
        app_name: String,
        #[arg(long, default_value = "")]
        version: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Stage the run without launching; retry it later with `runs retry`
        #[arg(long)]
        stage_only: bool,
    },

    /// Inspect recent runs
    Runs {
        #[command(subcommand)]
        subcommand: RunsSubcommand,
    },

    /// Compare capture screenshot directories
    Snapshot {
        #[command(subcommand)]
        subcommand: SnapshotSubcommand,
    },

    /// Build and compare design-token documents
    Tokens {
        #[command(subcommand)]
        subcommand: TokensSubcommand,
    },

    /// Remove uploads and logs older than the retention window
    Cleanup {
        /// Days to keep (default: retention.days from config)
        #[arg(long)]
        retention_days: Option<u32>,
        /// List what would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the tools the pipeline shells out to are installed
    Doctor {
        #[arg(value_enum, default_value = "both")]
        target: DoctorTarget,
        /// Extra commands to verify alongside the platform requirements
        #[arg(long, num_args = 1..)]
        additional: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Serve { port, no_open } => cmd::serve::run(&root, port, no_open),
        Commands::Intake {
            file,
            app_name,
            version,
            notes,
            stage_only,
        } => cmd::intake::run(
            &root,
            cmd::intake::IntakeArgs {
                file,
                app_name,
                version,
                notes,
                stage_only,
            },
            cli.json,
        ),
        Commands::Runs { subcommand } => cmd::runs::run(&root, subcommand, cli.json),
        Commands::Snapshot { subcommand } => cmd::snapshot::run(subcommand, cli.json),
        Commands::Tokens { subcommand } => cmd::tokens::run(subcommand, cli.json),
        Commands::Cleanup {
            retention_days,
            dry_run,
        } => cmd::cleanup::run(&root, retention_days, dry_run, cli.json),
        Commands::Doctor { target, additional } => {
            cmd::doctor::run(target, &additional, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
