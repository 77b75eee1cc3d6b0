use clonekit_core::error::{ClonekitError, Result};
use clonekit_core::run::{LaunchOutcome, LaunchPlan, PipelineState};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};

/// One observable step of a launch, as seen by live subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Stdout { line: String },
    Stderr { line: String },
    Finished { exit_code: i32, duration_seconds: f64 },
    Error { message: String },
}

/// The external command a launch runs. The platform and binary path are
/// appended to `argv` on every launch.
#[derive(Debug, Clone)]
pub struct PipelineCommand {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
}

/// Handle to an in-flight launch.
pub struct LaunchHandle {
    pub folder: String,
    pub log_file: String,
    pub tx: broadcast::Sender<PipelineEvent>,
    /// Receiver created before the process starts, so the first subscriber
    /// sees every event. Later subscribers call `tx.subscribe()`.
    pub initial_rx: std::sync::Mutex<Option<broadcast::Receiver<PipelineEvent>>>,
    pub completed: Arc<AtomicBool>,
    done: watch::Receiver<Option<PipelineState>>,
}

impl LaunchHandle {
    /// Subscribe to live events, claiming the initial receiver if it is
    /// still unclaimed.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        let initial = self
            .initial_rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        initial.unwrap_or_else(|| self.tx.subscribe())
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Resolve once the terminal state has been persisted.
    pub async fn wait(&self) -> Option<PipelineState> {
        let mut rx = self.done.clone();
        let result = rx
            .wait_for(|state| state.as_ref().is_some_and(|s| s.status.is_terminal()))
            .await;
        result.ok().and_then(|state| state.clone())
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Start a launch.
///
/// Synchronously verifies the binary, creates the log file and writes the
/// `running` state; any failure there is returned. Everything after that
/// runs on a tokio task and ends in the state file, never in the caller.
/// Must be called from within a tokio runtime.
pub fn launch(command: &PipelineCommand, plan: &LaunchPlan) -> Result<LaunchHandle> {
    if command.argv.is_empty() {
        return Err(ClonekitError::InvalidConfig(
            "pipeline.command must not be empty".to_string(),
        ));
    }
    if !plan.binary_path.is_file() {
        return Err(ClonekitError::BinaryNotFound(
            plan.binary_path.display().to_string(),
        ));
    }
    clonekit_core::paths::validate_log_name(&plan.log_file)?;
    clonekit_core::io::ensure_dir(&plan.log_dir)?;
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(plan.log_path())?;

    let state = PipelineState::running(&plan.id, plan.platform, &plan.log_file);
    state.save(&plan.state_path)?;
    info!(
        folder = %plan.folder,
        platform = %plan.platform,
        log_file = %plan.log_file,
        "pipeline launch started"
    );

    let (tx, initial_rx) = broadcast::channel(1024);
    let (done_tx, done_rx) = watch::channel(None);
    let completed = Arc::new(AtomicBool::new(false));
    let handle = LaunchHandle {
        folder: plan.folder.clone(),
        log_file: plan.log_file.clone(),
        tx: tx.clone(),
        initial_rx: std::sync::Mutex::new(Some(initial_rx)),
        completed: completed.clone(),
        done: done_rx,
    };

    let mut argv = command.argv.clone();
    argv.push(plan.platform.as_str().to_string());
    argv.push(plan.binary_path.display().to_string());
    let cwd = command.working_dir.clone();
    let plan = plan.clone();
    let log = tokio::fs::File::from_std(log);

    tokio::spawn(async move {
        let state = run_to_completion(argv, &cwd, &plan, state, log, &tx).await;
        completed.store(true, Ordering::Release);
        let _ = done_tx.send(Some(state));
    });

    Ok(handle)
}

async fn run_to_completion(
    argv: Vec<String>,
    cwd: &Path,
    plan: &LaunchPlan,
    mut state: PipelineState,
    mut log: tokio::fs::File,
    tx: &broadcast::Sender<PipelineEvent>,
) -> PipelineState {
    let start = Instant::now();

    let spawned = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(cwd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(c) => c,
        Err(e) => {
            let message = format!("failed to spawn '{}': {e}", argv[0]);
            append_line(&mut log, &format!("Failed to start pipeline: {message}")).await;
            state.finish(LaunchOutcome::SpawnFailed(message.clone()));
            persist(plan, &state).await;
            error!(folder = %plan.folder, error = %message, "pipeline spawn failed");
            let _ = tx.send(PipelineEvent::Error { message });
            return state;
        }
    };

    // Both pipes feed one channel so a single writer owns the log file.
    let (line_tx, mut line_rx) = mpsc::channel::<(Stream, String)>(256);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, Stream::Stdout, line_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, Stream::Stderr, line_tx.clone()));
    }
    drop(line_tx);

    while let Some((stream, line)) = line_rx.recv().await {
        append_line(&mut log, &line).await;
        let event = match stream {
            Stream::Stdout => PipelineEvent::Stdout { line },
            Stream::Stderr => PipelineEvent::Stderr { line },
        };
        let _ = tx.send(event);
    }

    let exit_code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            warn!(folder = %plan.folder, error = %e, "waiting on pipeline failed");
            -1
        }
    };

    append_line(&mut log, &format!("Pipeline exited with code {exit_code}")).await;
    state.finish(LaunchOutcome::Exited(exit_code));
    persist(plan, &state).await;

    let duration = start.elapsed().as_secs_f64();
    info!(
        folder = %plan.folder,
        exit_code,
        duration_seconds = duration,
        "pipeline launch finished"
    );
    let _ = tx.send(PipelineEvent::Finished {
        exit_code,
        duration_seconds: duration,
    });
    state
}

/// Forward a pipe line by line. Output that is not valid UTF-8 is decoded lossily.
async fn forward_lines<R>(reader: R, stream: Stream, out: mpsc::Sender<(Stream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if out.send((stream, line)).await.is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

async fn append_line(log: &mut tokio::fs::File, line: &str) {
    let mut data = Vec::with_capacity(line.len() + 1);
    data.extend_from_slice(line.as_bytes());
    data.push(b'\n');
    if let Err(e) = log.write_all(&data).await {
        warn!(error = %e, "failed to append to pipeline log");
        return;
    }
    if let Err(e) = log.flush().await {
        warn!(error = %e, "failed to flush pipeline log");
    }
}

async fn persist(plan: &LaunchPlan, state: &PipelineState) {
    let path = plan.state_path.clone();
    let record = state.clone();
    let folder = plan.folder.clone();
    match tokio::task::spawn_blocking(move || record.save(&path)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(folder = %folder, error = %e, "failed to persist pipeline state"),
        Err(e) => error!(folder = %folder, error = %e, "state persist task failed"),
    }
}
