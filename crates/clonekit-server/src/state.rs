use clonekit_core::config::Config;
use clonekit_core::paths::StorageLayout;
use clonekit_core::run::LaunchPlan;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::AppError;
use crate::launcher::{self, LaunchHandle, PipelineCommand};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub layout: StorageLayout,
    pub command: PipelineCommand,
    /// In-flight launches keyed by run folder. Entries are removed once the
    /// launch has persisted its terminal state.
    pub launches: Arc<Mutex<HashMap<String, Arc<LaunchHandle>>>>,
}

impl AppState {
    pub fn new(root: PathBuf, config: Config) -> Self {
        let layout = config.layout(&root);
        let command = PipelineCommand {
            argv: config.pipeline.command.clone(),
            working_dir: config.pipeline_working_dir(&root),
        };
        Self {
            root,
            config: Arc::new(config),
            layout,
            command,
            launches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Launch `plan` unless a launch for the same folder is still in flight.
    pub async fn start_launch(&self, plan: &LaunchPlan) -> Result<Arc<LaunchHandle>, AppError> {
        // Check and insert under one lock window.
        let handle = {
            let mut launches = self.launches.lock().await;
            if let Some(existing) = launches.get(&plan.folder) {
                if !existing.is_completed() {
                    warn!(folder = %plan.folder, "launch rejected: already in flight");
                    return Err(AppError::conflict(format!(
                        "pipeline already running for '{}'",
                        plan.folder
                    )));
                }
            }
            // Launch setup does blocking file IO. The lock stays held across it.
            let command = self.command.clone();
            let owned = plan.clone();
            let handle = tokio::task::spawn_blocking(move || launcher::launch(&command, &owned))
                .await
                .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
            let handle = Arc::new(handle);
            launches.insert(plan.folder.clone(), handle.clone());
            handle
        };

        let launches = self.launches.clone();
        let tracked = handle.clone();
        tokio::spawn(async move {
            tracked.wait().await;
            let mut launches = launches.lock().await;
            if launches
                .get(&tracked.folder)
                .is_some_and(|current| Arc::ptr_eq(current, &tracked))
            {
                launches.remove(&tracked.folder);
            }
            info!(folder = %tracked.folder, "launch released");
        });

        Ok(handle)
    }

    /// Live handle for an in-flight launch of `folder`, if any.
    pub async fn active_launch(&self, folder: &str) -> Option<Arc<LaunchHandle>> {
        self.launches.lock().await.get(folder).cloned()
    }
}
