use crate::error::{ClonekitError, Result};
use crate::paths::{self, StorageLayout};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// The external capture/build command. The platform and binary path are
/// appended as the final two arguments on every launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_command")]
    pub command: Vec<String>,
    /// Working directory for the process; relative paths resolve against
    /// the portal root. Defaults to the root itself.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_pipeline_command() -> Vec<String> {
    vec![
        "python3".to_string(),
        "automation/shared/run_pipeline.py".to_string(),
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command: default_pipeline_command(),
            working_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig / RetentionConfig / ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    crate::registry::DEFAULT_LIMIT
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

fn default_retention_days() -> u32 {
    1
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted upload body, in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_port() -> u16 {
    4173
}

fn default_max_upload_mb() -> u64 {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_STORAGE_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            pipeline: PipelineConfig::default(),
            registry: RegistryConfig::default(),
            retention: RetentionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load `.clonekit/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        serde_yaml::from_str(&data)
            .map_err(|e| ClonekitError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Storage layout with the storage directory resolved against `root`.
    pub fn layout(&self, root: &Path) -> StorageLayout {
        StorageLayout::new(&root.join(&self.storage_dir))
    }

    pub fn pipeline_working_dir(&self, root: &Path) -> PathBuf {
        match &self.pipeline.working_dir {
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        match self.pipeline.command.first() {
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "pipeline.command must not be empty".to_string(),
            }),
            Some(program) if program.trim().is_empty() => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "pipeline.command[0] must name a program".to_string(),
            }),
            Some(program) => {
                if !program.contains('/') && which::which(program).is_err() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("pipeline program '{program}' not found on PATH"),
                    });
                }
            }
        }

        if self.registry.limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "registry.limit must be at least 1".to_string(),
            });
        }

        if self.retention.days == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "retention.days is 0: cleanup removes every artefact".to_string(),
            });
        }

        warnings
    }

    /// Fail on the first error-level validation finding.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(ClonekitError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.registry.limit, 10);
        assert_eq!(cfg.retention.days, 1);
        assert_eq!(cfg.storage_dir, PathBuf::from("web/storage"));
        assert_eq!(cfg.pipeline.command[0], "python3");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".clonekit")).unwrap();
        std::fs::write(
            dir.path().join(".clonekit/config.yaml"),
            "registry:\n  limit: 3\npipeline:\n  command: [sh, run.sh]\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.registry.limit, 3);
        assert_eq!(cfg.pipeline.command, vec!["sh", "run.sh"]);
        assert_eq!(cfg.server.port, 4173);
    }

    #[test]
    fn unparsable_file_is_invalid_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".clonekit")).unwrap();
        std::fs::write(dir.path().join(".clonekit/config.yaml"), "registry: [").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, ClonekitError::InvalidConfig(_)));
    }

    #[test]
    fn empty_command_and_zero_limit_are_errors() {
        let mut cfg = Config::default();
        cfg.pipeline.command.clear();
        cfg.registry.limit = 0;
        let errors: Vec<_> = cfg
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn layout_resolves_against_root() {
        let cfg = Config::default();
        let layout = cfg.layout(Path::new("/srv/portal"));
        assert_eq!(layout.uploads, PathBuf::from("/srv/portal/web/storage/uploads"));
        assert_eq!(layout.logs, PathBuf::from("/srv/portal/web/storage/logs"));
    }
}
