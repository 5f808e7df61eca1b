//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. A missing file is not an
//! error: the service warns and starts with built-in defaults.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "FPX_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change while the service runs.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding uploads, job snapshots and the catalog database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Job retention and cleanup
    #[serde(default)]
    pub jobs: JobConfig,

    /// Recording/annotation pairing heuristic
    #[serde(default)]
    pub pairing: PairingConfig,

    /// Capacity of the job event broadcast channel
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Job retention configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Terminal jobs older than this are purged from the registry
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// How often the purge sweep runs
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,
}

/// Pairing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PairingConfig {
    /// File-name keywords that mark a file as a behavioral annotation
    #[serde(default = "default_annotation_keywords")]
    pub annotation_keywords: Vec<String>,
}

fn default_port() -> u16 {
    5760
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_hours() -> u64 {
    24
}

fn default_cleanup_interval_minutes() -> u64 {
    60
}

fn default_event_bus_capacity() -> usize {
    256
}

fn default_annotation_keywords() -> Vec<String> {
    vec!["top".to_string(), "label".to_string(), "behavior".to_string()]
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            jobs: JobConfig::default(),
            pairing: PairingConfig::default(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            cleanup_interval_minutes: default_cleanup_interval_minutes(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            annotation_keywords: default_annotation_keywords(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration, falling back to defaults when no file exists
    ///
    /// An explicit `path` that exists but cannot be parsed is an error; a
    /// missing file only produces a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    warn!("Could not determine config directory, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!(
                "Config file not found at {}, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Default configuration file location (`<config dir>/fpx/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fpx").join("config.toml"))
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fpx"))
        .unwrap_or_else(|| PathBuf::from("./fpx_data"))
}

/// On-disk layout under the root folder
#[derive(Debug, Clone)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that catalog file paths are relative to
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// SQLite catalog database
    pub fn database_path(&self) -> PathBuf {
        self.root.join("fpx.db")
    }

    /// Per-project fluorescence analysis directory
    pub fn project_dir(&self, project_id: i64) -> PathBuf {
        self.uploads_dir()
            .join("projects")
            .join(project_id.to_string())
            .join("fluorescence")
    }

    /// Snapshot/result directory of one job
    pub fn job_dir(&self, project_id: i64, job_id: &uuid::Uuid) -> PathBuf {
        self.project_dir(project_id).join("jobs").join(job_id.to_string())
    }

    /// Persisted label map of one project
    pub fn label_map_path(&self, project_id: i64) -> PathBuf {
        self.project_dir(project_id).join("label-map.json")
    }

    /// Create the root and uploads directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_dir())?;
        Ok(())
    }
}
