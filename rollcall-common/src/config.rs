//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Values resolve in this order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default HTTP port for rollcall-server
pub const DEFAULT_PORT: u16 = 5730;

/// Default minimum similarity accepted as an identity assertion
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.65;

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "rollcall.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path; overrides `<root_folder>/rollcall.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Similarity at or above which a candidate counts as a match
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Upper bound on a single uploaded capture or enrollment image
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// How long attendance writes keep retrying on SQLite lock contention
    #[serde(default = "default_db_max_lock_wait_ms")]
    pub db_max_lock_wait_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Admin credential created (or re-keyed) at startup
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// External face matcher endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_matcher_url")]
    pub url: String,

    #[serde(default = "default_matcher_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub id: String,
    pub password: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_db_max_lock_wait_ms() -> u64 {
    5000
}

fn default_matcher_url() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_matcher_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            host: default_host(),
            port: default_port(),
            match_threshold: default_match_threshold(),
            matcher: MatcherConfig::default(),
            max_image_bytes: default_max_image_bytes(),
            db_max_lock_wait_ms: default_db_max_lock_wait_ms(),
            logging: LoggingConfig::default(),
            bootstrap_admin: None,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            url: default_matcher_url(),
            timeout_ms: default_matcher_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(Error::Config(format!(
                "match_threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if self.matcher.timeout_ms == 0 {
            return Err(Error::Config("matcher.timeout_ms must be greater than 0".to_string()));
        }
        if self.matcher.url.trim().is_empty() {
            return Err(Error::Config("matcher.url must not be empty".to_string()));
        }
        if self.max_image_bytes == 0 {
            return Err(Error::Config("max_image_bytes must be greater than 0".to_string()));
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.id.trim().is_empty() || admin.password.is_empty() {
                return Err(Error::Config(
                    "bootstrap_admin requires a non-empty id and password".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Database file for the given root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME))
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load the explicit config file if given, else the platform default, else defaults
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }
    match find_config_file() {
        Some(path) => {
            info!("Using config file {}", path.display());
            load_toml_config(&path)
        }
        None => {
            info!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Platform config file location, if one exists
///
/// Linux checks `~/.config/rollcall/config.toml` then `/etc/rollcall/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("rollcall").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/rollcall/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution: CLI → environment → TOML → OS default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/rollcall (or /var/lib/rollcall for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/rollcall"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/rollcall"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("rollcall"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\rollcall"))
    } else {
        PathBuf::from("./rollcall_data")
    }
}
