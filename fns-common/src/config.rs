//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// TOML configuration file contents
///
/// Loaded from the platform config directory (see [`config_file_path`]).
/// All fields are optional; the service falls back to environment variables
/// and database settings where applicable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the service database
    pub root_folder: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Generation API key (lowest-priority source; see fns-nn config resolution)
    pub generation_api_key: Option<String>,

    /// Generation model identifier override
    pub generation_model: Option<String>,

    /// Generation API base URL override (primarily for self-hosted gateways)
    pub generation_base_url: Option<String>,
}

impl TomlConfig {
    /// Load configuration from the platform config file.
    ///
    /// Missing file yields the default (empty) configuration; a file that
    /// exists but fails to parse is an error.
    pub fn load() -> Result<Self> {
        let path = match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Self::default()),
        };

        let contents = std::fs::read_to_string(&path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Get the platform config file path (`<config dir>/fns/fns-nn.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fns").join("fns-nn.toml"))
}

/// Resolve the service root folder.
///
/// Priority: CLI argument → `FNS_ROOT_FOLDER` environment variable →
/// TOML `root_folder` → OS-dependent default.
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("FNS_ROOT_FOLDER") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return PathBuf::from(path);
    }

    default_root_folder()
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fns"))
        .unwrap_or_else(|| PathBuf::from("./fns_data"))
}

/// Create the root folder directory if it does not exist
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        tracing::info!(root = %root.display(), "Created root folder");
    }
    Ok(())
}

/// Database file path within the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("fns.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_takes_priority() {
        let config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some("/from/cli"), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn toml_used_when_no_cli_or_env() {
        // Not run in parallel with env-dependent tests; FNS_ROOT_FOLDER is
        // not set in the test environment.
        let config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };
        if std::env::var("FNS_ROOT_FOLDER").is_err() {
            let resolved = resolve_root_folder(None, &config);
            assert_eq!(resolved, PathBuf::from("/from/toml"));
        }
    }

    #[test]
    fn database_path_is_under_root() {
        let path = database_path(Path::new("/data/fns"));
        assert_eq!(path, PathBuf::from("/data/fns/fns.db"));
    }

    #[test]
    fn default_logging_level_is_info() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_config() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/fns"
            generation_api_key = "sk-test"
            generation_model = "test-model"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder.as_deref(), Some("/srv/fns"));
        assert_eq!(config.generation_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.generation_model.as_deref(), Some("test-model"));
        assert_eq!(config.logging.level, "debug");
    }
}
