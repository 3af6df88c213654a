//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden by
//! `CODEINTEL_RETENTION_*` environment variables:
//!
//! ```toml
//! [expirer]
//! repository_process_delay_secs = 86400
//! repository_batch_size = 100
//! upload_process_delay_secs = 86400
//! upload_batch_size = 100
//! interval_secs = 60
//!
//! [storage]
//! db_path = "/var/lib/codeintel-retention/retention.db"
//!
//! [git]
//! repos_root = "/var/lib/gitserver/repos"
//!
//! [logging]
//! format = "json"
//! level = "info"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```
//!
//! The `[expirer]` values have no defaults: a scan cannot start until every
//! one of them is set.

use crate::gc::ExpirerConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "CODEINTEL_RETENTION_";

/// File name of the database when no path is configured.
pub const DEFAULT_DB_FILE: &str = "retention.db";

/// `[expirer]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExpirerSettings {
    /// Minimum seconds between two scans of a repository.
    pub repository_process_delay_secs: Option<u64>,
    /// Repositories scanned per run.
    pub repository_batch_size: Option<usize>,
    /// Minimum seconds between two evaluations of an upload.
    pub upload_process_delay_secs: Option<u64>,
    /// Uploads evaluated per batch.
    pub upload_batch_size: Option<usize>,
    /// Seconds between two worker runs.
    pub interval_secs: Option<u64>,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Path of the `SQLite` database.
    pub db_path: Option<PathBuf>,
}

/// `[git]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GitSettings {
    /// Directory holding one clone per repository id.
    pub repos_root: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive such as `info` or `codeintel_retention=debug`.
    pub level: Option<String>,
    /// Log file; stderr when absent.
    pub file: Option<PathBuf>,
}

/// `[metrics]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetricsSettings {
    /// Whether to expose a Prometheus endpoint.
    pub enabled: Option<bool>,
    /// Listen port of the endpoint.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetentionAppConfig {
    /// Scan loop settings.
    #[serde(default)]
    pub expirer: ExpirerSettings,
    /// Store settings.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Git settings.
    #[serde(default)]
    pub git: GitSettings,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl RetentionAppConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml_str(&contents)
    }

    /// Loads configuration from `path`, or from the default location when
    /// `None`, then applies environment overrides.
    ///
    /// A missing default file yields an empty configuration; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or an override
    /// holds an unparsable value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(default) => Self::load_from_file(&default)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `CODEINTEL_RETENTION_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an override cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by full variable name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an override cannot be parsed.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let expirer = &mut self.expirer;
        override_parsed(
            &var,
            "REPOSITORY_PROCESS_DELAY_SECS",
            &mut expirer.repository_process_delay_secs,
        )?;
        override_parsed(&var, "REPOSITORY_BATCH_SIZE", &mut expirer.repository_batch_size)?;
        override_parsed(
            &var,
            "UPLOAD_PROCESS_DELAY_SECS",
            &mut expirer.upload_process_delay_secs,
        )?;
        override_parsed(&var, "UPLOAD_BATCH_SIZE", &mut expirer.upload_batch_size)?;
        override_parsed(&var, "INTERVAL_SECS", &mut expirer.interval_secs)?;

        if let Some(db_path) = var("DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(repos_root) = var("REPOS_ROOT") {
            self.git.repos_root = Some(PathBuf::from(repos_root));
        }

        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(file) = var("LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }

        if let Some(enabled) = var("METRICS_ENABLED") {
            self.metrics.enabled = Some(parse_bool(&enabled));
        }
        override_parsed(&var, "METRICS_PORT", &mut self.metrics.port)?;

        Ok(())
    }

    /// Builds the expirer configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first missing `[expirer]`
    /// value, or if the values cannot make progress.
    pub fn expirer_config(&self) -> Result<ExpirerConfig> {
        let settings = &self.expirer;
        let config = ExpirerConfig {
            repository_process_delay: Duration::from_secs(required(
                settings.repository_process_delay_secs,
                "repository_process_delay_secs",
            )?),
            repository_batch_size: required(
                settings.repository_batch_size,
                "repository_batch_size",
            )?,
            upload_process_delay: Duration::from_secs(required(
                settings.upload_process_delay_secs,
                "upload_process_delay_secs",
            )?),
            upload_batch_size: required(settings.upload_batch_size, "upload_batch_size")?,
            interval: Duration::from_secs(required(settings.interval_secs, "interval_secs")?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Returns the database path, defaulting to the platform data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.storage.db_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("", "", env!("CARGO_PKG_NAME")).map_or_else(
                || PathBuf::from(DEFAULT_DB_FILE),
                |dirs| dirs.data_dir().join(DEFAULT_DB_FILE),
            )
        })
    }

    /// Returns the directory holding repository clones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `[git] repos_root` is not set.
    pub fn repos_root(&self) -> Result<&Path> {
        self.git
            .repos_root
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("missing required setting git.repos_root".to_string()))
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Returns the default configuration file location.
///
/// `config.toml` in the platform configuration directory
/// (`~/.config/codeintel-retention/` on Linux).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| Error::InvalidInput(format!("missing required setting expirer.{key}")))
}

fn override_parsed<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut Option<T>,
) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = var(name) else {
        return Ok(());
    };

    let value = raw.parse::<T>().map_err(|e| {
        Error::InvalidInput(format!("{ENV_PREFIX}{name}: invalid value '{raw}': {e}"))
    })?;
    *target = Some(value);
    Ok(())
}

fn parse_bool(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
[expirer]
repository_process_delay_secs = 86400
repository_batch_size = 100
upload_process_delay_secs = 3600
upload_batch_size = 50
interval_secs = 60

[storage]
db_path = "/tmp/retention.db"

[git]
repos_root = "/srv/repos"

[logging]
format = "json"
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_full_config_builds_expirer_config() {
        let config = RetentionAppConfig::from_toml_str(FULL).unwrap();
        let expirer = config.expirer_config().unwrap();

        assert_eq!(expirer.repository_process_delay, Duration::from_secs(86_400));
        assert_eq!(expirer.repository_batch_size, 100);
        assert_eq!(expirer.upload_process_delay, Duration::from_secs(3600));
        assert_eq!(expirer.upload_batch_size, 50);
        assert_eq!(expirer.interval, Duration::from_secs(60));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/retention.db"));
        assert_eq!(config.repos_root().unwrap(), Path::new("/srv/repos"));
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_missing_expirer_value_is_reported() {
        let config = RetentionAppConfig::from_toml_str(
            "[expirer]\nrepository_process_delay_secs = 1\nrepository_batch_size = 1\n",
        )
        .unwrap();

        let err = config.expirer_config().unwrap_err();
        assert!(err.to_string().contains("expirer.upload_process_delay_secs"));
    }

    #[test]
    fn test_empty_config_has_no_expirer_defaults() {
        let config = RetentionAppConfig::new();
        assert!(config.expirer_config().is_err());
        assert!(config.repos_root().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = RetentionAppConfig::from_toml_str(FULL).unwrap();
        config.expirer.upload_batch_size = Some(0);
        assert!(matches!(config.expirer_config(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RetentionAppConfig::from_toml_str(FULL).unwrap();
        config
            .apply_overrides(env(&[
                ("CODEINTEL_RETENTION_UPLOAD_BATCH_SIZE", "7"),
                ("CODEINTEL_RETENTION_REPOS_ROOT", "/data/repos"),
                ("CODEINTEL_RETENTION_METRICS_ENABLED", "yes"),
                ("CODEINTEL_RETENTION_METRICS_PORT", "9191"),
                ("CODEINTEL_RETENTION_LOG_LEVEL", " debug "),
                ("CODEINTEL_RETENTION_DB_PATH", ""),
            ]))
            .unwrap();

        assert_eq!(config.expirer.upload_batch_size, Some(7));
        assert_eq!(config.repos_root().unwrap(), Path::new("/data/repos"));
        assert_eq!(config.metrics.enabled, Some(true));
        assert_eq!(config.metrics.port, Some(9191));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        // Blank overrides are ignored
        assert_eq!(config.db_path(), PathBuf::from("/tmp/retention.db"));
    }

    #[test]
    fn test_invalid_env_override_is_an_error() {
        let mut config = RetentionAppConfig::new();
        let err = config
            .apply_overrides(env(&[("CODEINTEL_RETENTION_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("CODEINTEL_RETENTION_INTERVAL_SECS"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(RetentionAppConfig::from_toml_str("[expirer\n").is_err());
        assert!(
            RetentionAppConfig::from_toml_str("[expirer]\nupload_batch_size = \"many\"\n").is_err()
        );
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = RetentionAppConfig::from_toml_str(FULL).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(RetentionAppConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(RetentionAppConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
