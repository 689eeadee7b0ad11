//! Layered Settings
//!
//! Built-in defaults, then an optional TOML file, then `AQH__` environment
//! variables (`AQH__SERVER__PORT=9000`, `AQH__DATA__SEED=7`).

use config::{Config, ConfigError, Environment, File};
use dashboard::DashboardConfig;
use dataset::DataConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use training::TrainingConfig;

/// HTTP server and artifact location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root of the per-domain artifact directories
    pub artifact_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            artifact_dir: PathBuf::from("models"),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// One JSON object per event instead of the human-readable format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub dashboard: DashboardConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings, reading `file` when given
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("AQH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.server.addr(), "0.0.0.0:8000");
        assert_eq!(settings.data.seed, 42);
        assert_eq!(settings.dashboard.personal_alert_limit, 20);
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\nartifact_dir = \"/tmp/aqh-models\"\n\n[dashboard]\npersonal_alert_limit = 5\n"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.artifact_dir, PathBuf::from("/tmp/aqh-models"));
        assert_eq!(settings.dashboard.personal_alert_limit, 5);
        assert_eq!(settings.dashboard.trend_sample, 50);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/aqh.toml"))).is_err());
    }
}
