//! Ambient run configuration: report formatting and default log level.
//! Loaded from an optional TOML file supplied with `--config`, merged onto
//! built-in defaults.

use crate::errors::AnalyzerResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    /// Pretty-print the JSON report instead of compact output.
    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig { pretty: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub report: ReportConfig,
    pub log_level: Option<String>,
}

impl Config {
    /// Starts from built-in defaults and, if `path` is given and exists,
    /// merges in the user's overrides.
    pub fn load(path: Option<&Path>) -> AnalyzerResult<Self> {
        let mut config = Config::default();

        if let Some(path) = path {
            if path.exists() {
                let content = fs::read_to_string(path)?;
                let user: Config = toml::from_str(&content)?;
                config = merge_configs(config, user);
                tracing::debug!("loaded config overrides from {}", path.display());
            } else {
                tracing::debug!("config path {} does not exist, using defaults", path.display());
            }
        }

        Ok(config)
    }
}

fn merge_configs(mut default: Config, user: Config) -> Config {
    default.report.pretty = user.report.pretty;
    if user.log_level.is_some() {
        default.log_level = user.log_level;
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert!(config.report.pretty);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn load_merges_user_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ifscan.toml");
        fs::write(&path, "log_level = \"debug\"\n\n[report]\npretty = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.report.pretty);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn load_with_missing_path_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/ifscan.toml"))).unwrap();
        assert!(config.report.pretty);
    }
}
