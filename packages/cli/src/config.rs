//! Run configuration.
//!
//! Defaults are embedded from `config/default.toml`. A user file is merged
//! over them key by key, so it only needs the settings it changes.

use std::path::{Path, PathBuf};

use park_assets_evaluate::EvaluateOptions;
use park_assets_notify::EmailSettings;
use park_assets_report::ReportOptions;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors from loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config is not valid TOML or has wrongly-typed values.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Everything a run needs apart from database credentials, which come from
/// the environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QualityCheckConfig {
    /// Reference boundary `GeoJSON`.
    pub boundary_path: PathBuf,
    /// Where the HTML report is written.
    pub output_path: PathBuf,
    /// Evaluation settings.
    #[serde(default)]
    pub evaluate: EvaluateOptions,
    /// Report presentation.
    #[serde(default)]
    pub report: ReportOptions,
    /// Optional email delivery.
    #[serde(default)]
    pub email: EmailSettings,
}

impl QualityCheckConfig {
    /// Loads the embedded defaults, merged with `path` when given.
    ///
    /// # Errors
    ///
    /// * If `path` cannot be read
    /// * If either document is invalid
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let overrides = path
            .map(|path| {
                std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .transpose()?;

        if let Some(path) = path {
            log::info!("Using config {}", path.display());
        }

        Self::from_toml(overrides.as_deref())
    }

    /// Parses the embedded defaults merged with `overrides`.
    ///
    /// # Errors
    ///
    /// * If either document is invalid
    pub fn from_toml(overrides: Option<&str>) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::de::from_str(DEFAULT_CONFIG)?;
        if let Some(overrides) = overrides {
            merge(&mut merged, toml::de::from_str(overrides)?);
        }

        Ok(toml::Value::Table(merged).try_into()?)
    }
}

/// Recursively overlays `overrides` onto `base`. Nested tables merge; any
/// other value replaces the base value.
fn merge(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_option_defaults() {
        let config = QualityCheckConfig::from_toml(None).unwrap();
        assert_eq!(config.boundary_path, PathBuf::from("data/boundary.geojson"));
        assert_eq!(config.evaluate, EvaluateOptions::default());
        assert_eq!(config.report, ReportOptions::default());
        assert_eq!(config.email, EmailSettings::default());
    }

    #[test]
    fn override_changes_only_given_keys() {
        let config = QualityCheckConfig::from_toml(Some(
            r#"
            output_path = "out/report.html"

            [evaluate]
            noise_threshold_m = 100.0

            [email]
            enabled = true
            to = ["gis@example.com"]
            "#,
        ))
        .unwrap();

        assert_eq!(config.output_path, PathBuf::from("out/report.html"));
        assert_eq!(config.boundary_path, PathBuf::from("data/boundary.geojson"));
        assert!((config.evaluate.noise_threshold_m - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.evaluate.schema, "assets");
        assert_eq!(
            config.evaluate.excluded_tables,
            EvaluateOptions::default().excluded_tables
        );
        assert!(config.email.enabled);
        assert_eq!(config.email.to, vec!["gis@example.com"]);
        assert_eq!(config.email.smtp_port, 25);
    }

    #[test]
    fn arrays_are_replaced_not_appended() {
        let config =
            QualityCheckConfig::from_toml(Some("[evaluate]\nexcluded_tables = [\"signs\"]\n"))
                .unwrap();
        assert_eq!(config.evaluate.excluded_tables, vec!["signs"]);
    }

    #[test]
    fn rejects_wrong_types() {
        let result = QualityCheckConfig::from_toml(Some("[report]\nzoom = \"far\"\n"));
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = QualityCheckConfig::load(Some(Path::new("/nonexistent/park_assets.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
