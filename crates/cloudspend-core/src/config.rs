//! Configuration file: load, validate, save.
//!
//! Lives at `<config_dir>/config.json`. A missing or corrupt file is a
//! `ConfigError` pointing the user at `cloudspend init`.

use crate::error::ConfigError;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_warn_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Project that hosts the billing export dataset (and is billed for
    /// the queries).
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub projects: Vec<ProjectConfig>,
    pub bigquery: BigQueryConfig,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Watch-loop poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_poll_interval() -> u64 {
    300
}

/// Charset allowed in GCP project/dataset/table identifiers. Also what
/// keeps interpolated table refs injection-safe.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.projects.is_empty() {
            return Err(ConfigError::new("config must list at least one project"));
        }
        if !is_valid_identifier(&self.bigquery.project_id) {
            return Err(ConfigError::new(format!(
                "invalid BigQuery project id: {:?}",
                self.bigquery.project_id
            )));
        }
        for id in [&self.bigquery.dataset_id, &self.bigquery.table_id]
            .into_iter()
            .flatten()
        {
            if !is_valid_identifier(id) {
                return Err(ConfigError::new(format!(
                    "invalid BigQuery identifier: {id:?}"
                )));
            }
        }
        for project in &self.projects {
            if project.project_id.is_empty() {
                return Err(ConfigError::new("project id must not be empty"));
            }
            if let Some(budget) = project.monthly_budget {
                if budget <= 0.0 {
                    return Err(ConfigError::new(format!(
                        "monthly budget for {} must be positive",
                        project.project_id
                    )));
                }
            }
            if let Some(warn) = project.budget_warn_percent {
                if !(0.0..=100.0).contains(&warn) {
                    return Err(ConfigError::new(format!(
                        "budget warn percent for {} must be between 0 and 100",
                        project.project_id
                    )));
                }
            }
        }
        if self.poll_interval == 0 {
            return Err(ConfigError::new("poll interval must be positive"));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&paths::config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::new("no configuration found"));
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ConfigError::new(format!("cannot read config: {e}")))?;
    let config: Config = serde_json::from_str(&raw).map_err(|_| {
        ConfigError::with_hint(
            "config file is corrupted or contains invalid JSON",
            "run: cloudspend init to reconfigure",
        )
    })?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    paths::ensure_dirs()
        .map_err(|e| ConfigError::new(format!("cannot create config dir: {e}")))?;
    save_config_to(config, &paths::config_path())
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::new(format!("cannot serialize config: {e}")))?;
    fs::write(path, json).map_err(|e| ConfigError::new(format!("cannot write config: {e}")))?;
    Ok(())
}

pub fn config_exists() -> bool {
    paths::config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            projects: vec![ProjectConfig {
                project_id: "my-project".into(),
                display_name: None,
                billing_account_id: None,
                monthly_budget: Some(500.0),
                budget_warn_percent: Some(80.0),
            }],
            bigquery: BigQueryConfig {
                project_id: "billing-project".into(),
                dataset_id: Some("billing_export".into()),
                table_id: None,
            },
            currency: "USD".into(),
            poll_interval: 300,
        }
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_config_to(&sample_config(), &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.projects[0].project_id, "my-project");
        assert_eq!(loaded.bigquery.dataset_id.as_deref(), Some("billing_export"));
        assert_eq!(loaded.currency, "USD");
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("no configuration"));
        assert!(err.hint.is_some());
    }

    #[test]
    fn corrupt_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }

    #[test]
    fn defaults_applied_when_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"projects":[{"project_id":"p"}],"bigquery":{"project_id":"b"}}"#,
        )
        .unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.currency, "USD");
        assert_eq!(config.poll_interval, 300);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = sample_config();
        config.projects.clear();
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.bigquery.dataset_id = Some("bad dataset!".into());
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.projects[0].monthly_budget = Some(-5.0);
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.projects[0].budget_warn_percent = Some(150.0);
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.poll_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn identifier_charset() {
        assert!(is_valid_identifier("my-project.dataset_1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("back`tick"));
    }
}
