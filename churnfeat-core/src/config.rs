//! Configuration for churnfeat runs.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> explicit file -> environment. Command-line flags are
//! applied by the caller on top of the extracted value.

use crate::error::ChurnError;
use crate::pipeline::DataPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides (`CHURNFEAT_DATABASE__PATH`, ...).
pub const ENV_PREFIX: &str = "CHURNFEAT_";

/// Directory, relative to the workspace, holding `config.toml`.
pub const WORKSPACE_CONFIG_DIR: &str = ".churnfeat";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChurnConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Where the customer table lives and where derived data goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Raw customer table. Never modified by a run.
    #[serde(default = "default_source_table")]
    pub source_table: String,
    /// Table holding raw plus derived columns, replaced on every run.
    #[serde(default = "default_output_table")]
    pub output_table: String,
    /// Projection view over the output table, in export column order.
    #[serde(default = "default_view_name")]
    pub view_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            source_table: default_source_table(),
            output_table: default_output_table(),
            view_name: default_view_name(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("churn.db")
}

fn default_source_table() -> String {
    "customers".to_string()
}

fn default_output_table() -> String {
    "customer_features".to_string()
}

fn default_view_name() -> String {
    "customer_features_view".to_string()
}

/// Names of the raw columns in the source table (and in imported CSV headers).
///
/// Defaults follow the public telco customer-churn dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub customer_id: String,
    pub gender: String,
    pub senior_citizen: String,
    pub tenure: String,
    pub internet_service: String,
    pub contract: String,
    pub online_security: String,
    pub online_backup: String,
    pub device_protection: String,
    pub tech_support: String,
    pub streaming_tv: String,
    pub streaming_movies: String,
    pub monthly_charges: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            customer_id: "customerID".to_string(),
            gender: "gender".to_string(),
            senior_citizen: "SeniorCitizen".to_string(),
            tenure: "tenure".to_string(),
            internet_service: "InternetService".to_string(),
            contract: "Contract".to_string(),
            online_security: "OnlineSecurity".to_string(),
            online_backup: "OnlineBackup".to_string(),
            device_protection: "DeviceProtection".to_string(),
            tech_support: "TechSupport".to_string(),
            streaming_tv: "StreamingTV".to_string(),
            streaming_movies: "StreamingMovies".to_string(),
            monthly_charges: "MonthlyCharges".to_string(),
        }
    }
}

impl ColumnMapping {
    /// Source column names in the order the store selects them.
    pub fn source_columns(&self) -> [&str; 13] {
        [
            self.customer_id.as_str(),
            self.gender.as_str(),
            self.senior_citizen.as_str(),
            self.tenure.as_str(),
            self.internet_service.as_str(),
            self.contract.as_str(),
            self.online_security.as_str(),
            self.online_backup.as_str(),
            self.device_protection.as_str(),
            self.tech_support.as_str(),
            self.streaming_tv.as_str(),
            self.streaming_movies.as_str(),
            self.monthly_charges.as_str(),
        ]
    }
}

/// Feature pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub policy: DataPolicy,
}

/// CSV export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_path")]
    pub path: PathBuf,
    /// Write a JSON run report next to the export.
    #[serde(default = "default_true")]
    pub report: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
            report: true,
        }
    }
}

impl ExportConfig {
    /// `<export>.report.json` beside the CSV file.
    pub fn report_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "export".into());
        name.push(".report.json");
        self.path.with_file_name(name)
    }
}

fn default_export_path() -> PathBuf {
    PathBuf::from("customer_features.csv")
}

fn default_true() -> bool {
    true
}

/// User-level config file (`~/.config/churnfeat/config.toml` on Linux).
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "churnfeat", "churnfeat")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_CONFIG_DIR).join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `CHURNFEAT_`, `__` for nesting)
/// 2. Explicit config file
/// 3. Workspace-local config (`.churnfeat/config.toml`)
/// 4. User config
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<ChurnConfig, ChurnError> {
    let mut figment = Figment::from(Serialized::defaults(ChurnConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ChurnError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: ChurnConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

impl ChurnConfig {
    /// Reject table layouts that would overwrite the raw data.
    pub fn validate(&self) -> Result<(), ChurnError> {
        let db = &self.database;
        let names = [&db.source_table, &db.output_table, &db.view_name];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ChurnError::config("table and view names must not be empty"));
        }
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                if a.eq_ignore_ascii_case(b) {
                    return Err(ChurnError::config(format!(
                        "source table, output table and view must have distinct names ('{a}' is used twice)"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ChurnConfig::default();
        assert_eq!(config.database.source_table, "customers");
        assert_eq!(config.database.output_table, "customer_features");
        assert_eq!(config.columns.customer_id, "customerID");
        assert_eq!(config.pipeline.policy, DataPolicy::Lenient);
        assert!(config.export.report);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [database]
            path = "data/telco.db"

            [columns]
            customer_id = "id"

            [pipeline]
            policy = "strict"
        "#;
        let config: ChurnConfig = Figment::from(Serialized::defaults(ChurnConfig::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .unwrap();
        assert_eq!(config.database.path, PathBuf::from("data/telco.db"));
        assert_eq!(config.database.source_table, "customers");
        assert_eq!(config.columns.customer_id, "id");
        assert_eq!(config.columns.gender, "gender");
        assert_eq!(config.pipeline.policy, DataPolicy::Strict);
    }

    #[test]
    fn test_workspace_config_is_loaded() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join(WORKSPACE_CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[export]\npath = \"out/features.csv\"\nreport = false\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.export.path, PathBuf::from("out/features.csv"));
        assert!(!config.export.report);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing)).unwrap_err();
        assert!(matches!(err, ChurnError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_colliding_names() {
        let mut config = ChurnConfig::default();
        config.database.output_table = "Customers".to_string();
        assert!(matches!(config.validate(), Err(ChurnError::Config(_))));

        let mut config = ChurnConfig::default();
        config.database.view_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_report_path_sits_beside_export() {
        let export = ExportConfig {
            path: PathBuf::from("out/features.csv"),
            report: true,
        };
        assert_eq!(
            export.report_path(),
            PathBuf::from("out/features.report.json")
        );
    }
}
