//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use churnfeat_core::config::{WORKSPACE_CONFIG_DIR, workspace_config_path};
use churnfeat_core::{ChurnConfig, DataPolicy, RunOutcome, SqliteStore};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            db,
            table,
            output,
            strict,
            no_report,
        } => {
            let mut config = load(workspace, config_path)?;
            apply_overrides(&mut config, db, table);
            if let Some(output) = output {
                config.export.path = output;
            }
            if strict {
                config.pipeline.policy = DataPolicy::Strict;
            }
            if no_report {
                config.export.report = false;
            }
            let outcome = run_blocking(config.clone()).await?;
            print_outcome(&config, &outcome);
            Ok(())
        }
        Commands::Import { csv, db, table } => {
            let mut config = load(workspace, config_path)?;
            apply_overrides(&mut config, db, table);
            let rows = import_blocking(config.clone(), csv.clone()).await?;
            println!(
                "Imported {} rows from {} into {}.{}",
                rows,
                csv.display(),
                config.database.path.display(),
                config.database.source_table
            );
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, config_path),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(WORKSPACE_CONFIG_DIR);
            std::fs::create_dir_all(&config_dir)?;

            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&ChurnConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_path)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Load layered configuration and anchor relative paths at the workspace.
fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<ChurnConfig> {
    let mut config = churnfeat_core::load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config.database.path = anchor(workspace, &config.database.path);
    config.export.path = anchor(workspace, &config.export.path);
    Ok(config)
}

fn anchor(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn apply_overrides(config: &mut ChurnConfig, db: Option<PathBuf>, table: Option<String>) {
    if let Some(db) = db {
        config.database.path = db;
    }
    if let Some(table) = table {
        config.database.source_table = table;
    }
}

async fn run_blocking(config: ChurnConfig) -> anyhow::Result<RunOutcome> {
    let outcome = tokio::task::spawn_blocking(move || churnfeat_core::run(&config)).await??;
    Ok(outcome)
}

async fn import_blocking(config: ChurnConfig, csv: PathBuf) -> anyhow::Result<usize> {
    let rows = tokio::task::spawn_blocking(move || {
        config.validate()?;
        let mut store =
            SqliteStore::open(&config.database, &config.columns, config.pipeline.policy)?;
        store.import_csv(&csv)
    })
    .await??;
    Ok(rows)
}

fn print_outcome(config: &ChurnConfig, outcome: &RunOutcome) {
    let summary = &outcome.summary;
    println!(
        "Derived features for {} customers ({:?} policy)",
        outcome.rows, config.pipeline.policy
    );
    println!(
        "  tenure bins: short {}, medium {}, long {}, unknown {}",
        summary.tenure_short,
        summary.tenure_medium,
        summary.tenure_long,
        summary.tenure_unknown
    );
    if summary.unmatched_gender + summary.unmatched_internet + summary.unmatched_contract > 0 {
        println!(
            "  unmatched values: gender {}, internet {}, contract {}",
            summary.unmatched_gender, summary.unmatched_internet, summary.unmatched_contract
        );
    }
    match &summary.charge_stats {
        Some(stats) => println!(
            "  monthly charges: min {:.2}, max {:.2}, {} null",
            stats.min, stats.max, summary.null_charges
        ),
        None => println!("  monthly charges: no usable values"),
    }
    println!(
        "  table {} / view {} in {}",
        config.database.output_table,
        config.database.view_name,
        config.database.path.display()
    );
    println!("  exported {}", config.export.path.display());
    if outcome.report.is_some() {
        println!("  report {}", config.export.report_path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RAW_CSV: &str = "\
customerID,gender,SeniorCitizen,tenure,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,MonthlyCharges
A,Female,0,1,DSL,No,Yes,No,No,No,No,Month-to-month,29.85
B,Male,0,34,Fiber optic,Yes,No,Yes,No,Yes,Yes,One year,89.10
C,Male,1,20,No,No internet service,No internet service,No internet service,No internet service,No internet service,No internet service,Two year,19.80
";

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();

        let config_path = workspace.join(".churnfeat").join("config.toml");
        assert!(config_path.exists());

        // Verify it's valid TOML
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: ChurnConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.database.source_table, "customers");
        assert_eq!(parsed.pipeline.policy, DataPolicy::Lenient);
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let config_path = workspace.join(".churnfeat").join("config.toml");

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();
        std::fs::write(&config_path, "[pipeline]\npolicy = \"strict\"\n").unwrap();

        // Second init must not overwrite the edited file
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("strict"));
    }

    #[tokio::test]
    async fn test_config_show() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        handle_command(command, dir.path(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_import_then_run() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let csv = workspace.join("telco.csv");
        std::fs::write(&csv, RAW_CSV).unwrap();

        let command = Commands::Import {
            csv,
            db: None,
            table: None,
        };
        handle_command(command, workspace, None).await.unwrap();
        assert!(workspace.join("churn.db").exists());

        let command = Commands::Run {
            db: None,
            table: None,
            output: None,
            strict: true,
            no_report: false,
        };
        handle_command(command, workspace, None).await.unwrap();

        let export = std::fs::read_to_string(workspace.join("customer_features.csv")).unwrap();
        let lines: Vec<&str> = export.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("A,0,1,0,0,0,1,1,0,0,"));
        let norm: f64 = lines[1].split(',').nth(10).unwrap().parse().unwrap();
        assert!((norm - 10.05 / 69.3).abs() < 1e-9);
        assert_eq!(lines[3], "C,1,0,0,1,2,0,0,1,0,0.0,1");
        assert!(workspace.join("customer_features.report.json").exists());
    }

    #[tokio::test]
    async fn test_run_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let csv = workspace.join("telco.csv");
        std::fs::write(&csv, RAW_CSV).unwrap();
        let db = workspace.join("data").join("telco.db");
        std::fs::create_dir_all(db.parent().unwrap()).unwrap();

        let command = Commands::Import {
            csv,
            db: Some(db.clone()),
            table: Some("raw_customers".into()),
        };
        handle_command(command, workspace, None).await.unwrap();

        let output = workspace.join("out").join("features.csv");
        let command = Commands::Run {
            db: Some(db),
            table: Some("raw_customers".into()),
            output: Some(output.clone()),
            strict: false,
            no_report: true,
        };
        handle_command(command, workspace, None).await.unwrap();

        assert!(output.exists());
        assert!(!workspace.join("out").join("features.report.json").exists());
        assert!(!workspace.join("churn.db").exists());
    }

    #[tokio::test]
    async fn test_run_without_source_table_fails() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Run {
            db: None,
            table: None,
            output: None,
            strict: false,
            no_report: true,
        };
        let err = handle_command(command, dir.path(), None).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("customers"));
    }

    #[test]
    fn test_anchor_keeps_absolute_paths() {
        let ws = Path::new("/work");
        assert_eq!(
            anchor(ws, Path::new("churn.db")),
            PathBuf::from("/work/churn.db")
        );
        assert_eq!(
            anchor(ws, Path::new("/data/x.db")),
            PathBuf::from("/data/x.db")
        );
    }
}
