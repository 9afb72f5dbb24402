//! churnfeat CLI: runs the churn feature pipeline against a SQLite database.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// churnfeat: feature engineering for customer-churn tables
#[derive(Parser, Debug)]
#[command(name = "churnfeat", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Workspace directory (searched for .churnfeat/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Derive features, write the output table and view, export CSV
    Run {
        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Source customer table
        #[arg(long)]
        table: Option<String>,
        /// CSV export path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Abort on out-of-domain or unparseable values
        #[arg(long)]
        strict: bool,
        /// Skip the JSON run report
        #[arg(long)]
        no_report: bool,
    },
    /// Load a raw churn CSV into the source table
    Import {
        /// CSV file with a header row
        csv: PathBuf,
        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Source customer table to (re)create
        #[arg(long)]
        table: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "churnfeat", "churnfeat")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "churnfeat.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "churnfeat",
            "-v",
            "run",
            "--db",
            "telco.db",
            "--strict",
            "-o",
            "out.csv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run {
                db,
                strict,
                output,
                no_report,
                table,
            } => {
                assert_eq!(db, Some(PathBuf::from("telco.db")));
                assert!(strict);
                assert!(!no_report);
                assert_eq!(output, Some(PathBuf::from("out.csv")));
                assert!(table.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from(["churnfeat", "import", "telco.csv", "--table", "raw"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Import { ref csv, ref table, .. }
                if csv == &PathBuf::from("telco.csv") && table.as_deref() == Some("raw")
        ));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["churnfeat"]).is_err());
    }
}
