//! End-to-end run: read, transform, persist, export, report.

use crate::config::ChurnConfig;
use crate::error::ChurnError;
use crate::export;
use crate::pipeline::{FeaturePipeline, TransformSummary};
use crate::report::RunReport;
use crate::store::{CustomerStore, SqliteStore};
use chrono::Utc;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub rows: usize,
    pub summary: TransformSummary,
    /// Present when report writing is enabled.
    pub report: Option<RunReport>,
}

/// Run the pipeline against the SQLite database named in `config`.
pub fn run(config: &ChurnConfig) -> Result<RunOutcome, ChurnError> {
    config.validate()?;
    let mut store =
        SqliteStore::open(&config.database, &config.columns, config.pipeline.policy)?;
    run_with_store(&mut store, config)
}

/// Run the pipeline against any store.
///
/// Nothing is written unless every record transforms cleanly. The export is
/// staged before the store write and only moved into place once the store has
/// committed, so a failed store write leaves the previous export in place.
pub fn run_with_store<S: CustomerStore>(
    store: &mut S,
    config: &ChurnConfig,
) -> Result<RunOutcome, ChurnError> {
    let started_at = Utc::now();
    let pipeline = FeaturePipeline::new(config.pipeline.policy);
    tracing::info!(policy = ?pipeline.policy(), "Starting feature run");

    let records = store.read_all()?;
    let (features, summary) = pipeline.transform_with_summary(&records)?;
    let (staged, rows) = export::stage_csv(&features, &config.export.path)?;
    store.write_features(&features)?;
    staged.commit()?;
    tracing::info!(rows, path = %config.export.path.display(), "Exported features to CSV");

    let report = if config.export.report {
        let report = RunReport::new(config, started_at, summary.clone(), rows)?;
        report.save(&config.export.report_path())?;
        Some(report)
    } else {
        None
    };

    tracing::info!(
        rows,
        elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
        "Feature run complete"
    );
    Ok(RunOutcome {
        rows,
        summary,
        report,
    })
}
