//! Run report written next to the CSV export.

use crate::config::ChurnConfig;
use crate::error::ChurnError;
use crate::persist;
use crate::pipeline::{DataPolicy, TransformSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What a pipeline run read, derived and wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub policy: DataPolicy,
    pub database: PathBuf,
    pub source_table: String,
    pub output_table: String,
    pub view_name: String,
    pub summary: TransformSummary,
    pub export_path: PathBuf,
    pub export_rows: usize,
    /// SHA-256 of the exported CSV.
    pub export_sha256: String,
}

impl RunReport {
    pub fn new(
        config: &ChurnConfig,
        started_at: DateTime<Utc>,
        summary: TransformSummary,
        export_rows: usize,
    ) -> Result<Self, ChurnError> {
        let export_path = config.export.path.clone();
        let export_sha256 = persist::sha256_file(&export_path)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            policy: config.pipeline.policy,
            database: config.database.path.clone(),
            source_table: config.database.source_table.clone(),
            output_table: config.database.output_table.clone(),
            view_name: config.database.view_name.clone(),
            summary,
            export_path,
            export_rows,
            export_sha256,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ChurnError> {
        persist::write_json_atomically(path, self)?;
        tracing::debug!(path = %path.display(), run_id = %self.run_id, "Saved run report");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ChurnError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
