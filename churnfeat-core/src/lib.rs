//! # churnfeat-core: feature engineering for customer-churn tables
//!
//! Reads a raw customer table from SQLite, derives model-ready features and
//! writes them back as a separate table and projection view, then exports the
//! projection to CSV.
//!
//! ## Stages
//!
//! 1. gender → `gender_code` (binary)
//! 2. internet service → `internet_dsl` / `internet_fiber` / `internet_no` (one-hot)
//! 3. contract → `contract_numeric` (ordinal, `None` when unrecognised)
//! 4. six service flags → `num_services` (count of `"Yes"`)
//! 5. tenure → `tenure_bin`
//! 6. `tenure_bin` → `tenure_bin_short` / `_med` / `_long` (one-hot)
//! 7. monthly charges → `monthly_charges_norm` (min-max over the dataset)
//!
//! The raw table is never altered; every run builds fresh feature records.

pub mod config;
pub mod encode;
pub mod error;
pub mod export;
pub mod persist;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod runner;
pub mod store;

pub use config::{ChurnConfig, ColumnMapping, load_config};
pub use encode::{ChargeStats, TenureBin};
pub use error::ChurnError;
pub use export::{EXPORT_COLUMNS, ExportRow, export_csv, write_csv};
pub use pipeline::{DataPolicy, FeaturePipeline, TransformSummary};
pub use record::{CustomerRecord, FeatureRecord, ServiceFlags};
pub use report::RunReport;
pub use runner::{RunOutcome, run};
pub use store::{CustomerStore, SqliteStore};
