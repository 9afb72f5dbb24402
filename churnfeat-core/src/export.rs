//! Projection of feature records and CSV export.

use crate::error::ChurnError;
use crate::persist::{self, StagedFile};
use crate::record::FeatureRecord;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Exported columns, in file order. The projection view uses the same order.
pub const EXPORT_COLUMNS: [&str; 12] = [
    "customer_id",
    "senior_citizen",
    "internet_dsl",
    "internet_fiber",
    "internet_no",
    "contract_numeric",
    "num_services",
    "tenure_bin_short",
    "tenure_bin_med",
    "tenure_bin_long",
    "monthly_charges_norm",
    "gender_code",
];

/// One exported line. Field order must match [`EXPORT_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub customer_id: String,
    pub senior_citizen: Option<i64>,
    pub internet_dsl: u8,
    pub internet_fiber: u8,
    pub internet_no: u8,
    pub contract_numeric: Option<u8>,
    pub num_services: u8,
    pub tenure_bin_short: u8,
    pub tenure_bin_med: u8,
    pub tenure_bin_long: u8,
    pub monthly_charges_norm: Option<f64>,
    pub gender_code: u8,
}

impl From<&FeatureRecord> for ExportRow {
    fn from(r: &FeatureRecord) -> Self {
        Self {
            customer_id: r.raw.customer_id.clone(),
            senior_citizen: r.raw.senior_citizen,
            internet_dsl: r.internet_dsl,
            internet_fiber: r.internet_fiber,
            internet_no: r.internet_no,
            contract_numeric: r.contract_numeric,
            num_services: r.num_services,
            tenure_bin_short: r.tenure_bin_short,
            tenure_bin_med: r.tenure_bin_med,
            tenure_bin_long: r.tenure_bin_long,
            monthly_charges_norm: r.monthly_charges_norm,
            gender_code: r.gender_code,
        }
    }
}

/// Write the header and one line per record. Returns the number of records.
///
/// Missing values become empty fields; fields containing a comma, quote or
/// line break are quoted.
pub fn write_csv<W: Write>(records: &[FeatureRecord], writer: W) -> Result<usize, ChurnError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    // Written explicitly so an empty export still carries its header.
    csv_writer.write_record(EXPORT_COLUMNS)?;
    for record in records {
        csv_writer.serialize(ExportRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(records.len())
}

/// Write the export next to `path` without replacing it yet.
///
/// The returned file is moved into place by [`StagedFile::commit`], so the
/// caller can hold the export back until its other writes have succeeded.
pub fn stage_csv(
    records: &[FeatureRecord],
    path: &Path,
) -> Result<(StagedFile, usize), ChurnError> {
    let mut written = 0;
    let staged = persist::stage(path, |file| {
        written = write_csv(records, file)?;
        Ok(())
    })?;
    Ok((staged, written))
}

/// Export to `path`, replacing any previous export only once fully written.
pub fn export_csv(records: &[FeatureRecord], path: &Path) -> Result<usize, ChurnError> {
    let (staged, written) = stage_csv(records, path)?;
    staged.commit()?;
    tracing::info!(rows = written, path = %path.display(), "Exported features to CSV");
    Ok(written)
}
