//! Feature transform pipeline.
//!
//! Runs the encoders over every customer in two passes: a reduction pass for
//! the dataset-wide charge statistics, then a map pass that builds a fresh
//! [`FeatureRecord`] per customer. The input slice is never modified, so a
//! failed run leaves nothing half-derived behind.

use crate::encode::{
    self, CONTRACT_LEVELS, ChargeStats, GENDER_DOMAIN, GENDER_REFERENCE, INTERNET_LABELS,
    TenureBin,
};
use crate::error::ChurnError;
use crate::record::{CustomerRecord, FeatureRecord};
use serde::{Deserialize, Serialize};

/// What to do with values outside their expected domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPolicy {
    /// Substitute the encoder's default and count the occurrence.
    #[default]
    Lenient,
    /// Abort the run on the first offending value.
    Strict,
}

impl DataPolicy {
    pub fn is_strict(self) -> bool {
        self == Self::Strict
    }
}

/// Counts gathered while transforming, for logging and the run report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformSummary {
    pub rows: usize,
    pub unmatched_gender: usize,
    pub unmatched_internet: usize,
    pub unmatched_contract: usize,
    pub null_charges: usize,
    pub tenure_short: usize,
    pub tenure_medium: usize,
    pub tenure_long: usize,
    pub tenure_unknown: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_stats: Option<ChargeStats>,
}

impl TransformSummary {
    fn count_bin(&mut self, bin: TenureBin) {
        match bin {
            TenureBin::Short => self.tenure_short += 1,
            TenureBin::Medium => self.tenure_medium += 1,
            TenureBin::Long => self.tenure_long += 1,
            TenureBin::Unknown => self.tenure_unknown += 1,
        }
    }
}

/// The fixed sequence of feature derivations.
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    policy: DataPolicy,
}

impl FeaturePipeline {
    pub fn new(policy: DataPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DataPolicy {
        self.policy
    }

    /// Derive features for every record.
    pub fn transform(
        &self,
        records: &[CustomerRecord],
    ) -> Result<Vec<FeatureRecord>, ChurnError> {
        self.transform_with_summary(records).map(|(features, _)| features)
    }

    /// Derive features for every record and report what was absorbed on the way.
    pub fn transform_with_summary(
        &self,
        records: &[CustomerRecord],
    ) -> Result<(Vec<FeatureRecord>, TransformSummary), ChurnError> {
        if self.policy.is_strict() {
            for record in records {
                validate_strict(record)?;
            }
        }

        let stats = ChargeStats::from_values(records.iter().map(|r| r.monthly_charges));
        match &stats {
            Some(s) if s.is_degenerate() => tracing::warn!(
                charge = s.min,
                rows = s.count,
                "All monthly charges are equal; normalized charge left empty"
            ),
            Some(s) => tracing::debug!(min = s.min, max = s.max, "Computed charge statistics"),
            None => tracing::warn!("No monthly charges present; normalized charge left empty"),
        }

        let mut summary = TransformSummary {
            rows: records.len(),
            charge_stats: stats,
            ..Default::default()
        };

        let features: Vec<FeatureRecord> = records
            .iter()
            .map(|record| derive(record, stats.as_ref(), &mut summary))
            .collect();

        let unmatched =
            summary.unmatched_gender + summary.unmatched_internet + summary.unmatched_contract;
        if unmatched > 0 {
            tracing::warn!(
                gender = summary.unmatched_gender,
                internet = summary.unmatched_internet,
                contract = summary.unmatched_contract,
                "Categorical values outside the known domain were encoded with defaults"
            );
        }
        tracing::info!(
            rows = summary.rows,
            short = summary.tenure_short,
            medium = summary.tenure_medium,
            long = summary.tenure_long,
            unknown = summary.tenure_unknown,
            "Derived features"
        );

        Ok((features, summary))
    }
}

fn derive(
    record: &CustomerRecord,
    stats: Option<&ChargeStats>,
    summary: &mut TransformSummary,
) -> FeatureRecord {
    let gender = record.gender.as_deref();
    let internet = record.internet_service.as_deref();
    let contract = record.contract.as_deref();

    if !encode::in_domain(gender, &GENDER_DOMAIN) {
        summary.unmatched_gender += 1;
    }
    if !encode::in_domain(internet, &INTERNET_LABELS) {
        summary.unmatched_internet += 1;
    }

    let gender_code = encode::binary_encode(gender, GENDER_REFERENCE);
    let [internet_dsl, internet_fiber, internet_no] = encode::encode_internet(internet);
    let contract_numeric = encode::encode_contract(contract);
    if contract_numeric.is_none() {
        summary.unmatched_contract += 1;
    }
    let num_services = encode::count_services(record.services.as_array());

    let tenure_bin = TenureBin::from_tenure(record.tenure);
    summary.count_bin(tenure_bin);
    let (tenure_bin_short, tenure_bin_med, tenure_bin_long) = tenure_bin.one_hot();

    let monthly_charges_norm = match record.monthly_charges {
        Some(charge) => stats.and_then(|s| s.normalize(charge)),
        None => {
            summary.null_charges += 1;
            None
        }
    };

    FeatureRecord {
        raw: record.clone(),
        gender_code,
        internet_dsl,
        internet_fiber,
        internet_no,
        contract_numeric,
        num_services,
        tenure_bin,
        tenure_bin_short,
        tenure_bin_med,
        tenure_bin_long,
        monthly_charges_norm,
    }
}

fn validate_strict(record: &CustomerRecord) -> Result<(), ChurnError> {
    let id = record.customer_id.as_str();
    let contract_levels: Vec<&str> = CONTRACT_LEVELS.iter().map(|(level, _)| *level).collect();

    check_domain(id, "gender", record.gender.as_deref(), &GENDER_DOMAIN)?;
    check_domain(
        id,
        "internet_service",
        record.internet_service.as_deref(),
        &INTERNET_LABELS,
    )?;
    check_domain(id, "contract", record.contract.as_deref(), &contract_levels)?;

    match record.tenure {
        None => return Err(ChurnError::data(id, "tenure", "missing value")),
        Some(t) if t < 0 => {
            return Err(ChurnError::data(id, "tenure", format!("negative: {t}")));
        }
        Some(_) => {}
    }

    match record.monthly_charges {
        None => Err(ChurnError::data(id, "monthly_charges", "missing value")),
        Some(c) if !c.is_finite() || c < 0.0 => Err(ChurnError::data(
            id,
            "monthly_charges",
            format!("not a non-negative number: {c}"),
        )),
        Some(_) => Ok(()),
    }
}

fn check_domain(
    id: &str,
    field: &'static str,
    value: Option<&str>,
    domain: &[&str],
) -> Result<(), ChurnError> {
    match value {
        Some(v) if domain.contains(&v) => Ok(()),
        Some(v) => Err(ChurnError::data(
            id,
            field,
            format!("'{v}' is not one of {domain:?}"),
        )),
        None => Err(ChurnError::data(id, field, "missing value")),
    }
}
