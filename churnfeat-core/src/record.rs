//! Customer records as read from the source table, and the derived feature record.

use crate::encode::TenureBin;
use serde::{Deserialize, Serialize};

/// The six add-on service flags, in the order they are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFlags {
    pub online_security: Option<String>,
    pub online_backup: Option<String>,
    pub device_protection: Option<String>,
    pub tech_support: Option<String>,
    pub streaming_tv: Option<String>,
    pub streaming_movies: Option<String>,
}

impl ServiceFlags {
    /// Build from six flag values given in counting order.
    pub fn from_values<S: Into<String>>(values: [Option<S>; 6]) -> Self {
        let [security, backup, protection, support, tv, movies] =
            values.map(|v| v.map(Into::<String>::into));
        Self {
            online_security: security,
            online_backup: backup,
            device_protection: protection,
            tech_support: support,
            streaming_tv: tv,
            streaming_movies: movies,
        }
    }

    pub fn as_array(&self) -> [Option<&str>; 6] {
        [
            self.online_security.as_deref(),
            self.online_backup.as_deref(),
            self.device_protection.as_deref(),
            self.tech_support.as_deref(),
            self.streaming_tv.as_deref(),
            self.streaming_movies.as_deref(),
        ]
    }
}

/// One row of the raw customer table.
///
/// Every attribute except the identifier is nullable: the table is read as-is
/// and the data policy decides what happens to missing or odd values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub gender: Option<String>,
    pub senior_citizen: Option<i64>,
    pub tenure: Option<i64>,
    pub internet_service: Option<String>,
    pub contract: Option<String>,
    #[serde(flatten)]
    pub services: ServiceFlags,
    pub monthly_charges: Option<f64>,
}

impl CustomerRecord {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            ..Default::default()
        }
    }
}

/// A customer record extended with every derived feature.
///
/// Produced fresh by the pipeline; the raw part is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(flatten)]
    pub raw: CustomerRecord,
    pub gender_code: u8,
    pub internet_dsl: u8,
    pub internet_fiber: u8,
    pub internet_no: u8,
    /// `None` marks a contract value outside the known levels.
    pub contract_numeric: Option<u8>,
    pub num_services: u8,
    pub tenure_bin: TenureBin,
    pub tenure_bin_short: u8,
    pub tenure_bin_med: u8,
    pub tenure_bin_long: u8,
    /// `None` when the row has no charge or the dataset has no spread.
    pub monthly_charges_norm: Option<f64>,
}
