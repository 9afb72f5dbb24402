//! Column-level encoders used by the feature pipeline.
//!
//! Every function here is a pure mapping from raw values to a derived value.
//! Values outside a known domain never fail: they take the default branch of
//! the encoder (zero, an all-zero vector, or `None` for the ordinal contract).
//! Rejecting such values is the pipeline's job under the strict data policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gender value encoded as 1; everything else encodes as 0.
pub const GENDER_REFERENCE: &str = "Male";

/// Known gender values.
pub const GENDER_DOMAIN: [&str; 2] = ["Male", "Female"];

/// Internet service labels, in one-hot column order (dsl, fiber, no).
pub const INTERNET_LABELS: [&str; 3] = ["DSL", "Fiber optic", "No"];

/// Contract levels and their ordinal codes.
pub const CONTRACT_LEVELS: [(&str, u8); 3] =
    [("Month-to-month", 0), ("One year", 1), ("Two year", 2)];

/// Flag value that counts a service as subscribed.
pub const SERVICE_YES: &str = "Yes";

/// Upper bound (inclusive) of the short tenure bin, in months.
pub const SHORT_TENURE_MAX: i64 = 12;

/// Upper bound (inclusive) of the medium tenure bin, in months.
pub const MEDIUM_TENURE_MAX: i64 = 24;

/// `1` if `value` equals `reference`, otherwise `0` (null included).
pub fn binary_encode(value: Option<&str>, reference: &str) -> u8 {
    u8::from(value == Some(reference))
}

/// One indicator per label, in label order. No match gives an all-zero vector.
pub fn one_hot(value: Option<&str>, labels: &[&str]) -> Vec<u8> {
    labels
        .iter()
        .map(|label| u8::from(value == Some(*label)))
        .collect()
}

/// Internet service as `[dsl, fiber, no]`.
pub fn encode_internet(value: Option<&str>) -> [u8; 3] {
    let mut out = [0u8; 3];
    for (slot, bit) in out.iter_mut().zip(one_hot(value, &INTERNET_LABELS)) {
        *slot = bit;
    }
    out
}

/// Ordinal contract code. Unknown or null contracts map to `None`, never `0`.
pub fn encode_contract(value: Option<&str>) -> Option<u8> {
    let value = value?;
    CONTRACT_LEVELS
        .iter()
        .find(|(level, _)| *level == value)
        .map(|(_, code)| *code)
}

/// Whether a value belongs to a categorical domain.
pub fn in_domain(value: Option<&str>, domain: &[&str]) -> bool {
    value.is_some_and(|v| domain.contains(&v))
}

/// Number of flags equal to `"Yes"`. Anything else counts as not subscribed.
pub fn count_services<'a>(flags: impl IntoIterator<Item = Option<&'a str>>) -> u8 {
    flags
        .into_iter()
        .filter(|flag| *flag == Some(SERVICE_YES))
        .count() as u8
}

/// Coarse tenure bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenureBin {
    Short,
    Medium,
    Long,
    Unknown,
}

impl TenureBin {
    /// Bucket a tenure in months. Null or negative tenure is `Unknown`.
    pub fn from_tenure(tenure: Option<i64>) -> Self {
        match tenure {
            Some(t) if t < 0 => Self::Unknown,
            Some(t) if t <= SHORT_TENURE_MAX => Self::Short,
            Some(t) if t <= MEDIUM_TENURE_MAX => Self::Medium,
            Some(_) => Self::Long,
            None => Self::Unknown,
        }
    }

    /// `(short, medium, long)` indicators. `Unknown` has no column of its own.
    pub fn one_hot(self) -> (u8, u8, u8) {
        match self {
            Self::Short => (1, 0, 0),
            Self::Medium => (0, 1, 0),
            Self::Long => (0, 0, 1),
            Self::Unknown => (0, 0, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "Short",
            Self::Medium => "Medium",
            Self::Long => "Long",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TenureBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset-wide statistics for min-max normalization of monthly charges.
///
/// Computed once in a reduction pass, then applied row by row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeStats {
    pub min: f64,
    pub max: f64,
    /// Number of finite charges the statistics were computed from.
    pub count: usize,
}

impl ChargeStats {
    /// Reduce over all charges. Nulls and non-finite values are skipped;
    /// `None` if nothing is left.
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Option<Self> {
        values
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Self>, v| {
                Some(match acc {
                    None => Self {
                        min: v,
                        max: v,
                        count: 1,
                    },
                    Some(s) => Self {
                        min: s.min.min(v),
                        max: s.max.max(v),
                        count: s.count + 1,
                    },
                })
            })
    }

    pub fn spread(&self) -> f64 {
        self.max - self.min
    }

    /// True when every charge is the same, so normalization is undefined.
    pub fn is_degenerate(&self) -> bool {
        self.spread() <= 0.0
    }

    /// `(x - min) / (max - min)`, or `None` for a degenerate range or a
    /// non-finite input.
    pub fn normalize(&self, value: f64) -> Option<f64> {
        if self.is_degenerate() || !value.is_finite() {
            return None;
        }
        Some((value - self.min) / self.spread())
    }
}
