// 📋 Records - the merged row and its cell values

use crate::normalize::coerce_numeric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CELL VALUE
// ============================================================================

/// A single indicator cell.
///
/// Keeps "not coerced yet" (Text) apart from "coerced" (Number) and
/// "no data" (Missing). Missing is never the same thing as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    /// Empty text is treated as missing, like an empty CSV field
    pub fn from_cell(cell: Option<&str>) -> Self {
        match cell {
            Some(s) if !s.trim().is_empty() => Value::Text(s.to_string()),
            _ => Value::Missing,
        }
    }

    /// Numeric view of the cell. Safe to call repeatedly.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) if v.is_finite() => Some(*v),
            Value::Number(_) | Value::Missing => None,
            Value::Text(s) => coerce_numeric(s),
        }
    }

    /// Force the cell to Number or Missing
    pub fn coerced(&self) -> Self {
        match self.as_number() {
            Some(v) => Value::Number(v),
            None => Value::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Text for CSV export ("" for missing)
    pub fn to_cell(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Number(v) => v.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

// ============================================================================
// INDICATORS
// ============================================================================

/// The eight numeric indicator columns carried by a merged row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    MedianIncome,
    PovertyRate,
    HighSchoolCompletion,
    WhiteShare,
    BlackShare,
    NativeAmericanShare,
    AsianShare,
    HispanicShare,
}

impl Indicator {
    /// Fixed column order used by the correlation matrix and summaries
    pub const ALL: [Indicator; 8] = [
        Indicator::MedianIncome,
        Indicator::PovertyRate,
        Indicator::HighSchoolCompletion,
        Indicator::WhiteShare,
        Indicator::BlackShare,
        Indicator::NativeAmericanShare,
        Indicator::AsianShare,
        Indicator::HispanicShare,
    ];

    /// Canonical analysis name
    pub fn name(&self) -> &'static str {
        match self {
            Indicator::MedianIncome => "median_income",
            Indicator::PovertyRate => "poverty_rate",
            Indicator::HighSchoolCompletion => "high_school_completion",
            Indicator::WhiteShare => "white_share",
            Indicator::BlackShare => "black_share",
            Indicator::NativeAmericanShare => "native_american_share",
            Indicator::AsianShare => "asian_share",
            Indicator::HispanicShare => "hispanic_share",
        }
    }

    /// Lowercased header the value arrives under in its source table
    pub fn source_column(&self) -> &'static str {
        match self {
            Indicator::MedianIncome => "median income",
            Indicator::PovertyRate => "poverty_rate",
            Indicator::HighSchoolCompletion => "percent_completed_hs",
            Indicator::WhiteShare => "share_white",
            Indicator::BlackShare => "share_black",
            Indicator::NativeAmericanShare => "share_native_american",
            Indicator::AsianShare => "share_asian",
            Indicator::HispanicShare => "share_hispanic",
        }
    }

    /// Share columns that ship as text with thousands separators
    pub fn needs_separator_cleanup(&self) -> bool {
        matches!(self, Indicator::AsianShare | Indicator::HispanicShare)
    }
}

// ============================================================================
// MERGED RECORD
// ============================================================================

/// One fatality row enriched with whatever indicator rows matched its city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub id: Option<String>,
    pub name: Option<String>,

    /// Normalized city key
    pub city: String,

    /// Never missing - defaults to "Unknown"
    pub manner_of_death: String,

    pub median_income: Value,
    pub poverty_rate: Value,
    pub high_school_completion: Value,
    pub white_share: Value,
    pub black_share: Value,
    pub native_american_share: Value,
    pub asian_share: Value,
    pub hispanic_share: Value,

    /// Every other column of the joined row, by lowercased header
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl MergedRecord {
    /// Record with all indicators missing
    pub fn new(city: &str, manner_of_death: &str) -> Self {
        MergedRecord {
            id: None,
            name: None,
            city: city.to_string(),
            manner_of_death: manner_of_death.to_string(),
            median_income: Value::Missing,
            poverty_rate: Value::Missing,
            high_school_completion: Value::Missing,
            white_share: Value::Missing,
            black_share: Value::Missing,
            native_american_share: Value::Missing,
            asian_share: Value::Missing,
            hispanic_share: Value::Missing,
            extra: BTreeMap::new(),
        }
    }

    /// Builder: set one indicator
    pub fn with(mut self, indicator: Indicator, value: Value) -> Self {
        *self.indicator_mut(indicator) = value;
        self
    }

    pub fn indicator(&self, indicator: Indicator) -> &Value {
        match indicator {
            Indicator::MedianIncome => &self.median_income,
            Indicator::PovertyRate => &self.poverty_rate,
            Indicator::HighSchoolCompletion => &self.high_school_completion,
            Indicator::WhiteShare => &self.white_share,
            Indicator::BlackShare => &self.black_share,
            Indicator::NativeAmericanShare => &self.native_american_share,
            Indicator::AsianShare => &self.asian_share,
            Indicator::HispanicShare => &self.hispanic_share,
        }
    }

    pub fn indicator_mut(&mut self, indicator: Indicator) -> &mut Value {
        match indicator {
            Indicator::MedianIncome => &mut self.median_income,
            Indicator::PovertyRate => &mut self.poverty_rate,
            Indicator::HighSchoolCompletion => &mut self.high_school_completion,
            Indicator::WhiteShare => &mut self.white_share,
            Indicator::BlackShare => &mut self.black_share,
            Indicator::NativeAmericanShare => &mut self.native_american_share,
            Indicator::AsianShare => &mut self.asian_share,
            Indicator::HispanicShare => &mut self.hispanic_share,
        }
    }

    /// True when no indicator table matched this row's city
    pub fn is_unenriched(&self) -> bool {
        Indicator::ALL.iter().all(|i| self.indicator(*i).is_missing())
    }
}
