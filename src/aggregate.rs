// 📊 Aggregator - encoding, correlation, city summary
// Pure functions of the merged records. Missing values are skipped, never zeroed.

use crate::record::{Indicator, MergedRecord, Value};
use crate::stats::{describe, mean, pearson, ColumnSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Name of the encoded manner-of-death column
pub const ENCODED_MANNER_COLUMN: &str = "manner_of_death_encoded";

// ============================================================================
// NUMERIC COERCION
// ============================================================================

/// Force every indicator cell to Number or Missing.
/// Returns how many non-empty cells could not be parsed.
pub fn coerce_indicators(records: &mut [MergedRecord]) -> usize {
    let mut failures = 0;

    for record in records.iter_mut() {
        for indicator in Indicator::ALL {
            let cell = record.indicator_mut(indicator);
            let coerced = cell.coerced();
            if let (Value::Text(raw), Value::Missing) = (&*cell, &coerced) {
                debug!(column = indicator.name(), value = %raw, "coerced to missing");
                failures += 1;
            }
            *cell = coerced;
        }
    }

    failures
}

fn indicator_column(records: &[MergedRecord], indicator: Indicator) -> Vec<Option<f64>> {
    records
        .iter()
        .map(|r| r.indicator(indicator).as_number())
        .collect()
}

// ============================================================================
// CATEGORY ENCODING
// ============================================================================

/// Ordinal codes for manner_of_death.
///
/// Codes follow the byte-wise lexicographic order of the distinct values,
/// starting at 0. "Homicide" < "Suicide" < "Unknown" gives 0, 1, 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub classes: Vec<String>,
}

impl CategoryEncoding {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = values.into_iter().collect();
        CategoryEncoding {
            classes: distinct.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn code(&self, value: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as i64)
    }

    pub fn label(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }

    pub fn mapping(&self) -> BTreeMap<String, i64> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i as i64))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// Square Pearson matrix, indexed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// values[i][j] = corr(columns[i], columns[j]); None when undefined
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Pairwise-complete Pearson over named columns
    pub fn compute(columns: &[(String, Vec<Option<f64>>)]) -> Self {
        let n = columns.len();
        let mut values = vec![vec![None; n]; n];

        for i in 0..n {
            for j in i..n {
                let r = pearson(&columns[i].1, &columns[j].1);
                // The diagonal is exactly 1 whenever it is defined at all
                let r = if i == j { r.map(|_| 1.0) } else { r };
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        CorrelationMatrix {
            columns: columns.iter().map(|(name, _)| name.clone()).collect(),
            values,
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// True when no coefficient is defined
    pub fn is_empty(&self) -> bool {
        self.values.iter().flatten().all(Option::is_none)
    }
}

/// One row of the income/fatality projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncomeFatalityPoint {
    pub manner_of_death_encoded: i64,
    pub median_income: Option<f64>,
}

/// Per-city aggregate over the merged rows for that city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySummaryRecord {
    pub city: String,
    /// Sum of encoded manner-of-death codes
    pub total_encoded_fatalities: i64,
    /// Mean of each indicator, keyed by canonical name
    pub means: BTreeMap<Indicator, Option<f64>>,
}

impl CitySummaryRecord {
    pub fn mean(&self, indicator: Indicator) -> Option<f64> {
        self.means.get(&indicator).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub encoding: CategoryEncoding,
    pub correlation: CorrelationMatrix,
    pub income_fatalities: Vec<IncomeFatalityPoint>,
    /// describe() of the income/fatality projection
    pub income_fatalities_summary: Vec<ColumnSummary>,
    /// Every city, ordered by city key ascending
    pub city_summary: Vec<CitySummaryRecord>,
}

impl AnalysisOutput {
    /// First `limit` cities in city-key order
    pub fn top_cities(&self, limit: usize) -> &[CitySummaryRecord] {
        &self.city_summary[..limit.min(self.city_summary.len())]
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

pub fn analyze(records: &[MergedRecord]) -> AnalysisOutput {
    let encoding = CategoryEncoding::fit(records.iter().map(|r| r.manner_of_death.as_str()));
    let codes: Vec<i64> = records
        .iter()
        .map(|r| encoding.code(&r.manner_of_death).unwrap_or_default())
        .collect();

    debug!(classes = ?encoding.classes, "encoded manner_of_death");

    let mut columns: Vec<(String, Vec<Option<f64>>)> = Indicator::ALL
        .iter()
        .map(|i| (i.name().to_string(), indicator_column(records, *i)))
        .collect();
    columns.push((
        ENCODED_MANNER_COLUMN.to_string(),
        codes.iter().map(|c| Some(*c as f64)).collect(),
    ));

    let correlation = CorrelationMatrix::compute(&columns);

    let income_fatalities = income_fatality_subset(records, &codes);
    let income_fatalities_summary = vec![
        describe(
            ENCODED_MANNER_COLUMN,
            &income_fatalities
                .iter()
                .map(|p| Some(p.manner_of_death_encoded as f64))
                .collect::<Vec<_>>(),
        ),
        describe(
            Indicator::MedianIncome.name(),
            &income_fatalities.iter().map(|p| p.median_income).collect::<Vec<_>>(),
        ),
    ];

    let city_summary = city_summary(records, &codes);

    info!(
        rows = records.len(),
        classes = encoding.len(),
        cities = city_summary.len(),
        "analysis complete"
    );

    AnalysisOutput {
        encoding,
        correlation,
        income_fatalities,
        income_fatalities_summary,
        city_summary,
    }
}

/// (code, median_income) for every row, unaggregated
pub fn income_fatality_subset(records: &[MergedRecord], codes: &[i64]) -> Vec<IncomeFatalityPoint> {
    records
        .iter()
        .zip(codes)
        .map(|(r, code)| IncomeFatalityPoint {
            manner_of_death_encoded: *code,
            median_income: r.median_income.as_number(),
        })
        .collect()
}

/// Group by city key: sum of codes, mean of each indicator.
/// Rows without a city stay in the correlation but form no group.
pub fn city_summary(records: &[MergedRecord], codes: &[i64]) -> Vec<CitySummaryRecord> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, r) in records.iter().enumerate() {
        if r.city.is_empty() {
            continue;
        }
        groups.entry(r.city.as_str()).or_default().push(i);
    }

    groups
        .into_iter()
        .map(|(city, rows)| {
            let total: i64 = rows.iter().map(|&i| codes.get(i).copied().unwrap_or_default()).sum();
            let means: BTreeMap<Indicator, Option<f64>> = Indicator::ALL
                .iter()
                .map(|ind| {
                    let values: Vec<Option<f64>> = rows
                        .iter()
                        .map(|&i| records[i].indicator(*ind).as_number())
                        .collect();
                    (*ind, mean(&values))
                })
                .collect();

            CitySummaryRecord {
                city: city.to_string(),
                total_encoded_fatalities: total,
                means,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
