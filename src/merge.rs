// 🔗 Merge Engine - normalize, deduplicate, left-join
// Fatalities stay the spine: indicator tables only ever add columns.

use crate::error::PipelineResult;
use crate::normalize::coerce_separated_numeric;
use crate::record::{Indicator, MergedRecord, Value};
use crate::source::{SourceKind, Table, CITY_COLUMN, GEOGRAPHIC_AREA_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Category used when a fatality row has no manner_of_death
pub const UNKNOWN_MANNER: &str = "Unknown";

const ID_COLUMN: &str = "id";
const NAME_COLUMN: &str = "name";
const MANNER_COLUMN: &str = "manner_of_death";

// ============================================================================
// INPUTS & STATS
// ============================================================================

/// The five raw tables, as loaded
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub fatalities: Table,
    pub income: Table,
    pub high_school: Table,
    pub poverty: Table,
    pub race: Table,
}

impl SourceTables {
    fn take(self) -> Vec<(SourceKind, Table)> {
        vec![
            (SourceKind::Fatalities, self.fatalities),
            (SourceKind::Income, self.income),
            (SourceKind::HighSchool, self.high_school),
            (SourceKind::Poverty, self.poverty),
            (SourceKind::Race, self.race),
        ]
    }
}

/// Per-source numbers collected while merging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: SourceKind,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
    /// Fatality rows that found a match in this table (0 for fatalities)
    pub matched_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeStats {
    pub sources: Vec<SourceStats>,
    /// Row count after each indicator join, in join order
    pub rows_after_join: Vec<usize>,
    pub final_rows: usize,
    /// Non-empty share cells that failed numeric coercion
    pub numeric_parse_failures: usize,
    pub unknown_manner_filled: usize,
    /// Fatality rows no indicator table matched
    pub unenriched_rows: usize,
    /// Cities appearing more than once in the output (expected empty)
    pub duplicate_cities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub records: Vec<MergedRecord>,
    pub stats: MergeStats,
}

// ============================================================================
// MERGE ENGINE
// ============================================================================

/// Build the merged dataset from the five loaded tables.
///
/// Fails only when a table has no city column. Unmatched cities and
/// unparseable shares degrade to missing values.
pub fn build_merged_dataset(sources: SourceTables) -> PipelineResult<MergeOutput> {
    let mut stats = MergeStats::default();
    let mut prepared = Vec::with_capacity(5);

    for (kind, table) in sources.take() {
        let rows_read = table.len();
        let (table, dropped) = prepare_source(kind, table)?;

        debug!(source = kind.name(), rows_read, dropped, "prepared source");
        stats.sources.push(SourceStats {
            source: kind,
            rows_read,
            duplicates_dropped: dropped,
            matched_rows: 0,
        });
        prepared.push((kind, table));
    }

    let mut tables = prepared.into_iter();
    let (_, mut merged) = match tables.next() {
        Some(first) => first,
        None => return Ok(MergeOutput { records: Vec::new(), stats }),
    };

    for (kind, right) in tables {
        let (joined, matched) = left_join(merged, &right, kind)?;
        merged = joined;

        info!(
            "Rows after merging with {} data: {} ({} matched)",
            kind.name(),
            merged.len(),
            matched
        );
        stats.rows_after_join.push(merged.len());
        if let Some(s) = stats.sources.iter_mut().find(|s| s.source == kind) {
            s.matched_rows = matched;
        }
    }

    rename_indicator_columns(&mut merged);

    let records = extract_records(&merged, &mut stats)?;
    stats.final_rows = records.len();
    stats.unenriched_rows = records.iter().filter(|r| r.is_unenriched()).count();
    stats.duplicate_cities = duplicate_cities(&records);

    info!("Final row count: {}", stats.final_rows);
    if !stats.duplicate_cities.is_empty() {
        warn!(
            count = stats.duplicate_cities.len(),
            "duplicate cities in merged data"
        );
    }

    Ok(MergeOutput { records, stats })
}

/// Headers, area rename, city key, dedup - once per source.
/// Returns the prepared table and the number of duplicate rows dropped.
pub fn prepare_source(kind: SourceKind, mut table: Table) -> PipelineResult<(Table, usize)> {
    table.normalize_headers();

    if let Some(area) = kind.area_column() {
        table.rename_column(GEOGRAPHIC_AREA_COLUMN, &area);
    }

    let city = table.require_column(kind, CITY_COLUMN)?;
    table.normalize_keys(city);
    let dropped = table.dedup_on(city);

    Ok((table, dropped))
}

/// Left-join `right` onto `left` by city key.
///
/// Right must already be unique on city, so the row count never changes.
/// Rows with an empty city key never match. A right column whose name is
/// already taken gets a `_<source code>` suffix.
/// Returns the joined table and how many left rows found a match.
pub fn left_join(left: Table, right: &Table, kind: SourceKind) -> PipelineResult<(Table, usize)> {
    let left_key = left.require_column(SourceKind::Fatalities, CITY_COLUMN)?;
    let right_key = right.require_column(kind, CITY_COLUMN)?;

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(right.len());
    for (i, row) in right.rows.iter().enumerate() {
        if let Some(Some(key)) = row.get(right_key) {
            if !key.is_empty() {
                index.entry(key.as_str()).or_insert(i);
            }
        }
    }

    let carried: Vec<usize> = (0..right.headers.len()).filter(|&c| c != right_key).collect();

    let mut headers = left.headers.clone();
    for &c in &carried {
        let name = &right.headers[c];
        if headers.contains(name) {
            let renamed = format!("{}_{}", name, kind.code());
            debug!(column = %name, renamed = %renamed, "column collision during join");
            headers.push(renamed);
        } else {
            headers.push(name.clone());
        }
    }

    let mut joined = Table::new(headers);
    let mut matched = 0;

    for mut row in left.rows {
        let hit = row
            .get(left_key)
            .and_then(|c| c.as_deref())
            .filter(|k| !k.is_empty())
            .and_then(|k| index.get(k))
            .map(|&i| &right.rows[i]);

        match hit {
            Some(right_row) => {
                matched += 1;
                row.extend(carried.iter().map(|&c| right_row.get(c).cloned().flatten()));
            }
            None => row.extend(carried.iter().map(|_| None)),
        }
        joined.push_row(row);
    }

    Ok((joined, matched))
}

/// Source headers -> canonical analysis names
fn rename_indicator_columns(table: &mut Table) {
    for indicator in Indicator::ALL {
        if indicator.source_column() != indicator.name() {
            table.rename_column(indicator.source_column(), indicator.name());
        }
    }
}

fn extract_records(table: &Table, stats: &mut MergeStats) -> PipelineResult<Vec<MergedRecord>> {
    let city = table.require_column(SourceKind::Fatalities, CITY_COLUMN)?;
    let id = table.column_index(ID_COLUMN);
    let name = table.column_index(NAME_COLUMN);
    let manner = table.column_index(MANNER_COLUMN);

    let indicator_cols: Vec<(Indicator, Option<usize>)> = Indicator::ALL
        .iter()
        .map(|i| (*i, table.column_index(i.name())))
        .collect();

    let mut used: Vec<usize> = vec![city];
    used.extend(id);
    used.extend(name);
    used.extend(manner);
    used.extend(indicator_cols.iter().filter_map(|(_, c)| *c));

    let cell = |row: &Vec<Option<String>>, col: Option<usize>| -> Option<String> {
        col.and_then(|c| row.get(c).cloned().flatten())
    };

    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        let manner_of_death = match cell(row, manner) {
            Some(m) => m,
            None => {
                stats.unknown_manner_filled += 1;
                UNKNOWN_MANNER.to_string()
            }
        };

        let mut record = MergedRecord::new(
            &cell(row, Some(city)).unwrap_or_default(),
            &manner_of_death,
        );
        record.id = cell(row, id);
        record.name = cell(row, name);

        for (indicator, col) in &indicator_cols {
            let raw = cell(row, *col);
            let value = if indicator.needs_separator_cleanup() {
                coerce_share(raw.as_deref(), *indicator, &record.city, stats)
            } else {
                Value::from_cell(raw.as_deref())
            };
            *record.indicator_mut(*indicator) = value;
        }

        record.extra = table
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .filter_map(|(i, h)| row.get(i).cloned().flatten().map(|v| (h.clone(), v)))
            .collect::<BTreeMap<_, _>>();

        records.push(record);
    }

    Ok(records)
}

fn coerce_share(raw: Option<&str>, indicator: Indicator, city: &str, stats: &mut MergeStats) -> Value {
    let text = match raw {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Value::Missing,
    };

    match coerce_separated_numeric(text) {
        Some(v) => Value::Number(v),
        None => {
            stats.numeric_parse_failures += 1;
            debug!(column = indicator.name(), city, value = text, "unparseable share value");
            Value::Missing
        }
    }
}

fn duplicate_cities(records: &[MergedRecord]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.city.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(c, _)| c.to_string())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fatalities(rows: &[&[&str]]) -> Table {
        Table::from_rows(&["ID", "Name", "City", "State", "Manner_of_Death"], rows)
    }

    fn income(rows: &[&[&str]]) -> Table {
        Table::from_rows(&["Geographic Area", "City", "Median Income"], rows)
    }

    fn race(rows: &[&[&str]]) -> Table {
        Table::from_rows(
            &[
                "Geographic area",
                "City",
                "share_white",
                "share_black",
                "share_native_american",
                "share_asian",
                "share_hispanic",
            ],
            rows,
        )
    }

    fn sources(fatal: Table) -> SourceTables {
        SourceTables {
            fatalities: fatal,
            income: income(&[&["IL", "Springfield city", "52000"], &["OH", "Fairview town", "61000"]]),
            high_school: Table::from_rows(
                &["Geographic Area", "City", "percent_completed_hs"],
                &[&["IL", "Springfield city", "88.1"]],
            ),
            poverty: Table::from_rows(
                &["Geographic Area", "City", "poverty_rate"],
                &[&["IL", "Springfield", "19.4"], &["IL", "Springfield city", "99.9"]],
            ),
            race: race(&[&["IL", "Springfield city", "70", "20", "0.3", "1,234", "N/A"]]),
        }
    }

    #[test]
    fn test_scenario_normalize_and_dedup_fatalities() {
        let fatal = fatalities(&[
            &["1", "A", "Springfield City", "IL", "shot"],
            &["2", "B", "Fairview Town", "OH", "shot and Tasered"],
            &["3", "C", "springfield", "IL", "shot"],
        ]);

        let out = build_merged_dataset(sources(fatal)).unwrap();

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].city, "springfield");
        assert_eq!(out.records[0].id.as_deref(), Some("1"));
        assert_eq!(out.records[1].city, "fairview");
        assert!(out.stats.duplicate_cities.is_empty());
    }

    #[test]
    fn test_only_missing_manner_is_filled() {
        let fatal = fatalities(&[
            &["1", "A", "Springfield", "IL", ""],
            &["2", "B", "Fairview", "OH", "  "],
        ]);

        let out = build_merged_dataset(sources(fatal)).unwrap();

        assert_eq!(out.records[0].manner_of_death, UNKNOWN_MANNER);
        assert_eq!(out.records[1].manner_of_death, "  ");
        assert_eq!(out.stats.unknown_manner_filled, 1);
    }

    #[test]
    fn test_left_join_preserves_cardinality() {
        let fatal = fatalities(&[
            &["1", "A", "Springfield", "IL", "shot"],
            &["2", "B", "Nowhere", "TX", "shot"],
            &["3", "C", "Fairview", "OH", ""],
            &["4", "D", "", "OH", "shot"],
        ]);

        let out = build_merged_dataset(sources(fatal)).unwrap();

        assert_eq!(out.records.len(), 4);
        assert_eq!(out.stats.final_rows, 4);
        assert!(out.stats.rows_after_join.iter().all(|&n| n == 4));
        assert_eq!(out.stats.rows_after_join.len(), 4);
    }

    #[test]
    fn test_unmatched_rows_have_missing_indicators() {
        let fatal = fatalities(&[&["2", "B", "Nowhere", "TX", "shot"]]);

        let out = build_merged_dataset(sources(fatal)).unwrap();
        let record = &out.records[0];

        assert!(record.is_unenriched());
        assert_eq!(out.stats.unenriched_rows, 1);
    }

    #[test]
    fn test_indicator_dedup_first_occurrence_wins() {
        // poverty has "Springfield" and "Springfield city" - both key to springfield
        let fatal = fatalities(&[&["1", "A", "Springfield", "IL", "shot"]]);

        let out = build_merged_dataset(sources(fatal)).unwrap();

        assert_eq!(out.records[0].poverty_rate, Value::Text("19.4".to_string()));
        let poverty = out
            .stats
            .sources
            .iter()
            .find(|s| s.source == SourceKind::Poverty)
            .unwrap();
        assert_eq!(poverty.duplicates_dropped, 1);
        assert_eq!(poverty.matched_rows, 1);
    }

    #[test]
    fn test_share_coercion_and_missing_propagation() {
        let fatal = fatalities(&[&["1", "A", "Springfield", "IL", "shot"]]);

        let out = build_merged_dataset(sources(fatal)).unwrap();
        let record = &out.records[0];

        assert_eq!(record.asian_share, Value::Number(1234.0));
        assert_eq!(record.hispanic_share, Value::Missing);
        assert_eq!(record.white_share, Value::Text("70".to_string()));
        assert_eq!(out.stats.numeric_parse_failures, 1);
    }

    #[test]
    fn test_canonical_columns_and_extras() {
        let fatal = fatalities(&[&["1", "A", "Springfield", "IL", "shot"]]);

        let out = build_merged_dataset(sources(fatal)).unwrap();
        let record = &out.records[0];

        assert_eq!(record.median_income, Value::Text("52000".to_string()));
        assert_eq!(record.high_school_completion, Value::Text("88.1".to_string()));
        assert_eq!(record.extra.get("state").map(String::as_str), Some("IL"));
        assert_eq!(
            record.extra.get("geographic_area_income").map(String::as_str),
            Some("IL")
        );
        assert_eq!(
            record.extra.get("geographic_area_race").map(String::as_str),
            Some("IL")
        );
    }

    #[test]
    fn test_missing_manner_becomes_unknown() {
        let fatal = fatalities(&[&["3", "C", "Fairview", "OH", ""]]);

        let out = build_merged_dataset(sources(fatal)).unwrap();

        assert_eq!(out.records[0].manner_of_death, UNKNOWN_MANNER);
        assert_eq!(out.stats.unknown_manner_filled, 1);
    }

    #[test]
    fn test_empty_city_never_joins() {
        let left = Table::from_rows(&["city"], &[&[""]]);
        let right = Table::from_rows(&["city", "v"], &[&["", "1"]]);

        let (joined, matched) = left_join(left, &right, SourceKind::Income).unwrap();

        assert_eq!(matched, 0);
        assert_eq!(joined.cell(0, "v"), None);
    }

    #[test]
    fn test_join_column_collision_gets_suffix() {
        let left = Table::from_rows(&["city", "state"], &[&["a", "IL"]]);
        let right = Table::from_rows(&["city", "state"], &[&["a", "OH"]]);

        let (joined, _) = left_join(left, &right, SourceKind::Poverty).unwrap();

        assert_eq!(joined.headers, vec!["city", "state", "state_poverty"]);
        assert_eq!(joined.cell(0, "state_poverty"), Some("OH"));
    }

    #[test]
    fn test_missing_city_column_is_fatal() {
        let mut tables = sources(fatalities(&[]));
        tables.race = Table::from_rows(&["geographic area", "town"], &[]);

        assert!(build_merged_dataset(tables).is_err());
    }
}
