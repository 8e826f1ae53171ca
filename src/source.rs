// 📂 Sources - the five input tables and how they are read
// Every source is a Latin-1 CSV with a "city" column somewhere in it.

use crate::error::{PipelineError, PipelineResult};
use crate::normalize::{decode_latin1, normalize_city, normalize_header};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Join key column present in every source
pub const CITY_COLUMN: &str = "city";

/// Generic area column shared by the indicator tables
pub const GEOGRAPHIC_AREA_COLUMN: &str = "geographic area";

// ============================================================================
// SOURCE KIND
// ============================================================================

/// SourceKind - which of the five tables a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Fatalities,
    Income,
    HighSchool,
    Poverty,
    Race,
}

impl SourceKind {
    /// Join order: fatalities first, then indicators left to right
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Fatalities,
        SourceKind::Income,
        SourceKind::HighSchool,
        SourceKind::Poverty,
        SourceKind::Race,
    ];

    pub const INDICATORS: [SourceKind; 4] = [
        SourceKind::Income,
        SourceKind::HighSchool,
        SourceKind::Poverty,
        SourceKind::Race,
    ];

    /// Human-readable name for logs and errors
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Fatalities => "fatalities",
            SourceKind::Income => "income",
            SourceKind::HighSchool => "high-school",
            SourceKind::Poverty => "poverty",
            SourceKind::Race => "race",
        }
    }

    /// Short code used to disambiguate columns after a join
    pub fn code(&self) -> &str {
        match self {
            SourceKind::Fatalities => "fatal",
            SourceKind::Income => "income",
            SourceKind::HighSchool => "hs",
            SourceKind::Poverty => "poverty",
            SourceKind::Race => "race",
        }
    }

    /// Per-source name for the shared "geographic area" column
    pub fn area_column(&self) -> Option<String> {
        match self {
            SourceKind::Fatalities => None,
            other => Some(format!("geographic_area_{}", other.code())),
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// Table - headers plus rows of optional text cells
///
/// Cells are None when the CSV field is empty or when a left-join found
/// no match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builder for tests and fixtures: empty strings become None
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        let mut table = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table.push_row(
                row.iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect(),
            );
        }
        table
    }

    pub fn push_row(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Lowercase + trim every header
    pub fn normalize_headers(&mut self) {
        for header in &mut self.headers {
            *header = normalize_header(header);
        }
    }

    /// Rename a column if present. Returns whether anything changed.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Index of a column that must exist
    pub fn require_column(&self, kind: SourceKind, column: &str) -> PipelineResult<usize> {
        self.column_index(column)
            .ok_or_else(|| PipelineError::MissingColumn {
                source_name: kind.name().to_string(),
                column: column.to_string(),
                found: self.headers.join(", "),
            })
    }

    /// Replace every value of `column` with its normalized city key.
    /// Missing cities become the empty key.
    pub fn normalize_keys(&mut self, column: usize) {
        for row in &mut self.rows {
            let key = row
                .get(column)
                .and_then(|c| c.as_deref())
                .map(normalize_city)
                .unwrap_or_default();
            if let Some(cell) = row.get_mut(column) {
                *cell = Some(key);
            }
        }
    }

    /// Keep the first row for each distinct value of `column`.
    /// Returns how many rows were dropped.
    pub fn dedup_on(&mut self, column: usize) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<String> = HashSet::new();

        self.rows.retain(|row| {
            let key = row
                .get(column)
                .and_then(|c| c.clone())
                .unwrap_or_default();
            seen.insert(key)
        });

        before - self.rows.len()
    }

    /// Distinct values of a column (missing counted as the empty key)
    pub fn distinct_count(&self, column: usize) -> usize {
        self.rows
            .iter()
            .map(|row| row.get(column).and_then(|c| c.as_deref()).unwrap_or(""))
            .collect::<HashSet<_>>()
            .len()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Read one source file into a Table with normalized headers.
///
/// Bytes are decoded as ISO-8859-1 so any file decodes; a missing file,
/// an I/O error, or ragged rows abort with SourceRead.
pub fn load_table(path: &Path, kind: SourceKind) -> PipelineResult<Table> {
    let read_err = |reason: String| PipelineError::SourceRead {
        source_name: kind.name().to_string(),
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| read_err(e.to_string()))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| read_err(e.to_string()))?
        .iter()
        .map(decode_latin1)
        .collect();

    let mut table = Table::new(headers);
    table.normalize_headers();

    for (line_num, result) in reader.byte_records().enumerate() {
        let record = result
            .map_err(|e| read_err(format!("line {}: {}", line_num + 2, e)))?;

        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    None
                } else {
                    Some(decode_latin1(field))
                }
            })
            .collect();
        table.push_row(row);
    }

    table.require_column(kind, CITY_COLUMN)?;

    debug!(
        source = kind.name(),
        rows = table.len(),
        columns = table.headers.len(),
        "loaded source table"
    );

    Ok(table)
}
