// 🧾 Report - JSON + CSV exports of a finished run
// Provenance (run id, timestamp, input fingerprint) travels with every report.

use crate::aggregate::{AnalysisOutput, CitySummaryRecord};
use crate::config::SourcePaths;
use crate::merge::MergeStats;
use crate::record::{Indicator, MergedRecord};
use crate::source::SourceKind;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;

pub const REPORT_FILE: &str = "analysis.json";
pub const MERGED_FILE: &str = "merged.csv";
pub const CITY_SUMMARY_FILE: &str = "city_summary.csv";

// ============================================================================
// RUN METADATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Unique per invocation
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 over the five input files, in join order
    pub input_fingerprint: String,
    pub version: String,
}

impl RunMetadata {
    pub fn new(input_fingerprint: String) -> Self {
        RunMetadata {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            input_fingerprint,
            version: crate::VERSION.to_string(),
        }
    }
}

/// Hash the raw bytes of every source. Identical inputs give identical
/// fingerprints; the value is informational only.
pub fn fingerprint_sources(sources: &SourcePaths) -> Result<String> {
    let mut hasher = Sha256::new();

    for kind in SourceKind::ALL {
        let path = sources.path(kind);
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {} for fingerprint", path.display()))?;
        hasher.update(kind.code().as_bytes());
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// ANALYSIS REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: RunMetadata,
    pub merge: MergeStats,
    pub analysis: AnalysisOutput,
}

impl AnalysisReport {
    /// `city_limit` caps the city summary kept in the report
    pub fn new(metadata: RunMetadata, merge: MergeStats, analysis: &AnalysisOutput, city_limit: usize) -> Self {
        let mut analysis = analysis.clone();
        analysis.city_summary.truncate(city_limit);

        AnalysisReport {
            metadata,
            merge,
            analysis,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Rows: {}, Unenriched: {}, Parse failures: {}, Categories: {}, Cities: {}",
            self.merge.final_rows,
            self.merge.unenriched_rows,
            self.merge.numeric_parse_failures,
            self.analysis.encoding.len(),
            self.analysis.city_summary.len(),
        )
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse report")
    }
}

// ============================================================================
// CSV EXPORTS
// ============================================================================

/// Merged rows: fixed columns, indicators, then every extra column seen
pub fn write_merged_csv(records: &[MergedRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let extras: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .collect();

    let mut header: Vec<&str> = vec!["id", "name", "city", "manner_of_death"];
    header.extend(Indicator::ALL.iter().map(|i| i.name()));
    header.extend(extras.iter().copied());
    writer.write_record(&header)?;

    for r in records {
        let mut row: Vec<String> = vec![
            r.id.clone().unwrap_or_default(),
            r.name.clone().unwrap_or_default(),
            r.city.clone(),
            r.manner_of_death.clone(),
        ];
        row.extend(Indicator::ALL.iter().map(|i| r.indicator(*i).to_cell()));
        row.extend(
            extras
                .iter()
                .map(|k| r.extra.get(*k).cloned().unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_city_summary_csv(rows: &[CitySummaryRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header: Vec<&str> = vec!["city", "total_encoded_fatalities"];
    header.extend(Indicator::ALL.iter().map(|i| i.name()));
    writer.write_record(&header)?;

    for r in rows {
        let mut row = vec![r.city.clone(), r.total_encoded_fatalities.to_string()];
        row.extend(
            Indicator::ALL
                .iter()
                .map(|i| r.mean(*i).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
