// 🚦 Pipeline - load → merge → analyze → render
// One explicit object per run; nothing survives between runs.

use crate::aggregate::{analyze, coerce_indicators, AnalysisOutput};
use crate::charts::{
    plot_city_summary, plot_correlation, plot_income_vs_fatalities, ChartOutcome, CITY_CHART,
    CORRELATION_CHART, INCOME_CHART,
};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::merge::{build_merged_dataset, MergeStats, SourceTables};
use crate::record::MergedRecord;
use crate::report::{
    fingerprint_sources, write_city_summary_csv, write_merged_csv, AnalysisReport, RunMetadata,
    CITY_SUMMARY_FILE, MERGED_FILE, REPORT_FILE,
};
use crate::source::{load_table, SourceKind};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything a run produced, before anything is written
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<MergedRecord>,
    pub merge_stats: MergeStats,
    pub analysis: AnalysisOutput,
}

/// Files written by `Pipeline::render`
#[derive(Debug, Clone, Default)]
pub struct RenderSummary {
    pub charts: Vec<ChartOutcome>,
    pub files: Vec<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read all five sources. The first failure aborts the run.
    pub fn load_sources(&self) -> PipelineResult<SourceTables> {
        let paths = &self.config.sources;
        let load = |kind: SourceKind| {
            let path = paths.path(kind);
            info!("Loading {} data from {}", kind.name(), path.display());
            load_table(path, kind)
        };

        Ok(SourceTables {
            fatalities: load(SourceKind::Fatalities)?,
            income: load(SourceKind::Income)?,
            high_school: load(SourceKind::HighSchool)?,
            poverty: load(SourceKind::Poverty)?,
            race: load(SourceKind::Race)?,
        })
    }

    /// Load, merge and analyze without writing anything
    pub fn analyze(&self) -> Result<PipelineOutput> {
        let tables = self.load_sources()?;

        let merged = build_merged_dataset(tables).context("Failed to merge sources")?;
        let mut records = merged.records;
        let mut merge_stats = merged.stats;

        merge_stats.numeric_parse_failures += coerce_indicators(&mut records);

        let analysis = analyze(&records);
        for column in &analysis.income_fatalities_summary {
            info!("{}", column.summary());
        }
        debug!(encoding = ?analysis.encoding.mapping(), "manner_of_death codes");

        Ok(PipelineOutput {
            records,
            merge_stats,
            analysis,
        })
    }

    /// Write charts and (optionally) the report files
    pub fn render(&self, output: &PipelineOutput) -> Result<RenderSummary> {
        let dir = &self.config.output.dir;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let limit = self.config.output.city_summary_limit;
        let top_cities = output.analysis.top_cities(limit);
        let mut summary = RenderSummary::default();

        summary
            .charts
            .push(plot_correlation(&output.analysis.correlation, &dir.join(CORRELATION_CHART))?);
        summary.charts.push(plot_income_vs_fatalities(
            &output.analysis.income_fatalities,
            &output.analysis.encoding,
            &dir.join(INCOME_CHART),
        )?);
        summary
            .charts
            .push(plot_city_summary(top_cities, &dir.join(CITY_CHART))?);

        summary.files.extend(summary.charts.iter().filter_map(|c| match c {
            ChartOutcome::Written(p) => Some(p.clone()),
            ChartOutcome::Skipped(_) => None,
        }));

        if self.config.output.write_report {
            let fingerprint = fingerprint_sources(&self.config.sources)?;
            let report = AnalysisReport::new(
                RunMetadata::new(fingerprint),
                output.merge_stats.clone(),
                &output.analysis,
                limit,
            );

            let report_path = dir.join(REPORT_FILE);
            report.write_json(&report_path)?;
            info!("{}", report.summary());

            let merged_path = dir.join(MERGED_FILE);
            write_merged_csv(&output.records, &merged_path)?;

            let cities_path = dir.join(CITY_SUMMARY_FILE);
            write_city_summary_csv(top_cities, &cities_path)?;

            summary.files.extend([report_path, merged_path, cities_path]);
        }

        Ok(summary)
    }

    /// Full run: analyze, then render
    pub fn run(&self) -> Result<(PipelineOutput, RenderSummary)> {
        let output = self.analyze()?;
        let rendered = self.render(&output)?;
        Ok((output, rendered))
    }
}
