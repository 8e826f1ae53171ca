// Police Data Analysis - Core Library
// Exposes the pipeline for the CLI, the viewer, and tests

pub mod error;
pub mod normalize;
pub mod record;
pub mod source;
pub mod merge;
pub mod stats;
pub mod aggregate;
pub mod config;
pub mod report;
pub mod charts;
pub mod pipeline;

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};
pub use normalize::{coerce_numeric, coerce_separated_numeric, normalize_city};
pub use record::{Indicator, MergedRecord, Value};
pub use source::{load_table, SourceKind, Table};
pub use merge::{build_merged_dataset, MergeOutput, MergeStats, SourceTables, UNKNOWN_MANNER};
pub use stats::{describe, pearson, ColumnSummary};
pub use aggregate::{
    analyze, coerce_indicators, AnalysisOutput, CategoryEncoding, CitySummaryRecord,
    CorrelationMatrix, IncomeFatalityPoint, ENCODED_MANNER_COLUMN,
};
pub use config::{OutputConfig, PipelineConfig, SourcePaths, DEFAULT_CONFIG_FILE};
pub use report::{AnalysisReport, RunMetadata};
pub use charts::ChartOutcome;
pub use pipeline::{Pipeline, PipelineOutput, RenderSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
