// ⚠️ Pipeline errors - everything that aborts a run
// Data-quality problems (missed joins, bad numerics) are NOT errors:
// they travel through the missing-value channel instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source file missing, unreadable, or not parseable as delimited text
    #[error("failed to read {source_name} source at {path}: {reason}")]
    SourceRead {
        source_name: String,
        path: PathBuf,
        reason: String,
    },

    /// A column the pipeline needs is not present in a source table
    #[error("{source_name} source has no '{column}' column (found: {found})")]
    MissingColumn {
        source_name: String,
        column: String,
        found: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
