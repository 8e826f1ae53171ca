// ⚙️ Configuration - source paths and output settings
// Loaded from police-analysis.toml; every field has a default, so an
// empty file (or no file) reproduces the published data layout under data/.

use crate::error::{PipelineError, PipelineResult};
use crate::source::SourceKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "police-analysis.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where each of the five tables is read from.
    #[serde(default)]
    pub sources: SourcePaths,

    /// Where charts and reports go.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Paths of the five input tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePaths {
    #[serde(default = "default_fatalities")]
    pub fatalities: PathBuf,

    #[serde(default = "default_income")]
    pub income: PathBuf,

    #[serde(default = "default_high_school")]
    pub high_school: PathBuf,

    #[serde(default = "default_poverty")]
    pub poverty: PathBuf,

    #[serde(default = "default_race")]
    pub race: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            fatalities: default_fatalities(),
            income: default_income(),
            high_school: default_high_school(),
            poverty: default_poverty(),
            race: default_race(),
        }
    }
}

impl SourcePaths {
    pub fn path(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Fatalities => &self.fatalities,
            SourceKind::Income => &self.income,
            SourceKind::HighSchool => &self.high_school,
            SourceKind::Poverty => &self.poverty,
            SourceKind::Race => &self.race,
        }
    }

    fn path_mut(&mut self, kind: SourceKind) -> &mut PathBuf {
        match kind {
            SourceKind::Fatalities => &mut self.fatalities,
            SourceKind::Income => &mut self.income,
            SourceKind::HighSchool => &mut self.high_school,
            SourceKind::Poverty => &mut self.poverty,
            SourceKind::Race => &mut self.race,
        }
    }
}

fn default_fatalities() -> PathBuf {
    PathBuf::from("data/Deaths_by_Police_US.csv")
}

fn default_income() -> PathBuf {
    PathBuf::from("data/Median_Household_Income_2015.csv")
}

fn default_high_school() -> PathBuf {
    PathBuf::from("data/Pct_Over_25_Completed_High_School.csv")
}

fn default_poverty() -> PathBuf {
    PathBuf::from("data/Pct_People_Below_Poverty_Level.csv")
}

fn default_race() -> PathBuf {
    PathBuf::from("data/Share_of_Race_By_City.csv")
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory charts and reports are written to.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Cities kept in the summary chart and export.
    #[serde(default = "default_city_summary_limit")]
    pub city_summary_limit: usize,

    /// Write analysis.json, merged.csv and city_summary.csv.
    #[serde(default = "default_write_report")]
    pub write_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            city_summary_limit: default_city_summary_limit(),
            write_report: default_write_report(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_city_summary_limit() -> usize {
    100
}

fn default_write_report() -> bool {
    true
}

impl PipelineConfig {
    /// Load a config file. Relative paths inside it are resolved against
    /// the file's own directory.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Load `path` when given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> PipelineResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_toml(content: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.output.city_summary_limit == 0 {
            return Err(PipelineError::Config(
                "output.city_summary_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Prefix every relative path with `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for kind in SourceKind::ALL {
            let path = self.sources.path_mut(kind);
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if self.output.dir.is_relative() {
            self.output.dir = base.join(&self.output.dir);
        }
    }

    /// Default configuration rendered as TOML, for `init-config`.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
