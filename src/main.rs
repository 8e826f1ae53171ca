// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use police_analysis::{ChartOutcome, Pipeline, PipelineConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Police fatality analysis - merge city indicators, correlate, chart
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write charts + report
    Run {
        /// Path to configuration file (default: ./police-analysis.toml if present)
        #[arg(short, long, value_name = "FILE", env = "POLICE_ANALYSIS_CONFIG")]
        config: Option<PathBuf>,

        /// Override the output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Run the pipeline and browse the results in the terminal
    View {
        #[arg(short, long, value_name = "FILE", env = "POLICE_ANALYSIS_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Command::Run { config, output } => run_pipeline(config, output),
        Command::View { config } => run_ui_mode(config),
        Command::InitConfig { path } => init_config(path),
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    // RUST_LOG takes precedence over -v / -q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging unavailable: {}", e);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    PipelineConfig::load_or_default(path.as_deref()).context("Failed to load configuration")
}

fn run_pipeline(config: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    println!("🚓 Police Data Analysis v{}", police_analysis::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = load_config(config)?;
    if let Some(dir) = output {
        config.output.dir = dir;
    }

    let pipeline = Pipeline::new(config);

    println!("\n📂 Loading and merging sources...");
    let output = pipeline.analyze()?;
    println!("✓ Merged {} fatality rows", output.records.len());
    println!("✓ {} rows without any indicator match", output.merge_stats.unenriched_rows);
    println!("✓ {} values coerced to missing", output.merge_stats.numeric_parse_failures);

    println!("\n📊 Analysis:");
    println!("   Manner of death codes: {:?}", output.analysis.encoding.mapping());
    println!("   Cities summarized: {}", output.analysis.city_summary.len());

    println!("\n📈 Rendering...");
    let rendered = pipeline.render(&output)?;
    for chart in &rendered.charts {
        match chart {
            ChartOutcome::Written(path) => println!("✓ Saved {}", path.display()),
            ChartOutcome::Skipped(reason) => println!("⚠️  Skipped chart: {}", reason),
        }
    }
    let extra_files = rendered.files.len()
        - rendered
            .charts
            .iter()
            .filter(|c| matches!(c, ChartOutcome::Written(_)))
            .count();
    if extra_files > 0 {
        println!("✓ Wrote {} report files to {}", extra_files, pipeline.config().output.dir.display());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Done");
    Ok(())
}

fn init_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", path.display());
        std::process::exit(1);
    }

    std::fs::write(&path, PipelineConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✅ Created {} with default settings.", path.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: Option<PathBuf>) -> Result<()> {
    println!("🖥️  Loading analysis...\n");

    let pipeline = Pipeline::new(load_config(config)?);
    let output = pipeline.analyze()?;
    let limit = pipeline.config().output.city_summary_limit;

    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(output, limit);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: Option<PathBuf>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_path_reads_env_var() {
        let cmd = Cli::command();
        for sub in ["run", "view"] {
            let config = cmd
                .find_subcommand(sub)
                .and_then(|c| c.get_arguments().find(|a| a.get_id() == "config"))
                .unwrap();
            assert_eq!(
                config.get_env().and_then(|v| v.to_str()),
                Some("POLICE_ANALYSIS_CONFIG")
            );
        }
    }

    #[test]
    fn test_verbose_and_quiet_flags_parse() {
        let cli = Cli::try_parse_from(["police-analysis", "-v", "run"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);
        assert!(matches!(cli.command, Command::Run { .. }));
    }
}
