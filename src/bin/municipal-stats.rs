//! CLI for the municipal indicators analysis

use anyhow::Context;
use clap::Parser;
use log::warn;
use municipal_statistics::analysis::run_analysis;
use municipal_statistics::config::AnalysisConfig;
use municipal_statistics::data::Dataset;
use municipal_statistics::report::{render_text, sheets, write_json, write_sheets};
use municipal_statistics::testing::correction::Correction;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "municipal-stats",
    about = "Descriptive statistics, hypothesis tests, ANOVA and regression over municipal indicators",
    version
)]
struct Args {
    /// Input CSV file with a header row
    #[arg(value_name = "CSV")]
    input: PathBuf,

    /// TOML file with analysis settings
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Significance level for every test
    #[arg(short = 'a', long = "alpha")]
    alpha: Option<f64>,

    /// Directory to write the result sheets to, one CSV per sheet
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    out: Option<PathBuf>,

    /// Continuous outcome column
    #[arg(long = "value-column")]
    value_column: Option<String>,

    /// Continuous predictor column
    #[arg(long = "secondary-column")]
    secondary_column: Option<String>,

    /// Categorical grouping column
    #[arg(long = "group-column")]
    group_column: Option<String>,

    /// Adjustment for the pairwise F-test p-values
    #[arg(long = "correction", value_enum, ignore_case = true)]
    correction: Option<Correction>,

    /// Write the full report as JSON to this file
    #[arg(long = "json", value_name = "FILE")]
    json: Option<PathBuf>,
}

fn resolve_config(args: &Args) -> anyhow::Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(alpha) = args.alpha {
        config = config.with_alpha(alpha);
    }
    if let Some(column) = &args.value_column {
        config.value_column = column.clone();
    }
    if let Some(column) = &args.secondary_column {
        config.secondary_column = column.clone();
    }
    if let Some(column) = &args.group_column {
        config.group_column = column.clone();
    }
    if let Some(correction) = args.correction {
        config.correction = correction;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    let dataset = Dataset::load(&args.input, &config.required_columns())
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    let report = run_analysis(&dataset, &config)?;

    print!("{}", render_text(&report));

    for (section, err) in report.not_applicable() {
        warn!("{} not applicable: {}", section, err);
    }

    if let Some(dir) = &args.out {
        write_sheets(dir, &sheets(&report))?;
        eprintln!("Sheets written to {}", dir.display());
    }
    if let Some(path) = &args.json {
        write_json(path, &report)?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}
