//! tabdrift: CLI entry point.
//!
//! Compares two dataset files column by column and reports the selected
//! test and p-value per shared column.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use colored::Colorize;

use tabdrift::compare::{compare_common_columns_with, ColumnOutcome, CompareOptions, ErrorPolicy, Report};
use tabdrift::dataset::{load_dataset_json, load_dataset_yaml, Dataset};

#[derive(Parser)]
#[command(name = "tabdrift")]
#[command(about = "Column-wise statistical comparison of two tabular datasets")]
#[command(version)]
struct Cli {
    /// Baseline dataset (JSON or YAML mapping column name to values).
    baseline: PathBuf,

    /// Current dataset to compare against the baseline.
    current: PathBuf,

    /// Distinct-value count at or below which a column is categorical.
    #[arg(short, long, default_value_t = 5)]
    threshold: usize,

    /// Significance level for assumption checks and the report marker.
    #[arg(short, long, default_value_t = 0.05)]
    alpha: f64,

    /// Record per-column failures instead of aborting the batch.
    #[arg(long)]
    continue_on_error: bool,

    /// Emit the report as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Exit nonzero when any column is significant at --alpha.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let baseline = load_dataset(&cli.baseline)?;
    let current = load_dataset(&cli.current)?;

    let options = CompareOptions {
        categorical_threshold: cli.threshold,
        on_error: if cli.continue_on_error {
            ErrorPolicy::Record
        } else {
            ErrorPolicy::Abort
        },
        ..Default::default()
    };

    let start = Instant::now();
    let report = compare_common_columns_with(&baseline, &current, &options)?;
    let elapsed = start.elapsed();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&cli, &report, elapsed.as_secs_f64());
    }

    let failed = report.values().filter(|o| !o.is_tested()).count();
    let significant = report
        .values()
        .filter_map(ColumnOutcome::result)
        .filter(|r| r.p_value < cli.alpha)
        .count();

    if failed > 0 || (cli.strict && significant > 0) {
        std::process::exit(1);
    }

    Ok(())
}

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;

    let is_yaml = path
        .extension()
        .is_some_and(|e| e == "yaml" || e == "yml");

    if is_yaml {
        load_dataset_yaml(&content)
    } else {
        load_dataset_json(&content)
    }
    .map_err(|e| anyhow::anyhow!("cannot parse {}: {e}", path.display()))
}

fn print_report(cli: &Cli, report: &Report, elapsed: f64) {
    println!("{}", "tabdrift".bold());
    println!("  Baseline: {}", cli.baseline.display());
    println!("  Current:  {}", cli.current.display());
    println!();

    for (name, outcome) in report {
        match outcome {
            ColumnOutcome::Tested(result) => {
                if result.p_value < cli.alpha {
                    println!(
                        "  {} {} {} p={:.4}",
                        "!".red(),
                        name.red(),
                        result.test.name().dimmed(),
                        result.p_value
                    );
                } else {
                    println!(
                        "  {} {} {} p={:.4}",
                        "✓".green(),
                        name,
                        result.test.name().dimmed(),
                        result.p_value
                    );
                }
            }
            ColumnOutcome::Failed { error } => {
                println!("  {} {} (error)", "✗".red(), name.red());
                println!("      {error}");
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60));

    let tested = report.values().filter(|o| o.is_tested()).count();
    let failed = report.len() - tested;
    let significant = report
        .values()
        .filter_map(ColumnOutcome::result)
        .filter(|r| r.p_value < cli.alpha)
        .count();

    if failed == 0 {
        println!(
            "  {} {} columns compared, {} below alpha={} in {:.2}s",
            "OK".green(),
            tested,
            significant,
            cli.alpha,
            elapsed
        );
    } else {
        println!(
            "  {} {} columns compared, {} below alpha={}, {} failed in {:.2}s",
            "FAIL".red(),
            tested,
            significant,
            cli.alpha,
            failed.to_string().red(),
            elapsed
        );
    }

    println!("{}", "=".repeat(60));
}
