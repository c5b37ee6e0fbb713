use analytics::table::pivot;
use analytics::{CohortRetentionEngine, CohortSettings, CohortTable};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use configuration::Config;
use core_types::{CohortMetric, Period, PeriodGranularity, PeriodIndexing, TransactionRecord};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The main entry point for the cohort retention tool.
fn main() -> Result<()> {
    // COHORT__* and RUST_LOG may come from a .env file; it is optional.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => configuration::load_config_from(path),
        None => configuration::load_config(),
    }
    .context("Failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Retention(args) => handle_retention(args, &config),
        Commands::Aggregates(args) => handle_aggregates(args, &config),
        Commands::Verify(args) => handle_verify(args, &config),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Cohort retention analysis over purchase records.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of ./config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the share of each cohort still buying in each cohort period.
    Retention(RetentionArgs),
    /// Print one aggregate metric per cohort and cohort period.
    Aggregates(AggregatesArgs),
    /// Recompute one (cohort, period) aggregate from the raw records and compare.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct InputArgs {
    /// JSON array of transaction records.
    #[arg(long)]
    input: PathBuf,

    /// Overrides `analysis.granularity`.
    #[arg(long, value_enum)]
    granularity: Option<PeriodGranularity>,

    /// Overrides `analysis.indexing`.
    #[arg(long, value_enum)]
    indexing: Option<PeriodIndexing>,
}

impl InputArgs {
    fn settings(&self, config: &Config) -> CohortSettings {
        CohortSettings {
            granularity: self.granularity.unwrap_or(config.analysis.granularity),
            indexing: self.indexing.unwrap_or(config.analysis.indexing),
        }
    }
}

#[derive(Args)]
struct RetentionArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Only show these cohort groups (e.g. "2009-06,2009-07").
    #[arg(long, value_delimiter = ',')]
    cohorts: Vec<String>,

    /// Last cohort period to show. Defaults to `analysis.max_display_periods`.
    #[arg(long)]
    max_period: Option<u32>,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct AggregatesArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long, value_enum, default_value_t = CohortMetric::TotalUsers)]
    metric: CohortMetric,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct VerifyArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Cohort group label, e.g. "2009-01".
    #[arg(long)]
    cohort: String,

    /// Order period label, e.g. "2009-03".
    #[arg(long)]
    period: String,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_retention(args: RetentionArgs, config: &Config) -> Result<()> {
    let settings = args.input.settings(config);
    let records = load_records(&args.input.input)?;
    let report = CohortRetentionEngine::new(settings).run(&records)?;

    let cohorts = args
        .cohorts
        .iter()
        .map(|label| Period::parse(settings.granularity, label))
        .collect::<Result<Vec<_>, _>>()?;
    let max_period = args.max_period.unwrap_or(config.analysis.max_display_periods);
    let view = report.retention.select(&cohorts, Some(max_period));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        let grid = cohort_grid(view.ratios(), Some(view.cohort_sizes()), |ratio| {
            format!("{}%", (*ratio * Decimal::ONE_HUNDRED).round_dp(1))
        });
        println!("{grid}");
    }

    Ok(())
}

fn handle_aggregates(args: AggregatesArgs, config: &Config) -> Result<()> {
    let settings = args.input.settings(config);
    let records = load_records(&args.input.input)?;
    let report = CohortRetentionEngine::new(settings).run(&records)?;
    let table = pivot(&report.aggregates, args.metric);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        println!("{}", args.metric);
        println!("{}", cohort_grid(&table, None, |value| value.round_dp(2).to_string()));
    }

    Ok(())
}

fn handle_verify(args: VerifyArgs, config: &Config) -> Result<()> {
    let settings = args.input.settings(config);
    let records = load_records(&args.input.input)?;
    let engine = CohortRetentionEngine::new(settings);
    let report = engine.run(&records)?;

    let cohort_group = Period::parse(settings.granularity, &args.cohort)?;
    let order_period = Period::parse(settings.granularity, &args.period)?;
    let row = engine.verify_aggregate(
        &records,
        &report.cohorts,
        &report.aggregates,
        cohort_group,
        order_period,
    )?;

    println!(
        "OK {} / {} (cohort period {}): {} users, {} orders, {} charged",
        row.cohort_group,
        row.order_period,
        row.cohort_period,
        row.total_users,
        row.total_orders,
        row.total_charges.round_dp(2)
    );

    Ok(())
}

/// Reads a JSON array of `TransactionRecord`s.
fn load_records(path: &Path) -> Result<Vec<TransactionRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<TransactionRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to decode records in {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), "Loaded transaction records.");
    Ok(records)
}

/// Lays a cohort table out with one row per cohort and one column per cohort period.
fn cohort_grid<T>(
    table: &CohortTable<T>,
    sizes: Option<&BTreeMap<Period, usize>>,
    format: impl Fn(&T) -> String,
) -> Table {
    let last_period = table.max_cohort_period().unwrap_or(0);

    let mut header = vec![Cell::new("Cohort")];
    if sizes.is_some() {
        header.push(Cell::new("Users"));
    }
    header.extend((1..=last_period).map(Cell::new));

    let mut grid = Table::new();
    grid.load_preset(UTF8_FULL).set_header(header);

    for (cohort, row) in table.rows() {
        let mut cells = vec![Cell::new(cohort)];
        if let Some(sizes) = sizes {
            let size = sizes.get(cohort).map(ToString::to_string).unwrap_or_default();
            cells.push(Cell::new(size).set_alignment(CellAlignment::Right));
        }
        cells.extend((1..=last_period).map(|period| {
            let text = row.get(&period).map(&format).unwrap_or_default();
            Cell::new(text).set_alignment(CellAlignment::Right)
        }));
        grid.add_row(cells);
    }

    grid
}
