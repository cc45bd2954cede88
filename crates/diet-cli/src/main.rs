use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use diet_model::{format_g, Dataset, DietError, DietModel, Report, DAIRY_LIMIT};
use diet_solver::SimplexSolver;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diet")]
#[command(about = "Least-cost diet: solve, add a dairy limit, solve again", long_about = None)]
struct Cli {
    /// Load the dataset from a JSON file instead of the built-in table
    #[arg(long)]
    data: Option<PathBuf>,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Maximum servings of milk plus ice cream for the second solve
    #[arg(long, default_value_t = DAIRY_LIMIT)]
    dairy_limit: f64,
    /// Skip the second solve when the first one finds no solution
    #[arg(long)]
    stop_on_infeasible: bool,
    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct Summary {
    initial: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    limited: Option<Report>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli, &mut std::io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout only carries the reports
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("diet={level},diet_model={level},diet_solver={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, out: &mut impl Write) -> Result<(), DietError> {
    let dataset = match &cli.data {
        Some(path) => Dataset::load(path)?,
        None => Dataset::classic(),
    };
    run_dataset(cli, dataset, out)
}

/// Solve, add the dairy limit, solve again. Reports go to `out`.
fn run_dataset(cli: &Cli, dataset: Dataset, out: &mut impl Write) -> Result<(), DietError> {
    let solver = SimplexSolver::new();
    let mut model = DietModel::build(dataset)?;

    model.optimize(&solver)?;
    let initial = Report::from_model(&model)?;
    if cli.format == Format::Text {
        write!(out, "{}", initial)?;
    }

    let limited = if cli.stop_on_infeasible && !initial.is_optimal() {
        info!("first solve found no solution, skipping the dairy limit");
        None
    } else {
        if cli.format == Format::Text {
            writeln!(out)?;
            writeln!(
                out,
                "Adding constraint: at most {} servings of dairy",
                format_g(cli.dairy_limit)
            )?;
        }
        model.add_dairy_limit(cli.dairy_limit)?;
        model.optimize(&solver)?;

        let report = Report::from_model(&model)?;
        if cli.format == Format::Text {
            write!(out, "{}", report)?;
        }
        Some(report)
    };

    if cli.format == Format::Json {
        let summary = Summary { initial, limited };
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    }

    Ok(())
}
