use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod benchmark;
mod classify;
mod config;
mod curve;
mod db;
mod error;
mod forecast;
mod ledger;
mod models;
mod pace;
mod pipeline;
mod report;
mod sink;

use crate::config::Settings;
use crate::ledger::BookingLedger;
use crate::models::{Category, Region};

#[derive(Parser)]
#[command(name = "revenue-studio")]
#[command(about = "Sailing occupancy forecasting and pricing recommendations", long_about = None)]
struct Cli {
    /// Settings file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    #[arg(long, default_value = "sailings.csv")]
    sailings: PathBuf,
    #[arg(long, default_value = "bookings.csv")]
    bookings: PathBuf,
    /// Evaluation date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

impl Inputs {
    fn evaluation_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn load(&self) -> anyhow::Result<BookingLedger> {
        BookingLedger::load(&self.sailings, &self.bookings)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Forecast and classify every in-flight sailing
    Run {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Also store the output tables in Postgres (DATABASE_URL)
        #[arg(long)]
        persist: bool,
    },
    /// Show regional benchmark curves and completion ratios
    Benchmark {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long)]
        region: Option<Region>,
    },
    /// Generate a markdown decision report
    Report {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(config::LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_benchmarks(
    ledger: &BookingLedger,
    evaluation_date: NaiveDate,
    only: Option<Region>,
    settings: &Settings,
) {
    let history = benchmark::History::collect(ledger, evaluation_date);
    println!(
        "{} completed sailings before {}",
        history.len(),
        evaluation_date
    );

    let regions: Vec<Region> = match only {
        Some(region) => vec![region],
        None => Region::ALL.to_vec(),
    };
    let offsets = [180, 120, 90, 60, 30, 0];
    for region in &regions {
        match benchmark::build_region_benchmark(&history, *region, &HashSet::new(), settings) {
            Ok(curve) => {
                let samples: Vec<String> = offsets
                    .iter()
                    .map(|&days| format!("{days}d {:.1}%", curve.expected_at(days) * 100.0))
                    .collect();
                println!(
                    "- {} ({} sailings, {} offsets): {}",
                    region,
                    curve.sample_size,
                    curve.points().len(),
                    samples.join(", ")
                );
            }
            Err(err) => println!("- {region}: {err}"),
        }
    }

    println!("Completion ratios:");
    for row in forecast::ratio_table(&history, settings)
        .into_iter()
        .filter(|row| regions.contains(&row.region))
    {
        match row.ratio {
            Some(ratio) => println!(
                "- {} at {}d: {:.3} (n={})",
                row.region, row.days_before_departure, ratio.ratio, ratio.sample_size
            ),
            None => println!("- {} at {}d: unavailable", row.region, row.days_before_departure),
        }
    }
}

fn print_summary(output: &pipeline::RunOutput, written: &[PathBuf]) {
    let count = |category: Category| {
        output
            .classifications
            .iter()
            .filter(|c| c.category == category)
            .count()
    };
    println!(
        "Run {} as of {}: {} sailings forecast, {} unavailable.",
        output.run_id,
        output.evaluation_date,
        output.available_forecasts().count(),
        output.unavailable_count()
    );
    println!(
        "At risk {}, on track {}, overperforming {}.",
        count(Category::AtRisk),
        count(Category::OnTrack),
        count(Category::Overperforming)
    );
    for path in written {
        println!("Wrote {}.", path.display());
    }
}

fn write_report(path: &Path, report: &str) -> anyhow::Result<()> {
    std::fs::write(path, report).with_context(|| format!("failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Run {
            inputs,
            out_dir,
            persist,
        } => {
            let ledger = inputs.load()?;
            let evaluation_date = inputs.evaluation_date();
            info!(%evaluation_date, "starting run");

            let output = pipeline::run(&ledger, evaluation_date, &settings);
            let written = sink::write_tables(&out_dir, &output)?;
            print_summary(&output, &written);

            if persist {
                let pool = connect().await?;
                let stored = db::persist_run(&pool, &output).await?;
                println!("Stored {stored} sailings for run {}.", output.run_id);
            }
        }
        Commands::Benchmark { inputs, region } => {
            let ledger = inputs.load()?;
            print_benchmarks(&ledger, inputs.evaluation_date(), region, &settings);
        }
        Commands::Report { inputs, out } => {
            let ledger = inputs.load()?;
            let output = pipeline::run(&ledger, inputs.evaluation_date(), &settings);
            write_report(&out, &report::build_report(&output, &settings))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
