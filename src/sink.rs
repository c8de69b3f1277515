//! CSV output tables read by the dashboard.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{
    ActionClass, BenchmarkSource, Category, ClassificationRecord, ForecastOutcome, PaceRecord, Region,
};
use crate::pipeline::RunOutput;

pub const PACE_TABLE: &str = "pace_analysis.csv";
pub const FORECAST_TABLE: &str = "revenue_forecast.csv";
pub const CLASSIFICATION_TABLE: &str = "sailing_classification.csv";

#[derive(Debug, Serialize)]
struct PaceRow<'a> {
    sailing_id: &'a str,
    region: Region,
    evaluation_date: NaiveDate,
    days_before_departure: u32,
    current_occupancy: f64,
    benchmark_occupancy: f64,
    pace_gap: f64,
    benchmark_source: BenchmarkSource,
    checkpoint_pace_gap: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ForecastRow<'a> {
    sailing_id: &'a str,
    region: Region,
    evaluation_date: NaiveDate,
    status: &'static str,
    days_before_departure: Option<u32>,
    current_occupancy: Option<f64>,
    completion_ratio: Option<f64>,
    projected_occupancy: Option<f64>,
    projected_cabins: Option<f64>,
    average_fare: Option<f64>,
    projected_revenue: Option<f64>,
    projected_vs_target: Option<f64>,
    competitor_price_index: Option<f64>,
    note: &'a str,
}

#[derive(Debug, Serialize)]
struct ClassificationRow<'a> {
    sailing_id: &'a str,
    region: Region,
    category: Category,
    flags: String,
    action: ActionClass,
    recommendation: &'a str,
}

pub fn flag_list(record: &ClassificationRecord) -> String {
    record
        .flags
        .iter()
        .map(|flag| flag.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn write_pace<W: Write>(writer: W, records: &[PaceRecord]) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(PaceRow {
            sailing_id: &record.sailing_id,
            region: record.region,
            evaluation_date: record.evaluation_date,
            days_before_departure: record.days_before_departure,
            current_occupancy: record.current_occupancy,
            benchmark_occupancy: record.benchmark_occupancy,
            pace_gap: record.pace_gap,
            benchmark_source: record.benchmark_source,
            checkpoint_pace_gap: record.checkpoint_pace_gap,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_forecasts<W: Write>(
    writer: W,
    evaluation_date: NaiveDate,
    outcomes: &[ForecastOutcome],
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for outcome in outcomes {
        let row = match outcome {
            ForecastOutcome::Available(record) => ForecastRow {
                sailing_id: &record.sailing_id,
                region: record.region,
                evaluation_date,
                status: "available",
                days_before_departure: Some(record.days_before_departure),
                current_occupancy: Some(record.current_occupancy),
                completion_ratio: Some(record.completion_ratio),
                projected_occupancy: Some(record.projected_occupancy),
                projected_cabins: Some(record.projected_cabins),
                average_fare: Some(record.average_fare),
                projected_revenue: Some(record.projected_revenue),
                projected_vs_target: Some(record.projected_vs_target),
                competitor_price_index: Some(record.competitor_price_index),
                note: "",
            },
            ForecastOutcome::Unavailable {
                sailing_id,
                region,
                reason,
            } => ForecastRow {
                sailing_id,
                region: *region,
                evaluation_date,
                status: "unavailable",
                days_before_departure: None,
                current_occupancy: None,
                completion_ratio: None,
                projected_occupancy: None,
                projected_cabins: None,
                average_fare: None,
                projected_revenue: None,
                projected_vs_target: None,
                competitor_price_index: None,
                note: reason,
            },
        };
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_classifications<W: Write>(
    writer: W,
    records: &[ClassificationRecord],
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(ClassificationRow {
            sailing_id: &record.sailing_id,
            region: record.region,
            category: record.category,
            flags: flag_list(record),
            action: record.action,
            recommendation: &record.recommendation,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn create(dir: &Path, name: &str) -> anyhow::Result<(std::fs::File, PathBuf)> {
    let path = dir.join(name);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    Ok((file, path))
}

/// Writes the three output tables, replacing any previous run's files.
pub fn write_tables(dir: &Path, output: &RunOutput) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let (file, pace_path) = create(dir, PACE_TABLE)?;
    write_pace(file, &output.pace)?;
    let (file, forecast_path) = create(dir, FORECAST_TABLE)?;
    write_forecasts(file, output.evaluation_date, &output.forecasts)?;
    let (file, classification_path) = create(dir, CLASSIFICATION_TABLE)?;
    write_classifications(file, &output.classifications)?;

    Ok(vec![pace_path, forecast_path, classification_path])
}
