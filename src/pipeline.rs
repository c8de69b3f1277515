//! Batch run over every in-flight sailing.
//!
//! Benchmarks are built once and only read afterwards; a failure for one
//! sailing or region is recorded and the run carries on.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::benchmark::{build_cross_region_benchmark, build_region_benchmark, History, RegionBenchmark};
use crate::classify::classify_portfolio;
use crate::config::Settings;
use crate::curve::build_curve_as_of;
use crate::error::PipelineResult;
use crate::forecast::forecast_record;
use crate::ledger::BookingLedger;
use crate::models::{ClassificationRecord, ForecastOutcome, ForecastRecord, PaceRecord, Region};
use crate::pace::pace_record;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub evaluation_date: NaiveDate,
    pub pace: Vec<PaceRecord>,
    pub forecasts: Vec<ForecastOutcome>,
    pub classifications: Vec<ClassificationRecord>,
}

impl RunOutput {
    pub fn available_forecasts(&self) -> impl Iterator<Item = &ForecastRecord> {
        self.forecasts.iter().filter_map(|outcome| match outcome {
            ForecastOutcome::Available(record) => Some(record),
            ForecastOutcome::Unavailable { .. } => None,
        })
    }

    pub fn unavailable_count(&self) -> usize {
        self.forecasts.len() - self.available_forecasts().count()
    }
}

/// Stable identifier for a run: same evaluation date and same table contents
/// give the same id, and any changed field gives a new one.
pub fn run_id(ledger: &BookingLedger, evaluation_date: NaiveDate) -> Uuid {
    let mut key = evaluation_date.to_string();
    for sailing in ledger.sailings() {
        let _ = write!(
            key,
            "|S:{},{},{},{},{},{:?}",
            sailing.sailing_id,
            sailing.region,
            sailing.departure_date,
            sailing.capacity,
            sailing.list_price,
            sailing.competitor_price_index
        );
        for booking in ledger.bookings(&sailing.sailing_id) {
            let _ = write!(
                key,
                "|B:{},{},{},{:?}",
                booking.booking_date, booking.cabins, booking.realized_fare, booking.competitor_price_index
            );
        }
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

pub struct Benchmarks {
    pub regional: BTreeMap<Region, PipelineResult<RegionBenchmark>>,
    pub cross_region: Option<RegionBenchmark>,
}

impl Benchmarks {
    pub fn build(history: &History, exclude: &HashSet<String>, settings: &Settings) -> Self {
        let regional = Region::ALL
            .iter()
            .map(|&region| (region, build_region_benchmark(history, region, exclude, settings)))
            .collect();
        let cross_region = if settings.cross_region_fallback {
            build_cross_region_benchmark(history, exclude, settings).ok()
        } else {
            None
        };
        Self {
            regional,
            cross_region,
        }
    }

    /// Regional benchmark, else the cross-region one when enabled.
    pub fn for_region(&self, region: Region) -> Option<&RegionBenchmark> {
        match self.regional.get(&region) {
            Some(Ok(benchmark)) => Some(benchmark),
            _ => self.cross_region.as_ref(),
        }
    }
}

pub fn run(ledger: &BookingLedger, evaluation_date: NaiveDate, settings: &Settings) -> RunOutput {
    let history = History::collect(ledger, evaluation_date);
    let in_flight: Vec<_> = ledger
        .sailings()
        .filter(|s| !s.is_completed(evaluation_date))
        .collect();
    let in_flight_ids: HashSet<String> = in_flight.iter().map(|s| s.sailing_id.clone()).collect();

    let benchmarks = Benchmarks::build(&history, &in_flight_ids, settings);
    for (region, result) in &benchmarks.regional {
        if let Err(err) = result {
            warn!(%region, error = %err, "regional benchmark unavailable");
        }
    }

    let mut pace = Vec::new();
    let mut forecasts = Vec::new();
    for sailing in in_flight {
        let curve = build_curve_as_of(ledger, sailing, evaluation_date);
        if let Err(err) = curve.check_capacity(sailing) {
            warn!(sailing_id = %sailing.sailing_id, error = %err, "excluding sailing from run");
            forecasts.push(ForecastOutcome::Unavailable {
                sailing_id: sailing.sailing_id.clone(),
                region: sailing.region,
                reason: err.to_string(),
            });
            continue;
        }

        let sailing_pace = benchmarks.for_region(sailing.region).map(|benchmark| {
            pace_record(
                sailing,
                &curve,
                benchmark,
                evaluation_date,
                settings.thresholds.early_window_days,
            )
        });
        if sailing_pace.is_none() {
            warn!(sailing_id = %sailing.sailing_id, "no benchmark available, skipping pace");
        }

        let outcome = match forecast_record(
            ledger,
            &history,
            sailing,
            &curve,
            sailing_pace.as_ref(),
            evaluation_date,
            settings,
        ) {
            Ok(record) => ForecastOutcome::Available(record),
            Err(err) => {
                warn!(sailing_id = %sailing.sailing_id, error = %err, "forecast unavailable");
                ForecastOutcome::Unavailable {
                    sailing_id: sailing.sailing_id.clone(),
                    region: sailing.region,
                    reason: err.to_string(),
                }
            }
        };

        pace.extend(sailing_pace);
        forecasts.push(outcome);
    }

    let available: Vec<ForecastRecord> = forecasts
        .iter()
        .filter_map(|outcome| match outcome {
            ForecastOutcome::Available(record) => Some(record.clone()),
            ForecastOutcome::Unavailable { .. } => None,
        })
        .collect();
    let classifications = classify_portfolio(&available, &settings.thresholds);

    info!(
        historical = history.len(),
        in_flight = forecasts.len(),
        forecasted = available.len(),
        "pipeline run complete"
    );

    RunOutput {
        run_id: run_id(ledger, evaluation_date),
        evaluation_date,
        pace,
        forecasts,
        classifications,
    }
}
