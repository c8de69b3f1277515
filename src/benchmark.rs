//! Regional booking-curve benchmarks built from completed sailings.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::config::{Aggregate, Settings};
use crate::curve::{build_curve, BookingCurve};
use crate::error::{PipelineError, PipelineResult};
use crate::ledger::BookingLedger;
use crate::models::Region;

/// A departed sailing whose curve is eligible for aggregation.
#[derive(Debug, Clone)]
pub struct HistoricalSailing {
    pub sailing_id: String,
    pub region: Region,
    pub capacity: u32,
    pub curve: BookingCurve,
}

impl HistoricalSailing {
    pub fn fraction_at(&self, days_before_departure: u32) -> f64 {
        self.curve.fraction_at(days_before_departure, self.capacity)
    }

    pub fn final_fraction(&self) -> f64 {
        self.curve.final_fraction(self.capacity)
    }
}

/// Completed sailings as of the evaluation date, read-only once collected.
#[derive(Debug, Clone, Default)]
pub struct History {
    sailings: Vec<HistoricalSailing>,
}

impl History {
    /// Curves only see bookings recorded by `as_of`. Overbooked sailings are
    /// logged and left out so they cannot skew a region.
    pub fn collect(ledger: &BookingLedger, as_of: NaiveDate) -> Self {
        let mut sailings = Vec::new();
        for sailing in ledger.sailings().filter(|s| s.is_completed(as_of)) {
            let curve = match build_curve(ledger, &sailing.sailing_id, as_of) {
                Ok(curve) => curve,
                Err(err) => {
                    warn!(sailing_id = %sailing.sailing_id, error = %err, "skipping historical sailing");
                    continue;
                }
            };
            if let Err(err) = curve.check_capacity(sailing) {
                warn!(sailing_id = %sailing.sailing_id, error = %err, "excluding sailing from history");
                continue;
            }
            sailings.push(HistoricalSailing {
                sailing_id: sailing.sailing_id.clone(),
                region: sailing.region,
                capacity: sailing.capacity,
                curve,
            });
        }
        debug!(count = sailings.len(), "collected historical sailings");
        Self { sailings }
    }

    pub fn len(&self) -> usize {
        self.sailings.len()
    }

    pub fn in_region<'a>(
        &'a self,
        region: Region,
        exclude: &'a HashSet<String>,
    ) -> impl Iterator<Item = &'a HistoricalSailing> {
        self.sailings
            .iter()
            .filter(move |s| s.region == region && !exclude.contains(&s.sailing_id))
    }

    pub fn all_except<'a>(
        &'a self,
        exclude: &'a HashSet<String>,
    ) -> impl Iterator<Item = &'a HistoricalSailing> {
        self.sailings
            .iter()
            .filter(move |s| !exclude.contains(&s.sailing_id))
    }
}

/// Expected occupancy fraction by days-before-departure.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBenchmark {
    /// `None` for a cross-region benchmark.
    pub region: Option<Region>,
    pub sample_size: usize,
    points: Vec<(u32, f64)>,
}

impl RegionBenchmark {
    pub fn points(&self) -> &[(u32, f64)] {
        &self.points
    }

    /// Expected fraction at `days_before_departure`, carried forward from the
    /// nearest larger offset. Beyond the earliest observed booking every
    /// contributing sailing was empty, so the expectation is zero.
    pub fn expected_at(&self, days_before_departure: u32) -> f64 {
        let idx = self
            .points
            .partition_point(|&(offset, _)| offset >= days_before_departure);
        if idx == 0 {
            0.0
        } else {
            self.points[idx - 1].1
        }
    }
}

fn aggregate_curves<'a>(
    region: Option<Region>,
    sailings: impl Iterator<Item = &'a HistoricalSailing>,
    required: usize,
    aggregate: Aggregate,
) -> PipelineResult<RegionBenchmark> {
    let members: Vec<&HistoricalSailing> = sailings.collect();
    if members.len() < required {
        return Err(PipelineError::InsufficientHistory {
            region: region.map_or_else(|| "all regions".to_string(), |r| r.to_string()),
            found: members.len(),
            required,
        });
    }

    let offsets: BTreeSet<u32> = members
        .iter()
        .flat_map(|s| s.curve.points().iter().map(|&(offset, _)| offset))
        .collect();

    let points = offsets
        .into_iter()
        .rev()
        .filter_map(|offset| {
            let fractions: Vec<f64> = members.iter().map(|s| s.fraction_at(offset)).collect();
            aggregate.apply(&fractions).map(|value| (offset, value))
        })
        .collect();

    Ok(RegionBenchmark {
        region,
        sample_size: members.len(),
        points,
    })
}

/// Benchmark over a region's completed sailings, leaving out `exclude`.
pub fn build_region_benchmark(
    history: &History,
    region: Region,
    exclude: &HashSet<String>,
    settings: &Settings,
) -> PipelineResult<RegionBenchmark> {
    aggregate_curves(
        Some(region),
        history.in_region(region, exclude),
        settings.required_history(),
        settings.benchmark_aggregate,
    )
}

/// Benchmark over every completed sailing regardless of region.
pub fn build_cross_region_benchmark(
    history: &History,
    exclude: &HashSet<String>,
    settings: &Settings,
) -> PipelineResult<RegionBenchmark> {
    aggregate_curves(
        None,
        history.all_except(exclude),
        settings.required_history(),
        settings.benchmark_aggregate,
    )
}
