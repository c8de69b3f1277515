//! Completion-ratio occupancy forecasting.
//!
//! For every completed sailing in the region, the ratio of its final fill to
//! its fill at the same days-before-departure offset says how much a sailing
//! in that position typically grows. The representative ratio is applied to
//! the in-flight sailing's current fill and clamped at full capacity.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::benchmark::History;
use crate::config::Settings;
use crate::curve::BookingCurve;
use crate::error::{PipelineError, PipelineResult};
use crate::ledger::BookingLedger;
use crate::models::{ForecastRecord, PaceRecord, Region, Sailing};

/// Checkpoints reported in the completion-ratio table.
pub const CHECKPOINTS: [u32; 5] = [180, 120, 90, 60, 30];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionRatio {
    pub ratio: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub occupancy: f64,
    pub revenue: f64,
    pub ratio: CompletionRatio,
}

/// Representative completion ratio for a region at one offset.
///
/// Sailings that were still empty at the offset have no defined ratio and are
/// skipped rather than counted as infinite growth.
pub fn completion_ratio(
    history: &History,
    region: Region,
    days_before_departure: u32,
    exclude: &HashSet<String>,
    settings: &Settings,
) -> PipelineResult<CompletionRatio> {
    let required = settings.required_history();
    let comparable: Vec<_> = history.in_region(region, exclude).collect();
    if comparable.len() < required {
        return Err(PipelineError::insufficient(region, comparable.len(), required));
    }

    let ratios: Vec<f64> = comparable
        .iter()
        .filter_map(|s| {
            let at_offset = s.fraction_at(days_before_departure);
            (at_offset > 0.0).then(|| s.final_fraction() / at_offset)
        })
        .collect();

    match settings.ratio_aggregate.apply(&ratios) {
        Some(ratio) => Ok(CompletionRatio {
            ratio,
            sample_size: ratios.len(),
        }),
        None => Err(PipelineError::NoDefinedRatio {
            region: region.to_string(),
            days_before_departure,
            comparable: comparable.len(),
        }),
    }
}

/// Projected final occupancy fraction and revenue for an in-flight sailing.
pub fn forecast(
    sailing: &Sailing,
    curve: &BookingCurve,
    history: &History,
    as_of_days_before_departure: u32,
    average_fare: f64,
    settings: &Settings,
) -> PipelineResult<Projection> {
    let exclude: HashSet<String> = [sailing.sailing_id.clone()].into_iter().collect();
    let ratio = completion_ratio(
        history,
        sailing.region,
        as_of_days_before_departure,
        &exclude,
        settings,
    )?;

    let current = curve.fraction_at(as_of_days_before_departure, sailing.capacity);
    let occupancy = (current * ratio.ratio).min(1.0);
    debug!(
        sailing_id = %sailing.sailing_id,
        current,
        ratio = ratio.ratio,
        occupancy,
        "projected occupancy"
    );

    Ok(Projection {
        occupancy,
        revenue: occupancy * sailing.capacity as f64 * average_fare,
        ratio,
    })
}

/// Full forecast record for one sailing at the evaluation date.
pub fn forecast_record(
    ledger: &BookingLedger,
    history: &History,
    sailing: &Sailing,
    curve: &BookingCurve,
    pace: Option<&PaceRecord>,
    evaluation_date: NaiveDate,
    settings: &Settings,
) -> PipelineResult<ForecastRecord> {
    curve.check_capacity(sailing)?;

    let days_out = sailing.days_before_departure(evaluation_date).max(0) as u32;
    let average_fare = ledger.average_fare(sailing, evaluation_date);
    let projection = forecast(sailing, curve, history, days_out, average_fare, settings)?;
    let current_cabins = curve.cabins_or_zero(days_out);

    Ok(ForecastRecord {
        sailing_id: sailing.sailing_id.clone(),
        region: sailing.region,
        departure_date: sailing.departure_date,
        evaluation_date,
        days_before_departure: days_out,
        capacity: sailing.capacity,
        current_cabins_sold: current_cabins,
        current_occupancy: current_cabins as f64 / sailing.capacity as f64,
        completion_ratio: projection.ratio.ratio,
        ratio_sample_size: projection.ratio.sample_size,
        projected_occupancy: projection.occupancy,
        projected_cabins: projection.occupancy * sailing.capacity as f64,
        average_fare,
        projected_revenue: projection.revenue,
        target_occupancy: settings.target_occupancy,
        projected_vs_target: projection.occupancy - settings.target_occupancy,
        competitor_price_index: ledger.competitor_price_index(sailing, evaluation_date),
        pace_gap: pace.map(|p| p.pace_gap),
        checkpoint_pace_gap: pace.and_then(|p| p.checkpoint_pace_gap),
    })
}

#[derive(Debug, Clone)]
pub struct RatioRow {
    pub region: Region,
    pub days_before_departure: u32,
    pub ratio: Option<CompletionRatio>,
}

/// Completion ratio per region at each standard checkpoint.
pub fn ratio_table(history: &History, settings: &Settings) -> Vec<RatioRow> {
    let exclude = HashSet::new();
    Region::ALL
        .iter()
        .flat_map(|&region| {
            let exclude = &exclude;
            CHECKPOINTS.into_iter().map(move |days| RatioRow {
                region,
                days_before_departure: days,
                ratio: completion_ratio(history, region, days, exclude, settings).ok(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::tests::{historical, ledger_of};
    use crate::config::Aggregate;
    use crate::ledger::fixtures::*;

    fn history_with_final(final_cabins: &[u32]) -> History {
        // Every sailing holds 50 of 100 cabins at 150 days out.
        let entries = final_cabins
            .iter()
            .enumerate()
            .map(|(i, &total)| {
                historical(
                    &format!("H{i}"),
                    Region::Antarctica,
                    100,
                    &[(150, 50), (10, total - 50)],
                )
            })
            .collect();
        History::collect(&ledger_of(entries), date(2025, 9, 1))
    }

    fn in_flight(sold: u32) -> (Sailing, BookingCurve) {
        let sailing = sample_sailing("F1", Region::Antarctica, date(2025, 12, 30), 100);
        let curve = BookingCurve::from_events(sailing.departure_date, &bookings_at(&sailing, 130, sold));
        (sailing, curve)
    }

    #[test]
    fn ratio_of_one_point_four_projects_at_risk_level() {
        let history = history_with_final(&[70, 70, 70]);
        let (sailing, curve) = in_flight(60);

        let projection = forecast(&sailing, &curve, &history, 120, 7500.0, &Settings::default()).unwrap();
        assert!((projection.ratio.ratio - 1.4).abs() < 1e-9);
        assert!((projection.occupancy - 0.84).abs() < 1e-9);
        assert!((projection.revenue - 0.84 * 100.0 * 7500.0).abs() < 1e-6);
    }

    #[test]
    fn ratio_of_one_point_six_projects_above_band() {
        let history = history_with_final(&[80, 80, 80]);
        let (sailing, curve) = in_flight(60);

        let projection = forecast(&sailing, &curve, &history, 120, 7500.0, &Settings::default()).unwrap();
        assert!((projection.occupancy - 0.96).abs() < 1e-9);
    }

    #[test]
    fn projection_is_clamped_at_capacity() {
        let history = history_with_final(&[65, 65, 65]);
        let (sailing, curve) = in_flight(90);

        let projection = forecast(&sailing, &curve, &history, 120, 7500.0, &Settings::default()).unwrap();
        assert!((projection.ratio.ratio - 1.3).abs() < 1e-9);
        assert_eq!(projection.occupancy, 1.0);
    }

    #[test]
    fn median_ratio_ignores_outlier() {
        let history = history_with_final(&[60, 70, 100]);
        let ratio = completion_ratio(&history, Region::Antarctica, 120, &HashSet::new(), &Settings::default())
            .unwrap();
        assert!((ratio.ratio - 1.4).abs() < 1e-9);
        assert_eq!(ratio.sample_size, 3);

        let mean_settings = Settings {
            ratio_aggregate: Aggregate::Mean,
            ..Settings::default()
        };
        let mean = completion_ratio(&history, Region::Antarctica, 120, &HashSet::new(), &mean_settings)
            .unwrap();
        assert!((mean.ratio - 1.533_333_333).abs() < 1e-6);
    }

    #[test]
    fn empty_sailings_at_offset_are_skipped() {
        let ledger = ledger_of(vec![
            historical("H1", Region::Alaska, 100, &[(150, 50), (10, 20)]),
            historical("H2", Region::Alaska, 100, &[(150, 50), (10, 20)]),
            historical("H3", Region::Alaska, 100, &[(30, 80)]),
        ]);
        let history = History::collect(&ledger, date(2025, 9, 1));
        let ratio = completion_ratio(&history, Region::Alaska, 120, &HashSet::new(), &Settings::default())
            .unwrap();

        assert_eq!(ratio.sample_size, 2);
        assert!((ratio.ratio - 1.4).abs() < 1e-9);
    }

    #[test]
    fn offset_without_any_ratio_is_reported_with_real_count() {
        let ledger = ledger_of(vec![
            historical("H1", Region::Alaska, 100, &[(30, 80)]),
            historical("H2", Region::Alaska, 100, &[(30, 80)]),
            historical("H3", Region::Alaska, 100, &[(30, 80)]),
        ]);
        let history = History::collect(&ledger, date(2025, 9, 1));
        let result = completion_ratio(&history, Region::Alaska, 120, &HashSet::new(), &Settings::default());

        let err = result.unwrap_err();
        assert_eq!(
            err,
            PipelineError::NoDefinedRatio {
                region: "Alaska".to_string(),
                days_before_departure: 120,
                comparable: 3,
            }
        );
        assert!(err.to_string().contains("none of 3 completed sailings"));
    }

    #[test]
    fn two_comparable_sailings_cannot_forecast() {
        let history = history_with_final(&[70, 70]);
        let (sailing, curve) = in_flight(60);

        let result = forecast(&sailing, &curve, &history, 120, 7500.0, &Settings::default());
        assert_eq!(
            result,
            Err(PipelineError::insufficient(Region::Antarctica, 2, 3))
        );
    }

    #[test]
    fn record_uses_list_price_without_bookings() {
        let history = history_with_final(&[70, 70, 70]);
        let sailing = sample_sailing("F1", Region::Antarctica, date(2025, 12, 30), 100);
        let ledger = BookingLedger::new(vec![sailing.clone()], Vec::new());
        let curve = BookingCurve::default();

        let record = forecast_record(&ledger, &history, &sailing, &curve, None, date(2025, 9, 1), &Settings::default())
            .unwrap();
        assert_eq!(record.current_cabins_sold, 0);
        assert_eq!(record.projected_occupancy, 0.0);
        assert_eq!(record.average_fare, 8000.0);
        assert!(record.pace_gap.is_none());
    }

    #[test]
    fn ratio_table_covers_every_region_and_checkpoint() {
        let history = history_with_final(&[70, 70, 70]);
        let table = ratio_table(&history, &Settings::default());

        assert_eq!(table.len(), Region::ALL.len() * CHECKPOINTS.len());
        let antarctica_120 = table
            .iter()
            .find(|row| row.region == Region::Antarctica && row.days_before_departure == 120)
            .unwrap();
        assert!(antarctica_120.ratio.is_some());
        assert!(table
            .iter()
            .filter(|row| row.region == Region::Alaska)
            .all(|row| row.ratio.is_none()));
    }
}
