use chrono::NaiveDate;

use crate::benchmark::RegionBenchmark;
use crate::curve::BookingCurve;
use crate::models::{BenchmarkSource, PaceRecord, Sailing};

/// Signed gap between the sailing's fill and the benchmark at the same offset.
/// Positive means ahead of pace.
pub fn evaluate_pace(
    sailing: &Sailing,
    curve: &BookingCurve,
    benchmark: &RegionBenchmark,
    as_of_days_before_departure: u32,
) -> f64 {
    let current = curve.fraction_at(as_of_days_before_departure, sailing.capacity);
    current - benchmark.expected_at(as_of_days_before_departure)
}

/// Pace at evaluation time plus the early-window checkpoint reading.
///
/// The checkpoint gap exists only once the sailing is at or inside the
/// checkpoint; `curve` must hold bookings up to the evaluation date only.
pub fn pace_record(
    sailing: &Sailing,
    curve: &BookingCurve,
    benchmark: &RegionBenchmark,
    evaluation_date: NaiveDate,
    checkpoint_days: u32,
) -> PaceRecord {
    let days_out = sailing.days_before_departure(evaluation_date).max(0) as u32;
    let current = curve.fraction_at(days_out, sailing.capacity);
    let expected = benchmark.expected_at(days_out);
    let checkpoint_pace_gap = (days_out <= checkpoint_days)
        .then(|| evaluate_pace(sailing, curve, benchmark, checkpoint_days));

    PaceRecord {
        sailing_id: sailing.sailing_id.clone(),
        region: sailing.region,
        evaluation_date,
        days_before_departure: days_out,
        current_occupancy: current,
        benchmark_occupancy: expected,
        pace_gap: current - expected,
        benchmark_source: if benchmark.region.is_some() {
            BenchmarkSource::Regional
        } else {
            BenchmarkSource::CrossRegion
        },
        checkpoint_pace_gap,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::benchmark::tests::{historical, ledger_of};
    use crate::benchmark::{build_region_benchmark, History};
    use crate::config::Settings;
    use crate::curve::build_curve_as_of;
    use crate::ledger::fixtures::*;
    use crate::models::Region;

    fn benchmark() -> RegionBenchmark {
        // Each sailing is 50% full by 120 days out and 80% at departure.
        let ledger = ledger_of(vec![
            historical("H1", Region::Arctic, 100, &[(150, 50), (20, 30)]),
            historical("H2", Region::Arctic, 100, &[(150, 50), (20, 30)]),
            historical("H3", Region::Arctic, 100, &[(150, 50), (20, 30)]),
        ]);
        let history = History::collect(&ledger, date(2025, 9, 1));
        build_region_benchmark(&history, Region::Arctic, &HashSet::new(), &Settings::default())
            .unwrap()
    }

    #[test]
    fn gap_is_current_minus_expected() {
        let sailing = sample_sailing("F1", Region::Arctic, date(2026, 1, 1), 100);
        let curve = BookingCurve::from_events(sailing.departure_date, &bookings_at(&sailing, 130, 35));

        let gap = evaluate_pace(&sailing, &curve, &benchmark(), 120);
        assert!((gap - (0.35 - 0.50)).abs() < 1e-9);
    }

    #[test]
    fn ahead_of_pace_is_positive() {
        let sailing = sample_sailing("F1", Region::Arctic, date(2026, 1, 1), 100);
        let curve = BookingCurve::from_events(sailing.departure_date, &bookings_at(&sailing, 130, 60));

        assert!(evaluate_pace(&sailing, &curve, &benchmark(), 120) > 0.0);
    }

    #[test]
    fn record_has_checkpoint_gap_inside_early_window() {
        let sailing = sample_sailing("F1", Region::Arctic, date(2025, 11, 1), 100);
        let mut bookings = bookings_at(&sailing, 140, 30);
        bookings.extend(bookings_at(&sailing, 70, 30));
        let ledger = crate::ledger::BookingLedger::new(vec![sailing.clone()], bookings);
        let as_of = date(2025, 9, 1);
        let curve = build_curve_as_of(&ledger, &sailing, as_of);

        let record = pace_record(&sailing, &curve, &benchmark(), as_of, 120);
        assert_eq!(record.days_before_departure, 61);
        assert!((record.current_occupancy - 0.60).abs() < 1e-9);
        assert!((record.pace_gap - 0.10).abs() < 1e-9);
        assert_eq!(record.benchmark_source, BenchmarkSource::Regional);
        let checkpoint = record.checkpoint_pace_gap.unwrap();
        assert!((checkpoint - (0.30 - 0.50)).abs() < 1e-9);
    }

    #[test]
    fn record_far_from_departure_has_no_checkpoint_gap() {
        let sailing = sample_sailing("F2", Region::Arctic, date(2026, 3, 1), 100);
        let ledger = crate::ledger::BookingLedger::new(vec![sailing.clone()], Vec::new());
        let as_of = date(2025, 9, 1);
        let curve = build_curve_as_of(&ledger, &sailing, as_of);

        let record = pace_record(&sailing, &curve, &benchmark(), as_of, 120);
        assert_eq!(record.current_occupancy, 0.0);
        assert!(record.checkpoint_pace_gap.is_none());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let sailing = sample_sailing("F1", Region::Arctic, date(2026, 1, 1), 100);
        let curve = BookingCurve::from_events(sailing.departure_date, &bookings_at(&sailing, 130, 35));
        let bench = benchmark();
        assert_eq!(
            evaluate_pace(&sailing, &curve, &bench, 90),
            evaluate_pace(&sailing, &curve, &bench, 90)
        );
    }
}
