//! Cumulative booking curves over the days-before-departure axis.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{PipelineError, PipelineResult};
use crate::ledger::BookingLedger;
use crate::models::{BookingEvent, Sailing};

/// Step function from days-before-departure to cumulative cabins sold.
///
/// Points are kept in descending offset order (earliest bookings first), so
/// cumulative values are non-decreasing along the vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingCurve {
    points: Vec<(u32, u32)>,
}

impl BookingCurve {
    pub fn from_events<'a>(
        departure_date: NaiveDate,
        events: impl IntoIterator<Item = &'a BookingEvent>,
    ) -> Self {
        // Totals saturate so an absurd group row still trips the capacity check.
        let mut by_offset: BTreeMap<u32, u32> = BTreeMap::new();
        for event in events {
            let cabins = by_offset
                .entry(event.days_before_departure(departure_date))
                .or_insert(0);
            *cabins = cabins.saturating_add(event.cabins);
        }

        let mut running = 0u32;
        let points = by_offset
            .into_iter()
            .rev()
            .map(|(offset, cabins)| {
                running = running.saturating_add(cabins);
                (offset, running)
            })
            .collect();

        Self { points }
    }

    pub fn points(&self) -> &[(u32, u32)] {
        &self.points
    }

    /// Cabins sold by departure (offset 0).
    pub fn final_cabins(&self) -> u32 {
        self.points.last().map(|&(_, cabins)| cabins).unwrap_or(0)
    }

    /// Cumulative cabins at `days_before_departure`, carried forward from the
    /// nearest observed offset at or above it.
    pub fn cabins_at(&self, days_before_departure: u32) -> PipelineResult<u32> {
        // Offsets descend, so the carried value is the last point still >= the query.
        let idx = self
            .points
            .partition_point(|&(offset, _)| offset >= days_before_departure);
        if idx == 0 {
            return Err(PipelineError::UndefinedCurveLookup {
                days_before_departure,
            });
        }
        Ok(self.points[idx - 1].1)
    }

    /// Cumulative cabins, treating "no booking yet" as a real zero.
    pub fn cabins_or_zero(&self, days_before_departure: u32) -> u32 {
        self.cabins_at(days_before_departure).unwrap_or(0)
    }

    pub fn fraction_at(&self, days_before_departure: u32, capacity: u32) -> f64 {
        self.cabins_or_zero(days_before_departure) as f64 / capacity as f64
    }

    pub fn final_fraction(&self, capacity: u32) -> f64 {
        self.final_cabins() as f64 / capacity as f64
    }

    /// Fails when more cabins are booked than the sailing holds.
    pub fn check_capacity(&self, sailing: &Sailing) -> PipelineResult<()> {
        let booked = self.final_cabins();
        if booked > sailing.capacity {
            return Err(PipelineError::InconsistentCapacity {
                sailing_id: sailing.sailing_id.clone(),
                booked,
                capacity: sailing.capacity,
            });
        }
        Ok(())
    }
}

/// Curve for a sailing over the bookings known on `as_of`.
pub fn build_curve(
    ledger: &BookingLedger,
    sailing_id: &str,
    as_of: NaiveDate,
) -> PipelineResult<BookingCurve> {
    let sailing = ledger.sailing(sailing_id)?;
    Ok(build_curve_as_of(ledger, sailing, as_of))
}

/// Curve over bookings recorded on or before `as_of`.
pub fn build_curve_as_of(ledger: &BookingLedger, sailing: &Sailing, as_of: NaiveDate) -> BookingCurve {
    BookingCurve::from_events(
        sailing.departure_date,
        ledger.bookings_as_of(&sailing.sailing_id, as_of),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::*;
    use crate::models::Region;

    fn long_after() -> NaiveDate {
        date(2030, 1, 1)
    }

    fn fixture() -> (BookingLedger, Sailing) {
        let sailing = sample_sailing("S1", Region::Antarctica, date(2025, 12, 1), 100);
        let mut bookings = bookings_at(&sailing, 200, 10);
        bookings.extend(bookings_at(&sailing, 120, 5));
        bookings.extend(bookings_at(&sailing, 30, 3));
        bookings.extend(bookings_at(&sailing, 0, 2));
        (BookingLedger::new(vec![sailing.clone()], bookings), sailing)
    }

    #[test]
    fn curve_is_cumulative_and_ends_at_total() {
        let (ledger, _) = fixture();
        let curve = build_curve(&ledger, "S1", long_after()).unwrap();

        assert_eq!(curve.points(), &[(200, 10), (120, 15), (30, 18), (0, 20)]);
        assert_eq!(curve.cabins_at(0).unwrap(), 20);
        assert_eq!(curve.final_cabins(), ledger.bookings("S1").len() as u32);
        assert!(curve.points().windows(2).all(|w| w[0].0 > w[1].0 && w[0].1 <= w[1].1));
    }

    #[test]
    fn lookup_carries_forward_from_larger_offset() {
        let (ledger, _) = fixture();
        let curve = build_curve(&ledger, "S1", long_after()).unwrap();

        assert_eq!(curve.cabins_at(150).unwrap(), 10);
        assert_eq!(curve.cabins_at(120).unwrap(), 15);
        assert_eq!(curve.cabins_at(1).unwrap(), 18);
    }

    #[test]
    fn lookup_before_first_booking_is_undefined() {
        let (ledger, _) = fixture();
        let curve = build_curve(&ledger, "S1", long_after()).unwrap();

        assert_eq!(
            curve.cabins_at(250),
            Err(PipelineError::UndefinedCurveLookup {
                days_before_departure: 250
            })
        );
        assert_eq!(curve.cabins_or_zero(250), 0);
    }

    #[test]
    fn zero_booking_sailing_has_zero_curve() {
        let sailing = sample_sailing("S2", Region::Arctic, date(2025, 8, 1), 70);
        let ledger = BookingLedger::new(vec![sailing], Vec::new());
        let curve = build_curve(&ledger, "S2", long_after()).unwrap();

        assert!(curve.points().is_empty());
        assert_eq!(curve.final_cabins(), 0);
        assert_eq!(curve.fraction_at(0, 70), 0.0);
    }

    #[test]
    fn as_of_curve_ignores_later_bookings() {
        let (ledger, sailing) = fixture();
        let as_of = sailing.departure_date - chrono::Duration::days(100);
        let curve = build_curve_as_of(&ledger, &sailing, as_of);

        assert_eq!(curve.final_cabins(), 15);
        assert!((curve.fraction_at(100, sailing.capacity) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn overbooked_sailing_fails_capacity_check() {
        let sailing = sample_sailing("S3", Region::Alaska, date(2025, 7, 1), 2);
        let bookings = bookings_at(&sailing, 10, 3);
        let ledger = BookingLedger::new(vec![sailing.clone()], bookings);
        let curve = build_curve(&ledger, "S3", long_after()).unwrap();

        assert_eq!(
            curve.check_capacity(&sailing),
            Err(PipelineError::InconsistentCapacity {
                sailing_id: "S3".to_string(),
                booked: 3,
                capacity: 2,
            })
        );
    }

    #[test]
    fn oversized_group_booking_fails_capacity_check() {
        let sailing = sample_sailing("S4", Region::Arctic, date(2025, 7, 1), 100);
        let csv = "sailing_id,booking_date,cabins,realized_fare\n\
                   S4,2025-03-01,4294967295,7000\n\
                   S4,2025-04-01,2,7000\n";
        let bookings = crate::ledger::read_bookings(csv.as_bytes()).unwrap();
        let ledger = BookingLedger::new(vec![sailing.clone()], bookings);
        let curve = build_curve(&ledger, "S4", long_after()).unwrap();

        assert_eq!(curve.final_cabins(), u32::MAX);
        assert!(matches!(
            curve.check_capacity(&sailing),
            Err(PipelineError::InconsistentCapacity { booked: u32::MAX, capacity: 100, .. })
        ));
        assert!(ledger.average_fare(&sailing, long_after()).is_finite());
    }
}
