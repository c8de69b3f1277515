//! Booking ledger and input table loading.
//!
//! Expected CSV columns:
//!   sailings: sailing_id, region, departure_date, capacity, list_price, competitor_price_index
//!   bookings: sailing_id, booking_date, cabins, realized_fare, competitor_price_index
//! The data generator's column names are accepted as aliases.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{BookingEvent, Region, Sailing};

#[derive(Debug, Deserialize)]
struct SailingRow {
    sailing_id: String,
    #[serde(alias = "itinerary_region")]
    region: Region,
    departure_date: NaiveDate,
    #[serde(alias = "capacity_cabins")]
    capacity: u32,
    #[serde(alias = "base_fare_per_person")]
    list_price: f64,
    #[serde(default)]
    competitor_price_index: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BookingRow {
    sailing_id: String,
    booking_date: NaiveDate,
    #[serde(default = "default_cabins")]
    cabins: u32,
    #[serde(alias = "fare_paid_per_person")]
    realized_fare: f64,
    #[serde(default)]
    competitor_price_index: Option<f64>,
}

fn default_cabins() -> u32 {
    1
}

pub fn read_sailings<R: Read>(reader: R) -> anyhow::Result<Vec<Sailing>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut sailings = Vec::new();
    for (line_num, result) in csv_reader.deserialize::<SailingRow>().enumerate() {
        let row = result.with_context(|| format!("sailings: parse error at line {}", line_num + 2))?;
        if row.capacity == 0 {
            warn!(sailing_id = %row.sailing_id, "skipping sailing with zero capacity");
            continue;
        }
        sailings.push(Sailing {
            sailing_id: row.sailing_id,
            region: row.region,
            departure_date: row.departure_date,
            capacity: row.capacity,
            list_price: row.list_price,
            competitor_price_index: row.competitor_price_index,
        });
    }
    Ok(sailings)
}

pub fn read_bookings<R: Read>(reader: R) -> anyhow::Result<Vec<BookingEvent>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bookings = Vec::new();
    for (line_num, result) in csv_reader.deserialize::<BookingRow>().enumerate() {
        let row = result.with_context(|| format!("bookings: parse error at line {}", line_num + 2))?;
        bookings.push(BookingEvent {
            sailing_id: row.sailing_id,
            booking_date: row.booking_date,
            cabins: row.cabins,
            realized_fare: row.realized_fare,
            competitor_price_index: row.competitor_price_index,
        });
    }
    Ok(bookings)
}

/// Immutable view over sailings and their booking events.
#[derive(Debug, Clone)]
pub struct BookingLedger {
    sailings: BTreeMap<String, Sailing>,
    events: HashMap<String, Vec<BookingEvent>>,
}

impl BookingLedger {
    pub fn new(sailings: Vec<Sailing>, bookings: Vec<BookingEvent>) -> Self {
        let sailings: BTreeMap<String, Sailing> = sailings
            .into_iter()
            .map(|sailing| (sailing.sailing_id.clone(), sailing))
            .collect();

        let mut events: HashMap<String, Vec<BookingEvent>> = HashMap::new();
        let mut orphans = 0usize;
        for booking in bookings {
            if !sailings.contains_key(&booking.sailing_id) {
                orphans += 1;
                continue;
            }
            events.entry(booking.sailing_id.clone()).or_default().push(booking);
        }
        if orphans > 0 {
            warn!(orphans, "ignored bookings referencing unknown sailings");
        }

        Self { sailings, events }
    }

    pub fn load(sailings_path: &Path, bookings_path: &Path) -> anyhow::Result<Self> {
        let sailings_file = std::fs::File::open(sailings_path)
            .with_context(|| format!("failed to open {}", sailings_path.display()))?;
        let bookings_file = std::fs::File::open(bookings_path)
            .with_context(|| format!("failed to open {}", bookings_path.display()))?;
        Ok(Self::new(
            read_sailings(sailings_file)?,
            read_bookings(bookings_file)?,
        ))
    }

    /// Sailings ordered by id.
    pub fn sailings(&self) -> impl Iterator<Item = &Sailing> {
        self.sailings.values()
    }

    pub fn sailing(&self, sailing_id: &str) -> PipelineResult<&Sailing> {
        self.sailings
            .get(sailing_id)
            .ok_or_else(|| PipelineError::UnknownSailing(sailing_id.to_string()))
    }

    pub fn bookings(&self, sailing_id: &str) -> &[BookingEvent] {
        self.events.get(sailing_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Events recorded on or before `as_of`.
    pub fn bookings_as_of(
        &self,
        sailing_id: &str,
        as_of: NaiveDate,
    ) -> impl Iterator<Item = &BookingEvent> {
        self.bookings(sailing_id)
            .iter()
            .filter(move |b| b.booking_date <= as_of)
    }

    /// Mean realized fare per cabin over bookings to date, falling back to list price.
    pub fn average_fare(&self, sailing: &Sailing, as_of: NaiveDate) -> f64 {
        let (revenue, cabins) = self
            .bookings_as_of(&sailing.sailing_id, as_of)
            .fold((0.0, 0u64), |(revenue, cabins), b| {
                (revenue + b.realized_fare * b.cabins as f64, cabins + u64::from(b.cabins))
            });
        if cabins == 0 {
            sailing.list_price
        } else {
            revenue / cabins as f64
        }
    }

    /// The sailing's own index, else the mean over its bookings to date, else parity.
    pub fn competitor_price_index(&self, sailing: &Sailing, as_of: NaiveDate) -> f64 {
        if let Some(index) = sailing.competitor_price_index {
            return index;
        }
        let observed: Vec<f64> = self
            .bookings_as_of(&sailing.sailing_id, as_of)
            .filter_map(|b| b.competitor_price_index)
            .collect();
        if observed.is_empty() {
            1.0
        } else {
            observed.iter().sum::<f64>() / observed.len() as f64
        }
    }
}
