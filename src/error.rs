//! Pipeline error kinds.
//!
//! Every variant is scoped to a single sailing or region; none of them abort a run.

use thiserror::Error;

use crate::models::Region;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("insufficient history for {region}: {found} completed sailings, {required} required")]
    InsufficientHistory {
        region: String,
        found: usize,
        required: usize,
    },

    #[error("no completion ratio for {region} at {days_before_departure} days before departure: none of {comparable} completed sailings had bookings by then")]
    NoDefinedRatio {
        region: String,
        days_before_departure: u32,
        comparable: usize,
    },

    #[error("no booking observed at or before {days_before_departure} days before departure")]
    UndefinedCurveLookup { days_before_departure: u32 },

    #[error("sailing {sailing_id} has {booked} cabins booked against capacity {capacity}")]
    InconsistentCapacity {
        sailing_id: String,
        booked: u32,
        capacity: u32,
    },

    #[error("unknown sailing: {0}")]
    UnknownSailing(String),
}

impl PipelineError {
    pub fn insufficient(region: Region, found: usize, required: usize) -> Self {
        PipelineError::InsufficientHistory {
            region: region.to_string(),
            found,
            required,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
