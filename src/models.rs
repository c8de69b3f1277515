use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Antarctica,
    #[serde(rename = "Galápagos", alias = "Galapagos")]
    Galapagos,
    Arctic,
    Alaska,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::Antarctica,
        Region::Galapagos,
        Region::Arctic,
        Region::Alaska,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Antarctica => "Antarctica",
            Region::Galapagos => "Galápagos",
            Region::Arctic => "Arctic",
            Region::Alaska => "Alaska",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "antarctica" => Ok(Region::Antarctica),
            "galápagos" | "galapagos" => Ok(Region::Galapagos),
            "arctic" => Ok(Region::Arctic),
            "alaska" => Ok(Region::Alaska),
            other => Err(format!("unknown region '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sailing {
    pub sailing_id: String,
    pub region: Region,
    pub departure_date: NaiveDate,
    pub capacity: u32,
    pub list_price: f64,
    /// Competitor price index; 1.0 is parity, below 1.0 means competitors are cheaper.
    pub competitor_price_index: Option<f64>,
}

impl Sailing {
    /// Departed strictly before the evaluation date.
    pub fn is_completed(&self, as_of: NaiveDate) -> bool {
        self.departure_date < as_of
    }

    pub fn days_before_departure(&self, on: NaiveDate) -> i64 {
        (self.departure_date - on).num_days()
    }
}

#[derive(Debug, Clone)]
pub struct BookingEvent {
    pub sailing_id: String,
    pub booking_date: NaiveDate,
    pub cabins: u32,
    pub realized_fare: f64,
    pub competitor_price_index: Option<f64>,
}

impl BookingEvent {
    /// Derived from the two dates on every call. Adjustments recorded after
    /// departure fold into offset 0.
    pub fn days_before_departure(&self, departure_date: NaiveDate) -> u32 {
        (departure_date - self.booking_date).num_days().max(0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkSource {
    Regional,
    CrossRegion,
}

impl BenchmarkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkSource::Regional => "regional",
            BenchmarkSource::CrossRegion => "cross_region",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaceRecord {
    pub sailing_id: String,
    pub region: Region,
    pub evaluation_date: NaiveDate,
    pub days_before_departure: u32,
    pub current_occupancy: f64,
    pub benchmark_occupancy: f64,
    pub pace_gap: f64,
    pub benchmark_source: BenchmarkSource,
    /// Gap at the early-window checkpoint, once the sailing has reached it.
    pub checkpoint_pace_gap: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRecord {
    pub sailing_id: String,
    pub region: Region,
    pub departure_date: NaiveDate,
    pub evaluation_date: NaiveDate,
    pub days_before_departure: u32,
    pub capacity: u32,
    pub current_cabins_sold: u32,
    pub current_occupancy: f64,
    pub completion_ratio: f64,
    pub ratio_sample_size: usize,
    pub projected_occupancy: f64,
    pub projected_cabins: f64,
    pub average_fare: f64,
    pub projected_revenue: f64,
    pub target_occupancy: f64,
    pub projected_vs_target: f64,
    pub competitor_price_index: f64,
    pub pace_gap: Option<f64>,
    pub checkpoint_pace_gap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    AtRisk,
    OnTrack,
    Overperforming,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AtRisk => "AT_RISK",
            Category::OnTrack => "ON_TRACK",
            Category::Overperforming => "OVERPERFORMING",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    WeakEarlyPace,
    PriceMisaligned,
    RegionalCluster,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::WeakEarlyPace => "WEAK_EARLY_PACE",
            Flag::PriceMisaligned => "PRICE_MISALIGNED",
            Flag::RegionalCluster => "REGIONAL_CLUSTER",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    RepriceToParity,
    MarketReview,
    StimulationPromotion,
    DemandGeneration,
    MonitorCompetitors,
    MonitorPace,
    RaisePrice,
}

impl ActionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::RepriceToParity => "reprice_to_parity",
            ActionClass::MarketReview => "market_review",
            ActionClass::StimulationPromotion => "stimulation_promotion",
            ActionClass::DemandGeneration => "demand_generation",
            ActionClass::MonitorCompetitors => "monitor_competitors",
            ActionClass::MonitorPace => "monitor_pace",
            ActionClass::RaisePrice => "raise_price",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub sailing_id: String,
    pub region: Region,
    pub category: Category,
    pub flags: std::collections::BTreeSet<Flag>,
    pub action: ActionClass,
    pub recommendation: String,
}

impl ClassificationRecord {
    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Per-sailing result of a run. A failed forecast is carried as a reason
/// instead of a projection.
#[derive(Debug, Clone)]
pub enum ForecastOutcome {
    Available(ForecastRecord),
    Unavailable {
        sailing_id: String,
        region: Region,
        reason: String,
    },
}

impl ForecastOutcome {
    pub fn sailing_id(&self) -> &str {
        match self {
            ForecastOutcome::Available(record) => &record.sailing_id,
            ForecastOutcome::Unavailable { sailing_id, .. } => sailing_id,
        }
    }
}
