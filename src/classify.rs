//! Sailing classification and recommendations.
//!
//! Category depends on projected occupancy alone. Flags add context from
//! pace and price; REGIONAL_CLUSTER needs every sailing in the region to be
//! classified first, so classification runs as two passes.

use std::collections::{BTreeSet, HashMap};

use crate::config::Thresholds;
use crate::models::{ActionClass, Category, ClassificationRecord, Flag, ForecastRecord, Region};

/// Both band edges belong to ON_TRACK.
pub fn category_for(projected_occupancy: f64, thresholds: &Thresholds) -> Category {
    if projected_occupancy < thresholds.at_risk_below {
        Category::AtRisk
    } else if projected_occupancy > thresholds.overperforming_above {
        Category::Overperforming
    } else {
        Category::OnTrack
    }
}

pub fn individual_flags(record: &ForecastRecord, thresholds: &Thresholds) -> BTreeSet<Flag> {
    let mut flags = BTreeSet::new();
    if record
        .checkpoint_pace_gap
        .is_some_and(|gap| gap < thresholds.weak_pace_gap)
    {
        flags.insert(Flag::WeakEarlyPace);
    }
    if record.competitor_price_index < thresholds.price_misaligned_below {
        flags.insert(Flag::PriceMisaligned);
    }
    flags
}

pub fn action_for(category: Category, flags: &BTreeSet<Flag>) -> ActionClass {
    match category {
        Category::Overperforming => ActionClass::RaisePrice,
        Category::OnTrack if flags.contains(&Flag::PriceMisaligned) => {
            ActionClass::MonitorCompetitors
        }
        Category::OnTrack => ActionClass::MonitorPace,
        Category::AtRisk if flags.contains(&Flag::PriceMisaligned) => ActionClass::RepriceToParity,
        Category::AtRisk if flags.contains(&Flag::RegionalCluster) => ActionClass::MarketReview,
        Category::AtRisk if flags.contains(&Flag::WeakEarlyPace) => {
            ActionClass::StimulationPromotion
        }
        Category::AtRisk => ActionClass::DemandGeneration,
    }
}

/// Action headline followed by escalation steps for the time left to sell.
pub fn recommendation(action: ActionClass, record: &ForecastRecord, thresholds: &Thresholds) -> String {
    let days = record.days_before_departure;
    let mut actions: Vec<String> = Vec::new();

    match action {
        ActionClass::RaisePrice => {
            if record.competitor_price_index > thresholds.premium_position_above {
                actions.push("Raise price 8-12% on remaining inventory".to_string());
                actions.push("Close lowest promotional categories".to_string());
            } else {
                actions.push("Raise price 3-5% and close low-value promotional rates".to_string());
            }
            if days > 90 {
                actions.push("Explore charter and group business at premium rates".to_string());
            }
            if record.projected_occupancy >= 1.0 {
                actions.push("Activate premium tier for final cabins and open a waitlist".to_string());
            }
        }
        ActionClass::MonitorPace | ActionClass::MonitorCompetitors => {
            actions.push("Monitor pace weekly against forecast".to_string());
            if days > 120 {
                actions.push("Hold pricing and focus on early-booker campaigns".to_string());
            } else if days > 60 {
                actions.push("Prepare shoulder-season offers for targeted cabin categories".to_string());
            } else {
                actions.push("Run last-chance messaging for remaining cabins".to_string());
            }
            if action == ActionClass::MonitorCompetitors {
                actions.push("Competitors priced lower: watch for pace impact".to_string());
            }
        }
        ActionClass::RepriceToParity
        | ActionClass::MarketReview
        | ActionClass::StimulationPromotion
        | ActionClass::DemandGeneration => {
            match action {
                ActionClass::RepriceToParity => {
                    let gap = (1.0 - record.competitor_price_index) * 100.0;
                    actions.push(format!(
                        "Reprice to competitive parity: competitors {gap:.0}% cheaper"
                    ));
                    actions.push("Audit competitive set pricing weekly".to_string());
                }
                ActionClass::MarketReview => {
                    actions.push(format!(
                        "Review {} market demand: weak pace is shared across the region",
                        record.region
                    ));
                }
                ActionClass::StimulationPromotion => {
                    actions.push("Launch targeted stimulation promotion".to_string());
                }
                _ => {
                    actions.push("Increase marketing spend with digital and email remarketing".to_string());
                    actions.push("Activate past guest outreach with a limited-time incentive".to_string());
                }
            }
            if days < 90 {
                actions.push("Engage travel agent partners with override commission".to_string());
            }
            if days < 60 {
                actions.push("Offer bundled value-adds instead of straight discounts".to_string());
            }
            if record.current_occupancy < 0.5 && days < 120 {
                actions.push("CRITICAL: evaluate sailing viability against consolidation".to_string());
            }
        }
    }

    actions.join(" | ")
}

fn render(record: &ForecastRecord, category: Category, flags: BTreeSet<Flag>, thresholds: &Thresholds) -> ClassificationRecord {
    let action = action_for(category, &flags);
    ClassificationRecord {
        sailing_id: record.sailing_id.clone(),
        region: record.region,
        category,
        recommendation: recommendation(action, record, thresholds),
        action,
        flags,
    }
}

/// Classify a single forecast without portfolio context.
pub fn classify(record: &ForecastRecord, thresholds: &Thresholds) -> ClassificationRecord {
    render(
        record,
        category_for(record.projected_occupancy, thresholds),
        individual_flags(record, thresholds),
        thresholds,
    )
}

/// Sets REGIONAL_CLUSTER on a sailing when at least half of the other AT_RISK
/// sailings in its region carry WEAK_EARLY_PACE.
pub fn regional_clusters(records: &[ClassificationRecord]) -> Vec<bool> {
    let mut by_region: HashMap<Region, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        by_region.entry(record.region).or_default().push(idx);
    }

    records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let others: Vec<&ClassificationRecord> = by_region[&record.region]
                .iter()
                .filter(|&&other| other != idx)
                .map(|&other| &records[other])
                .filter(|other| other.category == Category::AtRisk)
                .collect();
            let weak = others.iter().filter(|o| o.has(Flag::WeakEarlyPace)).count();
            !others.is_empty() && weak * 2 >= others.len()
        })
        .collect()
}

/// Classify every forecast, then apply the region-wide cluster pass.
pub fn classify_portfolio(forecasts: &[ForecastRecord], thresholds: &Thresholds) -> Vec<ClassificationRecord> {
    let individual: Vec<ClassificationRecord> =
        forecasts.iter().map(|f| classify(f, thresholds)).collect();
    let clusters = regional_clusters(&individual);

    forecasts
        .iter()
        .zip(individual)
        .zip(clusters)
        .map(|((forecast, record), clustered)| {
            if !clustered {
                return record;
            }
            let mut flags = record.flags;
            flags.insert(Flag::RegionalCluster);
            render(forecast, record.category, flags, thresholds)
        })
        .collect()
}
