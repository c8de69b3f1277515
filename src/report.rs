use std::collections::BTreeMap;
use std::fmt::Write;

use crate::config::Settings;
use crate::models::{Category, ClassificationRecord, ForecastOutcome, ForecastRecord, Region};
use crate::pipeline::RunOutput;
use crate::sink::flag_list;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevenueImpact {
    pub at_risk_gap: f64,
    pub at_risk_sailings: usize,
    pub pricing_opportunity: f64,
    pub overperforming_sailings: usize,
}

/// Revenue left on the table by AT_RISK sailings missing target, and the
/// uplift available on OVERPERFORMING sailings' unsold cabins.
pub fn revenue_impact(output: &RunOutput, settings: &Settings) -> RevenueImpact {
    let forecasts: BTreeMap<&str, &ForecastRecord> = output
        .available_forecasts()
        .map(|f| (f.sailing_id.as_str(), f))
        .collect();

    let mut impact = RevenueImpact::default();
    for record in &output.classifications {
        let Some(forecast) = forecasts.get(record.sailing_id.as_str()) else {
            continue;
        };
        let capacity = forecast.capacity as f64;
        match record.category {
            Category::AtRisk => {
                let gap = (forecast.target_occupancy - forecast.projected_occupancy).max(0.0);
                impact.at_risk_gap += gap * capacity * forecast.average_fare;
                impact.at_risk_sailings += 1;
            }
            Category::Overperforming => {
                let remaining = (1.0 - forecast.current_occupancy).max(0.0) * capacity;
                impact.pricing_opportunity +=
                    remaining * forecast.average_fare * settings.price_uplift_rate;
                impact.overperforming_sailings += 1;
            }
            Category::OnTrack => {}
        }
    }
    impact
}

/// Sailing counts per region and category.
pub fn category_by_region(records: &[ClassificationRecord]) -> BTreeMap<Region, [usize; 3]> {
    let mut table: BTreeMap<Region, [usize; 3]> = BTreeMap::new();
    for record in records {
        let counts = table.entry(record.region).or_insert([0; 3]);
        let slot = match record.category {
            Category::AtRisk => 0,
            Category::OnTrack => 1,
            Category::Overperforming => 2,
        };
        counts[slot] += 1;
    }
    table
}

fn write_sailings(
    output: &mut String,
    forecasts: &BTreeMap<&str, &ForecastRecord>,
    records: &[&ClassificationRecord],
) {
    for record in records {
        let Some(forecast) = forecasts.get(record.sailing_id.as_str()) else {
            continue;
        };
        let flags = flag_list(record);
        let _ = writeln!(
            output,
            "- {} ({}, departs in {} days): current {:.1}%, projected {:.1}%{}",
            record.sailing_id,
            record.region,
            forecast.days_before_departure,
            forecast.current_occupancy * 100.0,
            forecast.projected_occupancy * 100.0,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{flags}]")
            }
        );
        let _ = writeln!(output, "  - {}", record.recommendation);
    }
}

pub fn build_report(output: &RunOutput, settings: &Settings) -> String {
    let forecasts: BTreeMap<&str, &ForecastRecord> = output
        .available_forecasts()
        .map(|f| (f.sailing_id.as_str(), f))
        .collect();

    let mut report = String::new();
    let _ = writeln!(report, "# Sailing Revenue Outlook");
    let _ = writeln!(
        report,
        "Evaluated as of {} (run {})",
        output.evaluation_date, output.run_id
    );
    let _ = writeln!(
        report,
        "{} in-flight sailings, {} forecast, {} unavailable",
        output.forecasts.len(),
        forecasts.len(),
        output.unavailable_count()
    );

    let _ = writeln!(report);
    let _ = writeln!(report, "## Status by Region");
    let table = category_by_region(&output.classifications);
    if table.is_empty() {
        let _ = writeln!(report, "No sailings could be classified.");
    } else {
        let _ = writeln!(report, "| Region | At risk | On track | Overperforming |");
        let _ = writeln!(report, "|---|---|---|---|");
        for (region, counts) in &table {
            let _ = writeln!(
                report,
                "| {} | {} | {} | {} |",
                region, counts[0], counts[1], counts[2]
            );
        }
    }

    let mut at_risk: Vec<&ClassificationRecord> = output
        .classifications
        .iter()
        .filter(|c| c.category == Category::AtRisk)
        .collect();
    at_risk.sort_by(|a, b| {
        let pa = forecasts.get(a.sailing_id.as_str()).map_or(0.0, |f| f.projected_occupancy);
        let pb = forecasts.get(b.sailing_id.as_str()).map_or(0.0, |f| f.projected_occupancy);
        pa.total_cmp(&pb)
    });
    let _ = writeln!(report);
    let _ = writeln!(report, "## At-Risk Sailings");
    if at_risk.is_empty() {
        let _ = writeln!(report, "No sailings are projected below the on-track band.");
    } else {
        write_sailings(&mut report, &forecasts, &at_risk);
    }

    let mut overperforming: Vec<&ClassificationRecord> = output
        .classifications
        .iter()
        .filter(|c| c.category == Category::Overperforming)
        .collect();
    overperforming.sort_by(|a, b| {
        let pa = forecasts.get(a.sailing_id.as_str()).map_or(0.0, |f| f.projected_occupancy);
        let pb = forecasts.get(b.sailing_id.as_str()).map_or(0.0, |f| f.projected_occupancy);
        pb.total_cmp(&pa)
    });
    let _ = writeln!(report);
    let _ = writeln!(report, "## Overperforming Sailings");
    if overperforming.is_empty() {
        let _ = writeln!(report, "No sailings are projected above the on-track band.");
    } else {
        write_sailings(&mut report, &forecasts, &overperforming);
    }

    let _ = writeln!(report);
    let _ = writeln!(report, "## Forecast Unavailable");
    let unavailable: Vec<_> = output
        .forecasts
        .iter()
        .filter_map(|outcome| match outcome {
            ForecastOutcome::Unavailable {
                sailing_id, reason, ..
            } => Some((sailing_id, reason)),
            ForecastOutcome::Available(_) => None,
        })
        .collect();
    if unavailable.is_empty() {
        let _ = writeln!(report, "Every in-flight sailing has a forecast.");
    } else {
        for (sailing_id, reason) in unavailable {
            let _ = writeln!(report, "- {sailing_id}: {reason}");
        }
    }

    let impact = revenue_impact(output, settings);
    let _ = writeln!(report);
    let _ = writeln!(report, "## Revenue Impact");
    let _ = writeln!(
        report,
        "- Revenue at risk: ${:.0} across {} sailings below {:.0}% target",
        impact.at_risk_gap,
        impact.at_risk_sailings,
        settings.target_occupancy * 100.0
    );
    let _ = writeln!(
        report,
        "- Pricing opportunity: ${:.0} across {} sailings at {:.0}% uplift",
        impact.pricing_opportunity,
        impact.overperforming_sailings,
        settings.price_uplift_rate * 100.0
    );

    report
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::classify::classify_portfolio;
    use crate::classify::tests::sample_forecast;
    use crate::ledger::fixtures::date;

    fn output_with(forecasts: Vec<ForecastRecord>) -> RunOutput {
        let settings = Settings::default();
        let classifications = classify_portfolio(&forecasts, &settings.thresholds);
        let mut outcomes: Vec<ForecastOutcome> =
            forecasts.into_iter().map(ForecastOutcome::Available).collect();
        outcomes.push(ForecastOutcome::Unavailable {
            sailing_id: "G9".to_string(),
            region: Region::Galapagos,
            reason: "insufficient history for Galápagos: 2 completed sailings, 3 required".to_string(),
        });
        RunOutput {
            run_id: Uuid::nil(),
            evaluation_date: date(2025, 9, 1),
            pace: Vec::new(),
            forecasts: outcomes,
            classifications,
        }
    }

    #[test]
    fn impact_sizes_gap_and_uplift() {
        let output = output_with(vec![sample_forecast("S1", 0.80), sample_forecast("S2", 0.97)]);
        let impact = revenue_impact(&output, &Settings::default());

        // (0.90 - 0.80) * 100 cabins * 7500
        assert!((impact.at_risk_gap - 75_000.0).abs() < 1e-6);
        // (1 - 0.60) * 100 cabins * 7500 * 5%
        assert!((impact.pricing_opportunity - 15_000.0).abs() < 1e-6);
        assert_eq!(impact.at_risk_sailings, 1);
        assert_eq!(impact.overperforming_sailings, 1);
    }

    #[test]
    fn cross_tab_counts_categories() {
        let output = output_with(vec![
            sample_forecast("S1", 0.80),
            sample_forecast("S2", 0.90),
            sample_forecast("S3", 0.97),
        ]);
        let table = category_by_region(&output.classifications);
        assert_eq!(table[&Region::Antarctica], [1, 1, 1]);
    }

    #[test]
    fn report_lists_sections() {
        let output = output_with(vec![sample_forecast("S1", 0.80), sample_forecast("S2", 0.97)]);
        let report = build_report(&output, &Settings::default());

        assert!(report.contains("# Sailing Revenue Outlook"));
        assert!(report.contains("| Antarctica | 1 | 0 | 1 |"));
        assert!(report.contains("- S1 (Antarctica, departs in 120 days): current 60.0%, projected 80.0%"));
        assert!(report.contains("- G9: insufficient history"));
        assert!(report.contains("Revenue at risk: $75000 across 1 sailings"));
    }
}
