//! Run settings.
//!
//! Loaded from an optional `revenue-studio.yaml`, an explicit file, then
//! `REVENUE_STUDIO__*` environment variables (later sources win).

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "revenue-studio.yaml";
pub const CONFIG_ENV_PREFIX: &str = "REVENUE_STUDIO";
pub const LOG_ENV_VAR: &str = "REVENUE_STUDIO_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Mean,
    Median,
}

impl Aggregate {
    /// `None` for an empty sample.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Aggregate::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Aggregate::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Projections strictly below this are AT_RISK.
    pub at_risk_below: f64,
    /// Projections strictly above this are OVERPERFORMING.
    pub overperforming_above: f64,
    pub price_misaligned_below: f64,
    pub premium_position_above: f64,
    pub weak_pace_gap: f64,
    pub early_window_days: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            at_risk_below: 0.85,
            overperforming_above: 0.95,
            price_misaligned_below: 0.95,
            premium_position_above: 1.05,
            weak_pace_gap: -0.10,
            early_window_days: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub min_completed_sailings: usize,
    pub benchmark_aggregate: Aggregate,
    pub ratio_aggregate: Aggregate,
    pub cross_region_fallback: bool,
    pub target_occupancy: f64,
    pub price_uplift_rate: f64,
    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_completed_sailings: 3,
            benchmark_aggregate: Aggregate::Mean,
            ratio_aggregate: Aggregate::Median,
            cross_region_fallback: true,
            target_occupancy: 0.90,
            price_uplift_rate: 0.05,
            thresholds: Thresholds::default(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read settings")?
            .try_deserialize()
            .context("invalid settings")?;

        Ok(settings)
    }

    /// At least one completed sailing is always required.
    pub fn required_history(&self) -> usize {
        self.min_completed_sailings.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classification_table() {
        let settings = Settings::default();
        assert_eq!(settings.min_completed_sailings, 3);
        assert_eq!(settings.thresholds.at_risk_below, 0.85);
        assert_eq!(settings.thresholds.overperforming_above, 0.95);
        assert_eq!(settings.thresholds.early_window_days, 120);
        assert_eq!(settings.ratio_aggregate, Aggregate::Median);
    }

    #[test]
    fn median_handles_even_and_odd_samples() {
        assert_eq!(Aggregate::Median.apply(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(Aggregate::Median.apply(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(Aggregate::Median.apply(&[]), None);
    }

    #[test]
    fn mean_is_arithmetic() {
        let mean = Aggregate::Mean.apply(&[1.0, 2.0, 6.0]).unwrap();
        assert!((mean - 3.0).abs() < 1e-9);
    }

    #[test]
    fn loads_overrides_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "min_completed_sailings: 5\nbenchmark_aggregate: median\nthresholds:\n  weak_pace_gap: -0.2\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.min_completed_sailings, 5);
        assert_eq!(settings.benchmark_aggregate, Aggregate::Median);
        assert!((settings.thresholds.weak_pace_gap + 0.2).abs() < 1e-9);
        assert_eq!(settings.thresholds.early_window_days, 120);
    }

    #[test]
    fn zero_minimum_still_requires_one_sailing() {
        let settings = Settings {
            min_completed_sailings: 0,
            ..Settings::default()
        };
        assert_eq!(settings.required_history(), 1);
    }
}
