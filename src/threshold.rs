//! Health thresholds evaluated against client stats

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::client::Stats;

/// A single rule violation found in a stats snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdViolation {
    #[error("{metric} = {value} is below minimum {min}")]
    BelowMinimum { metric: String, value: f64, min: f64 },

    #[error("{metric} = {value} is above maximum {max}")]
    AboveMaximum { metric: String, value: f64, max: f64 },

    #[error("{metric} missing from stats")]
    MissingMetric { metric: String },

    #[error("{0}")]
    Custom(String),
}

/// Predicate over a stats snapshot
///
/// An empty result means the snapshot passes.
pub trait Threshold: Send + Sync + fmt::Debug {
    fn check(&self, stats: &Stats) -> Vec<ThresholdViolation>;
}

/// Inclusive bounds on one named metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeThreshold {
    pub metric: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl RangeThreshold {
    pub fn new(metric: &str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            metric: metric.to_string(),
            min,
            max,
        }
    }

    pub fn at_least(metric: &str, min: f64) -> Self {
        Self::new(metric, Some(min), None)
    }

    pub fn at_most(metric: &str, max: f64) -> Self {
        Self::new(metric, None, Some(max))
    }
}

impl Threshold for RangeThreshold {
    fn check(&self, stats: &Stats) -> Vec<ThresholdViolation> {
        let Some(value) = stats.get(&self.metric) else {
            return vec![ThresholdViolation::MissingMetric {
                metric: self.metric.clone(),
            }];
        };

        let mut violations = Vec::new();
        // NaN fails both bounds
        if let Some(min) = self.min {
            if !(value >= min) {
                violations.push(ThresholdViolation::BelowMinimum {
                    metric: self.metric.clone(),
                    value,
                    min,
                });
            }
        }
        if let Some(max) = self.max {
            if !(value <= max) {
                violations.push(ThresholdViolation::AboveMaximum {
                    metric: self.metric.clone(),
                    value,
                    max,
                });
            }
        }
        violations
    }
}

/// Run every threshold against the snapshot and collect all violations in order
pub fn evaluate_all<T>(thresholds: &[T], stats: &Stats) -> Vec<ThresholdViolation>
where
    T: AsRef<dyn Threshold>,
{
    thresholds
        .iter()
        .flat_map(|t| t.as_ref().check(stats))
        .collect()
}
