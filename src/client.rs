//! Managed device capability interface
//!
//! A [`Client`] is one remotely controllable rig. The supervisor only ever
//! talks to devices through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ClientError;

/// Point-in-time health metrics reported by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Named numeric metrics (e.g. `hashrate_ghs`, `temperature_c`)
    pub values: BTreeMap<String, f64>,
    pub collected_at: DateTime<Utc>,
}

impl Stats {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self {
            values,
            collected_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    /// Builder-style metric insertion
    pub fn with(mut self, metric: &str, value: f64) -> Self {
        self.values.insert(metric.to_string(), value);
        self
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }
}

/// Remote device that can be health-checked and recovered
///
/// Calls may block for as long as the device takes to answer; the
/// supervisor does not wrap them in a timeout.
#[async_trait]
pub trait Client: Send + Sync {
    /// Identifier used in every notification about this client
    fn name(&self) -> &str;

    /// Fetch a fresh stats snapshot
    async fn stats(&self) -> Result<Stats, ClientError>;

    /// Soft reboot the device
    async fn reboot(&self) -> Result<(), ClientError>;

    /// Hard power-cycle the device
    async fn power_cycle(&self) -> Result<(), ClientError>;

    /// Whether this device has a controllable power source
    fn power_cycle_enabled(&self) -> bool;

    /// Whether the device is only observed (reported in logs only)
    fn read_only(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_builder() {
        let stats = Stats::empty().with("temperature_c", 71.5).with("fans", 4.0);
        assert_eq!(stats.get("temperature_c"), Some(71.5));
        assert_eq!(stats.get("fans"), Some(4.0));
        assert_eq!(stats.get("hashrate_ghs"), None);
    }
}
