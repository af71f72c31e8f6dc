//! Per-client escalation policy

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RigwatchError, Result};
use crate::threshold::Threshold;

/// Escalation policy for one client, immutable once the supervisor starts
#[derive(Clone)]
pub struct ClientMonitorConfig {
    /// Rules applied to every stats snapshot, in order
    pub thresholds: Vec<Arc<dyn Threshold>>,
    /// Failed checks tolerated before rebooting (strictly greater triggers)
    pub check_fails_before_reboot: u32,
    /// Failed reboots tolerated before power-cycling (strictly greater triggers)
    pub reboot_fails_before_power_cycle: u32,
    /// Minimum spacing between recovery actions
    pub reboot_interval: Duration,
    /// Health-check cadence
    pub stats_interval: Duration,
    /// State re-evaluation cadence
    pub state_interval: Duration,
}

impl ClientMonitorConfig {
    pub fn new(
        thresholds: Vec<Arc<dyn Threshold>>,
        check_fails_before_reboot: u32,
        reboot_fails_before_power_cycle: u32,
        reboot_interval: Duration,
        stats_interval: Duration,
        state_interval: Duration,
    ) -> Self {
        Self {
            thresholds,
            check_fails_before_reboot,
            reboot_fails_before_power_cycle,
            reboot_interval,
            stats_interval,
            state_interval,
        }
    }

    pub fn with_threshold(mut self, threshold: Arc<dyn Threshold>) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn with_check_fails_before_reboot(mut self, n: u32) -> Self {
        self.check_fails_before_reboot = n;
        self
    }

    pub fn with_reboot_fails_before_power_cycle(mut self, n: u32) -> Self {
        self.reboot_fails_before_power_cycle = n;
        self
    }

    pub fn with_reboot_interval(mut self, interval: Duration) -> Self {
        self.reboot_interval = interval;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn with_state_interval(mut self, interval: Duration) -> Self {
        self.state_interval = interval;
        self
    }

    /// Tick periods must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.stats_interval.is_zero() {
            return Err(RigwatchError::Validation(
                "stats_interval must be greater than zero".to_string(),
            ));
        }
        if self.state_interval.is_zero() {
            return Err(RigwatchError::Validation(
                "state_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientMonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: Vec::new(),
            check_fails_before_reboot: 3,
            reboot_fails_before_power_cycle: 2,
            reboot_interval: Duration::from_secs(600),
            stats_interval: Duration::from_secs(60),
            state_interval: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for ClientMonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientMonitorConfig")
            .field("thresholds", &self.thresholds)
            .field("check_fails_before_reboot", &self.check_fails_before_reboot)
            .field(
                "reboot_fails_before_power_cycle",
                &self.reboot_fails_before_power_cycle,
            )
            .field("reboot_interval", &self.reboot_interval)
            .field("stats_interval", &self.stats_interval)
            .field("state_interval", &self.state_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::RangeThreshold;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ClientMonitorConfig::default()
            .with_check_fails_before_reboot(5)
            .with_stats_interval(Duration::from_secs(10))
            .with_threshold(Arc::new(RangeThreshold::at_most("temperature_c", 85.0)));

        assert_eq!(config.check_fails_before_reboot, 5);
        assert_eq!(config.reboot_fails_before_power_cycle, 2);
        assert_eq!(config.stats_interval, Duration::from_secs(10));
        assert_eq!(config.thresholds.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let config = ClientMonitorConfig::default().with_state_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(RigwatchError::Validation(msg)) if msg.contains("state_interval")
        ));
    }
}
