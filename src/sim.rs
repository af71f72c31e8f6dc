//! Simulated client
//!
//! A [`Client`] whose answers are scripted, with an optional random outage
//! rate. Used to rehearse escalation policies without real hardware.

use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{Client, Stats};
use crate::error::ClientError;

/// Scripted stand-in for a real device
///
/// Each operation pops the next scripted result if one is queued, otherwise
/// falls back to the baseline (healthy stats, successful actions) subject to
/// `failure_rate`.
#[derive(Debug)]
pub struct SimulatedClient {
    name: String,
    power_cycle_enabled: bool,
    read_only: bool,
    baseline: Stats,
    failure_rate: f64,
    action_delay: Duration,
    stats_script: Mutex<VecDeque<Result<Stats, ClientError>>>,
    reboot_script: Mutex<VecDeque<Result<(), ClientError>>>,
    power_cycle_script: Mutex<VecDeque<Result<(), ClientError>>>,
    stats_calls: AtomicUsize,
    reboot_calls: AtomicUsize,
    power_cycle_calls: AtomicUsize,
}

impl SimulatedClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            power_cycle_enabled: false,
            read_only: false,
            baseline: Stats::empty(),
            failure_rate: 0.0,
            action_delay: Duration::ZERO,
            stats_script: Mutex::new(VecDeque::new()),
            reboot_script: Mutex::new(VecDeque::new()),
            power_cycle_script: Mutex::new(VecDeque::new()),
            stats_calls: AtomicUsize::new(0),
            reboot_calls: AtomicUsize::new(0),
            power_cycle_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_power_cycle(mut self, enabled: bool) -> Self {
        self.power_cycle_enabled = enabled;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Stats returned when nothing is scripted
    pub fn with_baseline(mut self, baseline: Stats) -> Self {
        self.baseline = baseline;
        self
    }

    /// Probability (0.0..=1.0) that an unscripted call fails
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// How long reboot and power-cycle take to complete
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn push_stats(&self, result: Result<Stats, ClientError>) {
        push(&self.stats_script, result);
    }

    pub fn push_reboot(&self, result: Result<(), ClientError>) {
        push(&self.reboot_script, result);
    }

    pub fn push_power_cycle(&self, result: Result<(), ClientError>) {
        push(&self.power_cycle_script, result);
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn reboot_calls(&self) -> usize {
        self.reboot_calls.load(Ordering::SeqCst)
    }

    pub fn power_cycle_calls(&self) -> usize {
        self.power_cycle_calls.load(Ordering::SeqCst)
    }

    fn injected_failure(&self) -> bool {
        self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate)
    }

    async fn action(
        &self,
        script: &Mutex<VecDeque<Result<(), ClientError>>>,
        what: &str,
    ) -> Result<(), ClientError> {
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
        if let Some(result) = pop(script) {
            return result;
        }
        if self.injected_failure() {
            return Err(ClientError::Rejected(format!("simulated {} failure", what)));
        }
        Ok(())
    }
}

fn push<T>(script: &Mutex<VecDeque<T>>, item: T) {
    script
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push_back(item);
}

fn pop<T>(script: &Mutex<VecDeque<T>>) -> Option<T> {
    script
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop_front()
}

#[async_trait]
impl Client for SimulatedClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stats(&self) -> Result<Stats, ClientError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = pop(&self.stats_script) {
            return result;
        }
        if self.injected_failure() {
            return Err(ClientError::Unreachable(format!(
                "simulated outage on {}",
                self.name
            )));
        }
        Ok(Stats::new(self.baseline.values.clone()))
    }

    async fn reboot(&self) -> Result<(), ClientError> {
        self.reboot_calls.fetch_add(1, Ordering::SeqCst);
        self.action(&self.reboot_script, "reboot").await
    }

    async fn power_cycle(&self) -> Result<(), ClientError> {
        self.power_cycle_calls.fetch_add(1, Ordering::SeqCst);
        self.action(&self.power_cycle_script, "power cycle").await
    }

    fn power_cycle_enabled(&self) -> bool {
        self.power_cycle_enabled
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_consumed_before_baseline() {
        let client =
            SimulatedClient::new("rig-01").with_baseline(Stats::empty().with("fans", 4.0));
        client.push_stats(Err(ClientError::Unreachable("down".into())));

        assert!(client.stats().await.is_err());
        let stats = client.stats().await.unwrap();
        assert_eq!(stats.get("fans"), Some(4.0));
        assert_eq!(client.stats_calls(), 2);
    }

    #[tokio::test]
    async fn test_full_failure_rate_fails_unscripted_calls() {
        let client = SimulatedClient::new("rig-01").with_failure_rate(1.0);
        client.push_reboot(Ok(()));

        assert!(client.reboot().await.is_ok());
        assert_eq!(
            client.reboot().await,
            Err(ClientError::Rejected("simulated reboot failure".into()))
        );
        assert!(client.power_cycle().await.is_err());
        assert!(client.stats().await.is_err());
    }

    #[test]
    fn test_failure_rate_clamped() {
        let client = SimulatedClient::new("rig-01").with_failure_rate(7.5);
        assert_eq!(client.failure_rate, 1.0);
    }
}
