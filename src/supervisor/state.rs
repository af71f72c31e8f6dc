//! Escalation state machine
//!
//! [`RunState`] holds the bookkeeping one supervisor keeps for its client and
//! the transition rule that turns it into a [`SupervisorState`]. It performs
//! no I/O and takes the current instant explicitly, so every rule here can be
//! exercised without timers.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use super::policy::ClientMonitorConfig;
use crate::threshold::ThresholdViolation;

/// Escalation level a supervisor is operating at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SupervisorState {
    /// Passive observation: health checks run on every stats tick
    Running,
    /// Reboot attempted on every stats tick
    Rebooting,
    /// Power-cycle attempted on every stats tick
    PowerCycling,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Running => "RUNNING",
            SupervisorState::Rebooting => "REBOOTING",
            SupervisorState::PowerCycling => "POWERCYCLING",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change of escalation level produced by [`RunState::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SupervisorState,
    pub to: SupervisorState,
}

/// Private run-state of one supervisor
#[derive(Debug, Clone)]
pub struct RunState {
    state: SupervisorState,
    /// Failed health evaluations since the last reset
    failed_checks: u32,
    /// Failed reboot attempts since the last reset
    failed_reboots: u32,
    /// Completion time of the last successful recovery action.
    /// `None` only when `now - reboot_interval` predates the monotonic clock.
    last_reboot: Option<Instant>,
    /// Violations accumulated since the last reset, for email context
    errors: Vec<ThresholdViolation>,
    /// Consumed on the next state tick: counters and errors are zeroed
    /// there, never at the point the flag is raised.
    reset_pending: bool,
}

impl RunState {
    /// Fresh state with a reboot immediately eligible
    pub fn new(reboot_interval: Duration, now: Instant) -> Self {
        Self {
            state: SupervisorState::Running,
            failed_checks: 0,
            failed_reboots: 0,
            last_reboot: now.checked_sub(reboot_interval),
            errors: Vec::new(),
            reset_pending: false,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn failed_checks(&self) -> u32 {
        self.failed_checks
    }

    pub fn failed_reboots(&self) -> u32 {
        self.failed_reboots
    }

    pub fn last_reboot(&self) -> Option<Instant> {
        self.last_reboot
    }

    pub fn errors(&self) -> &[ThresholdViolation] {
        &self.errors
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// State tick: apply a pending reset, then recompute the escalation level.
    ///
    /// Returns the transition only when the level actually changed.
    pub fn evaluate(
        &mut self,
        policy: &ClientMonitorConfig,
        power_cycle_enabled: bool,
        now: Instant,
    ) -> Option<Transition> {
        if self.reset_pending {
            self.failed_checks = 0;
            self.failed_reboots = 0;
            self.errors.clear();
            self.reset_pending = false;
        }

        let next = self.next_state(policy, power_cycle_enabled, now);
        let previous = std::mem::replace(&mut self.state, next);
        (previous != next).then_some(Transition {
            from: previous,
            to: next,
        })
    }

    fn next_state(
        &self,
        policy: &ClientMonitorConfig,
        power_cycle_enabled: bool,
        now: Instant,
    ) -> SupervisorState {
        if power_cycle_enabled && self.failed_reboots > policy.reboot_fails_before_power_cycle {
            SupervisorState::PowerCycling
        } else if self.failed_checks > policy.check_fails_before_reboot
            && self.reboot_cooled_down(policy.reboot_interval, now)
        {
            SupervisorState::Rebooting
        } else {
            SupervisorState::Running
        }
    }

    /// Whether strictly more than `reboot_interval` has passed since the last recovery
    pub fn reboot_cooled_down(&self, reboot_interval: Duration, now: Instant) -> bool {
        match self.last_reboot {
            Some(last) => now.saturating_duration_since(last) > reboot_interval,
            None => true,
        }
    }

    /// Stats could not be fetched
    pub fn record_stats_error(&mut self) {
        self.failed_checks = self.failed_checks.saturating_add(1);
    }

    /// Outcome of running every threshold against a fetched snapshot.
    /// No violations schedules a reset instead of clearing counters now.
    pub fn record_check(&mut self, violations: Vec<ThresholdViolation>) {
        if violations.is_empty() {
            self.reset_pending = true;
        } else {
            self.errors.extend(violations);
            self.failed_checks = self.failed_checks.saturating_add(1);
        }
    }

    pub fn record_reboot_failure(&mut self) {
        self.failed_reboots = self.failed_reboots.saturating_add(1);
    }

    /// A reboot or power-cycle completed at `now`
    pub fn record_recovery(&mut self, now: Instant) {
        self.reset_pending = true;
        self.last_reboot = Some(now);
    }

    /// Accumulated violations rendered for an email body
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "none".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("\n- {}", e))
            .collect::<String>()
    }
}
