//! Per-client supervision loop
//!
//! One [`ClientSupervisor`] runs per registered client. It multiplexes a
//! state tick, a stats tick and the shared stop channel into a single
//! `select!`, so its [`RunState`] is only ever touched by one branch at a time.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::policy::ClientMonitorConfig;
use super::state::{RunState, SupervisorState};
use crate::client::Client;
use crate::events::{Event, EventSender};
use crate::threshold::evaluate_all;

/// Stop slots shared by every supervisor; each token stops exactly one of them
pub type StopReceiver = Arc<Mutex<mpsc::Receiver<()>>>;

/// Supervises a single client until a stop token arrives
pub struct ClientSupervisor {
    client: Arc<dyn Client>,
    config: Arc<ClientMonitorConfig>,
    events: EventSender,
    stop: StopReceiver,
}

impl ClientSupervisor {
    pub fn new(
        client: Arc<dyn Client>,
        config: Arc<ClientMonitorConfig>,
        events: EventSender,
        stop: StopReceiver,
    ) -> Self {
        Self {
            client,
            config,
            events,
            stop,
        }
    }

    fn name(&self) -> &str {
        self.client.name()
    }

    fn emit(&self, event: Event) {
        // The sink may already be stopped during shutdown
        let _ = self.events.send(event);
    }

    fn log(&self, message: impl Into<String>) {
        self.emit(Event::log(self.name(), message));
    }

    /// Run until stopped. Never fails; every error becomes a notification.
    pub async fn run(self) {
        let config = &self.config;
        self.log(format!(
            "Monitor Starting\tPowerCycle: {}\tReadOnly: {}\tCheckFailsBeforeReboot: {}\tRebootFailsBeforePowerCycle: {}\tRebootInterval: {:?}\tStatsInterval: {:?}\tStateInterval: {:?}",
            self.client.power_cycle_enabled(),
            self.client.read_only(),
            config.check_fails_before_reboot,
            config.reboot_fails_before_power_cycle,
            config.reboot_interval,
            config.stats_interval,
            config.state_interval,
        ));

        let start = Instant::now();
        let mut state_ticker = ticker(start, config.state_interval);
        let mut stats_ticker = ticker(start, config.stats_interval);
        let mut run_state = RunState::new(config.reboot_interval, start);

        loop {
            tokio::select! {
                biased;
                _ = next_stop(&self.stop) => {
                    self.log("Client monitoring stopped");
                    return;
                }
                _ = state_ticker.tick() => self.on_state_tick(&mut run_state),
                _ = stats_ticker.tick() => self.on_stats_tick(&mut run_state).await,
            }
        }
    }

    fn on_state_tick(&self, run_state: &mut RunState) {
        let power_cycle_enabled = self.client.power_cycle_enabled();
        let now = Instant::now();
        if let Some(transition) = run_state.evaluate(&self.config, power_cycle_enabled, now) {
            debug!(
                client = %self.name(),
                from = %transition.from,
                to = %transition.to,
                failed_checks = run_state.failed_checks(),
                failed_reboots = run_state.failed_reboots(),
                "state transition"
            );
            self.log(format!("transitioning to {} state...", transition.to));
        }
    }

    async fn on_stats_tick(&self, run_state: &mut RunState) {
        match run_state.state() {
            SupervisorState::Running => self.check_health(run_state).await,
            SupervisorState::Rebooting => self.reboot(run_state).await,
            SupervisorState::PowerCycling => self.power_cycle(run_state).await,
        }
    }

    async fn check_health(&self, run_state: &mut RunState) {
        match self.client.stats().await {
            Ok(stats) => {
                let violations = evaluate_all(&self.config.thresholds, &stats);
                for violation in &violations {
                    self.emit(Event::error(self.name(), violation));
                }
                run_state.record_check(violations);
            }
            Err(e) => {
                self.emit(Event::error(self.name(), &e));
                run_state.record_stats_error();
            }
        }
    }

    async fn reboot(&self, run_state: &mut RunState) {
        self.log("Attempting to reboot client...");
        match self.client.reboot().await {
            Ok(()) => {
                self.log("rebooted successfully");
                self.emit(Event::email(
                    self.name(),
                    "SUCCESSFULLY rebooted",
                    format!(
                        "Client was restarted due to events: {}",
                        run_state.error_summary()
                    ),
                ));
                run_state.record_recovery(Instant::now());
            }
            Err(e) => {
                self.emit(Event::error(self.name(), format!("failed to reboot: {}", e)));
                self.emit(Event::email(
                    self.name(),
                    "FAILED to Reboot",
                    format!("Client was unable to be restarted due to error: {}", e),
                ));
                run_state.record_reboot_failure();
            }
        }
    }

    async fn power_cycle(&self, run_state: &mut RunState) {
        self.log("Attempting to power cycle...");
        match self.client.power_cycle().await {
            Ok(()) => {
                self.log("power cycled successfully");
                self.emit(Event::email(
                    self.name(),
                    "SUCCESSFULLY Power Cycled",
                    format!(
                        "Client was power cycled due to errors: {}",
                        run_state.error_summary()
                    ),
                ));
                run_state.record_recovery(Instant::now());
            }
            // Retried on the next stats tick; never feeds the escalation counters
            Err(e) => {
                self.emit(Event::error(self.name(), &e));
                self.emit(Event::email(
                    self.name(),
                    "FAILED to Power Cycle",
                    format!("Client was unable to power cycle due to error: {}", e),
                ));
            }
        }
    }
}

fn ticker(start: Instant, period: std::time::Duration) -> Interval {
    let mut interval = interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Resolves when this supervisor takes a stop token or the channel closes
async fn next_stop(stop: &StopReceiver) -> Option<()> {
    stop.lock().await.recv().await
}
