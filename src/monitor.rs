//! Fleet-level orchestration
//!
//! The [`Monitor`] owns the registered (client, policy) pairs, starts one
//! [`ClientSupervisor`] task per registration and fans out stop tokens.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use crate::client::Client;
use crate::error::{RigwatchError, Result};
use crate::events::{Event, EventService};
use crate::supervisor::{ClientMonitorConfig, ClientSupervisor};

/// One registered client and its escalation policy
#[derive(Clone)]
pub struct ClientMonitoring {
    pub client: Arc<dyn Client>,
    pub config: Arc<ClientMonitorConfig>,
}

/// Supervises a fleet of clients, one independent task per registration
pub struct Monitor {
    clients: Vec<ClientMonitoring>,
    events: EventService,
    stop_tx: Option<mpsc::Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(events: EventService) -> Self {
        Self {
            clients: Vec::new(),
            events,
            stop_tx: None,
            handles: Vec::new(),
        }
    }

    /// Notification sink shared by all supervisors
    pub fn events(&self) -> &EventService {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Register a client. Duplicates are allowed and get their own supervisor.
    pub fn add_client(
        &mut self,
        client: Arc<dyn Client>,
        config: Arc<ClientMonitorConfig>,
    ) -> Result<()> {
        if self.stop_tx.is_some() {
            return Err(RigwatchError::InvalidState(
                "clients must be added before the monitor starts".to_string(),
            ));
        }
        config.validate()?;
        self.clients.push(ClientMonitoring { client, config });
        Ok(())
    }

    /// Launch every supervisor and the notification loop; returns immediately
    pub fn start(&mut self) -> Result<()> {
        if self.stop_tx.is_some() {
            return Err(RigwatchError::InvalidState(
                "monitor already started".to_string(),
            ));
        }

        // One slot per registration so stop() never blocks
        let (stop_tx, stop_rx) = mpsc::channel(self.clients.len().max(1));
        let stop_rx = Arc::new(Mutex::new(stop_rx));
        let tx = self.events.sender();

        for c in &self.clients {
            let name = c.client.name().to_string();
            let _ = tx.send(Event::log(&name, "starting monitoring..."));

            let supervisor = ClientSupervisor::new(
                c.client.clone(),
                c.config.clone(),
                tx.clone(),
                stop_rx.clone(),
            );
            let span = info_span!("supervisor", client = %name);
            self.handles
                .push(tokio::spawn(supervisor.run().instrument(span)));
        }

        self.events.start();
        self.stop_tx = Some(stop_tx);
        info!("Monitoring {} client(s)", self.clients.len());
        Ok(())
    }

    /// Send one stop token per registration, then stop the sink. Does not wait.
    pub fn stop(&self) -> Result<()> {
        let stop_tx = self.stop_tx.as_ref().ok_or_else(|| {
            RigwatchError::InvalidState("monitor has not been started".to_string())
        })?;

        for _ in 0..self.clients.len() {
            if let Err(e) = stop_tx.try_send(()) {
                error!("Failed to deliver stop token: {}", e);
            }
        }
        self.events.stop();
        info!("Stop requested for {} supervisor(s)", self.clients.len());
        Ok(())
    }

    /// Wait for every supervisor task and the notification loop to exit.
    /// Returns how many supervisors finished.
    pub async fn wait(&mut self) -> usize {
        let handles = std::mem::take(&mut self.handles);
        let finished = join_all(handles)
            .await
            .into_iter()
            .filter(|r| match r {
                Ok(()) => true,
                Err(e) => {
                    error!("Supervisor task failed: {}", e);
                    false
                }
            })
            .count();
        self.events.wait().await;
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedClient;
    use std::time::Duration;

    fn policy() -> Arc<ClientMonitorConfig> {
        Arc::new(
            ClientMonitorConfig::default()
                .with_stats_interval(Duration::from_secs(5))
                .with_state_interval(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn test_stop_before_start_rejected() {
        let monitor = Monitor::new(EventService::new());
        assert!(matches!(monitor.stop(), Err(RigwatchError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_guards() {
        let mut monitor = Monitor::new(EventService::new());
        monitor
            .add_client(Arc::new(SimulatedClient::new("rig-01")), policy())
            .unwrap();
        monitor.start().unwrap();

        assert!(matches!(monitor.start(), Err(RigwatchError::InvalidState(_))));
        assert!(matches!(
            monitor.add_client(Arc::new(SimulatedClient::new("rig-02")), policy()),
            Err(RigwatchError::InvalidState(_))
        ));

        monitor.stop().unwrap();
        assert_eq!(monitor.wait().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected() {
        let mut monitor = Monitor::new(EventService::new());
        let config = Arc::new(ClientMonitorConfig::default().with_stats_interval(Duration::ZERO));
        assert!(matches!(
            monitor.add_client(Arc::new(SimulatedClient::new("rig-01")), config),
            Err(RigwatchError::Validation(_))
        ));
        assert!(monitor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_monitor_starts_and_stops() {
        let mut monitor = Monitor::new(EventService::new());
        monitor.start().unwrap();
        monitor.stop().unwrap();
        assert_eq!(monitor.wait().await, 0);
    }
}
