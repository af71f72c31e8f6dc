use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{RigwatchError, Result};
use crate::events::{EmailService, EventService, WebhookEmailService};
use crate::monitor::Monitor;
use crate::sim::SimulatedClient;

#[derive(Parser)]
#[command(name = "rigwatch")]
#[command(version = "0.1.0")]
#[command(about = "Health-check a fleet of rigs and escalate through reboot and power-cycle", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory, or a single .toml file
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration, then print each client's policy
    Validate,
    /// Run the monitor against simulated clients built from the configuration
    Simulate {
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Probability that an unscripted client call fails
        #[arg(long, default_value = "0.2")]
        failure_rate: f64,
        /// Seconds each simulated reboot or power cycle takes
        #[arg(long, default_value = "0")]
        action_delay_secs: u64,
    },
}

/// Load from a directory (layered with environment) or from one file
pub fn load_config(path: &str) -> Result<AppConfig> {
    let p = Path::new(path);
    let config = if p.is_file() {
        AppConfig::from_file(p)?
    } else {
        AppConfig::load_from(p)?
    };
    Ok(config)
}

fn ensure_valid(config: &AppConfig) -> Result<()> {
    config
        .validate()
        .map_err(|errors| RigwatchError::Validation(errors.join("; ")))
}

/// Print the resolved policy of every configured client
pub fn validate(config: &AppConfig) -> Result<()> {
    ensure_valid(config)?;

    println!("Configuration OK: {} client(s)", config.clients.len());
    for client in &config.clients {
        let policy = config.client_policy(client);
        println!(
            "  {:<16} power_cycle={:<5} read_only={:<5} checks>{} reboots>{} reboot_every={:?} stats_every={:?} state_every={:?}",
            client.name,
            client.power_cycle_enabled,
            client.read_only,
            policy.check_fails_before_reboot,
            policy.reboot_fails_before_power_cycle,
            policy.reboot_interval,
            policy.stats_interval,
            policy.state_interval,
        );
        for t in &client.thresholds {
            println!(
                "    threshold {} min={:?} max={:?}",
                t.metric, t.min, t.max
            );
        }
    }
    if config.email.is_none() {
        println!("  (no email relay configured; emails are logged only)");
    }
    Ok(())
}

/// Run a full monitor over simulated clients until the duration elapses or Ctrl-C
pub async fn simulate(
    config: &AppConfig,
    duration: Option<Duration>,
    failure_rate: f64,
    action_delay: Duration,
) -> Result<()> {
    ensure_valid(config)?;

    let mut events = EventService::new();
    if let Some(email) = &config.email {
        let email: Arc<dyn EmailService> = WebhookEmailService::new(email.webhook_url.clone());
        events = events.with_email(email);
    }

    let mut monitor = Monitor::new(events);
    for client in &config.clients {
        let sim = SimulatedClient::new(&client.name)
            .with_power_cycle(client.power_cycle_enabled)
            .with_read_only(client.read_only)
            .with_baseline(client.baseline_stats())
            .with_failure_rate(failure_rate)
            .with_action_delay(action_delay);
        monitor.add_client(Arc::new(sim), Arc::new(config.client_policy(client)))?;
    }

    monitor.start()?;
    info!("Simulation running, press Ctrl-C to stop");

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("Simulation time elapsed"),
                _ = signal::ctrl_c() => info!("Received Ctrl-C"),
            }
        }
        None => {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    }

    monitor.stop()?;
    let finished = monitor.wait().await;
    info!("{} supervisor(s) stopped", finished);
    Ok(())
}
