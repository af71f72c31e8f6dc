pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod monitor;
pub mod sim;
pub mod supervisor;
pub mod threshold;

pub use client::{Client, Stats};
pub use config::AppConfig;
pub use error::{ClientError, RigwatchError, Result};
pub use events::{EmailService, Event, EventKind, EventService, WebhookEmailService};
pub use monitor::{ClientMonitoring, Monitor};
pub use sim::SimulatedClient;
pub use supervisor::{
    ClientMonitorConfig, ClientSupervisor, RunState, SupervisorState, Transition,
};
pub use threshold::{evaluate_all, RangeThreshold, Threshold, ThresholdViolation};
