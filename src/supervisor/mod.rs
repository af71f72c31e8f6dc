//! Per-client supervision
//!
//! This module provides the escalation core:
//! - Policy describing when to reboot and when to power-cycle
//! - Run-state bookkeeping and the transition rule
//! - The ticker-driven loop that runs one instance per client

pub mod client_supervisor;
pub mod policy;
pub mod state;

pub use client_supervisor::{ClientSupervisor, StopReceiver};
pub use policy::ClientMonitorConfig;
pub use state::{RunState, SupervisorState, Transition};
