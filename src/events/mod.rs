//! Notification sink
//!
//! Supervisors submit [`Event`]s through a non-blocking channel; a single
//! consuming loop owned by [`EventService`] logs them and forwards emails.

pub mod email;
pub mod event;
pub mod service;

pub use email::{EmailService, WebhookEmailService};
pub use event::{Event, EventKind};
pub use service::{EventSender, EventService};
