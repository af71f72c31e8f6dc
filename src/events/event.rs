use chrono::{DateTime, Utc};
use std::fmt;

/// Notification kinds accepted by the sink
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Log { message: String },
    Error { error: String },
    Email { subject: String, body: String },
}

/// One notification about a client
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub client: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    fn new(client: &str, kind: EventKind) -> Self {
        Self {
            client: client.to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn log(client: &str, message: impl Into<String>) -> Self {
        Self::new(
            client,
            EventKind::Log {
                message: message.into(),
            },
        )
    }

    pub fn error(client: &str, error: impl fmt::Display) -> Self {
        Self::new(
            client,
            EventKind::Error {
                error: error.to_string(),
            },
        )
    }

    pub fn email(client: &str, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(
            client,
            EventKind::Email {
                subject: subject.into(),
                body: body.into(),
            },
        )
    }

    pub fn is_log(&self) -> bool {
        matches!(self.kind, EventKind::Log { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error { .. })
    }

    pub fn is_email(&self) -> bool {
        matches!(self.kind, EventKind::Email { .. })
    }

    /// Log message, if this is a log event
    pub fn message(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Log { message } => Some(message),
            _ => None,
        }
    }

    /// Email subject, if this is an email event
    pub fn subject(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Email { subject, .. } => Some(subject),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Log { message } => write!(f, "[{}] {}", self.client, message),
            EventKind::Error { error } => write!(f, "[{}] ERROR {}", self.client, error),
            EventKind::Email { subject, .. } => {
                write!(f, "[{}] EMAIL {}", self.client, subject)
            }
        }
    }
}
