use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::email::EmailService;
use super::event::{Event, EventKind};

/// Submission side of the sink; sending never blocks
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Notification sink with its own consuming loop
pub struct EventService {
    tx: EventSender,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    email: Option<Arc<dyn EmailService>>,
    delivered_tx: broadcast::Sender<Event>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventService {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (delivered_tx, _) = broadcast::channel(256);
        let (stop_tx, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            email: None,
            delivered_tx,
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    /// Forward email events to the given service
    pub fn with_email(mut self, email: Arc<dyn EmailService>) -> Self {
        self.email = Some(email);
        self
    }

    /// Handle for submitting events from any task
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Subscribe to every event after it has been delivered
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.delivered_tx.subscribe()
    }

    /// Spawn the delivery loop. Subsequent calls are ignored.
    pub fn start(&self) {
        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(mut rx) = rx else {
            debug!("Event service already started");
            return;
        };

        let email = self.email.clone();
        let delivered_tx = self.delivered_tx.clone();
        let mut stop_rx = self.stop_tx.subscribe();
        let stopped_early = *stop_rx.borrow();

        let handle = tokio::spawn(async move {
            info!("Event service started");
            if !stopped_early {
                loop {
                    tokio::select! {
                        biased;
                        maybe_event = rx.recv() => match maybe_event {
                            Some(event) => deliver(event, email.as_ref(), &delivered_tx).await,
                            None => break,
                        },
                        _ = stop_rx.changed() => break,
                    }
                }
            }
            // Drain whatever was queued before the stop
            while let Ok(event) = rx.try_recv() {
                deliver(event, email.as_ref(), &delivered_tx).await;
            }
            info!("Event service stopped");
        });

        match self.handle.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    /// Signal the delivery loop to exit after draining queued events
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the delivery loop to finish
    pub async fn wait(&self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Event service task failed: {}", e);
            }
        }
    }
}

impl Default for EventService {
    fn default() -> Self {
        Self::new()
    }
}

async fn deliver(
    event: Event,
    email: Option<&Arc<dyn EmailService>>,
    delivered_tx: &broadcast::Sender<Event>,
) {
    match &event.kind {
        EventKind::Log { message } => info!(client = %event.client, "{}", message),
        EventKind::Error { error } => error!(client = %event.client, "{}", error),
        EventKind::Email { subject, body } => {
            warn!(client = %event.client, subject = %subject, "email: {}", body);
            if let Some(email) = email {
                if let Err(e) = email.send(&event.client, subject, body).await {
                    error!(client = %event.client, "Failed to send email '{}': {}", subject, e);
                }
            }
        }
    }

    let _ = delivered_tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RigwatchError;
    use crate::events::email::MockEmailService;

    #[tokio::test]
    async fn test_events_delivered_in_submission_order() {
        let service = EventService::new();
        let mut delivered = service.subscribe();
        service.start();

        let tx = service.sender();
        tx.send(Event::log("rig-01", "one")).unwrap();
        tx.send(Event::error("rig-01", "two")).unwrap();

        let first = delivered.recv().await.unwrap();
        let second = delivered.recv().await.unwrap();
        assert_eq!(first.message(), Some("one"));
        assert!(second.is_error());

        service.stop();
        service.wait().await;
    }

    #[tokio::test]
    async fn test_stop_drains_queued_events() {
        let service = EventService::new();
        let mut delivered = service.subscribe();

        let tx = service.sender();
        for i in 0..5 {
            tx.send(Event::log("rig-01", format!("event {i}"))).unwrap();
        }
        service.start();
        service.stop();
        service.wait().await;

        let mut count = 0;
        while delivered.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_email_events_forwarded() {
        let mut email = MockEmailService::new();
        email
            .expect_send()
            .withf(|client, subject, _| {
                client.to_string() == "rig-07" && subject.to_string() == "FAILED to Reboot"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = EventService::new().with_email(Arc::new(email));
        let tx = service.sender();
        tx.send(Event::log("rig-07", "not an email")).unwrap();
        tx.send(Event::email("rig-07", "FAILED to Reboot", "reason")).unwrap();

        service.start();
        service.stop();
        service.wait().await;
    }

    #[tokio::test]
    async fn test_email_failure_is_absorbed() {
        let mut email = MockEmailService::new();
        email
            .expect_send()
            .times(2)
            .returning(|_, _, _| Err(RigwatchError::Delivery("relay down".into())));

        let service = EventService::new().with_email(Arc::new(email));
        let mut delivered = service.subscribe();
        let tx = service.sender();
        tx.send(Event::email("rig-01", "a", "b")).unwrap();
        tx.send(Event::email("rig-01", "c", "d")).unwrap();

        service.start();
        service.stop();
        service.wait().await;

        assert!(delivered.try_recv().is_ok());
        assert!(delivered.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let service = EventService::new();
        service.start();
        service.start();
        service.stop();
        service.wait().await;
    }
}
