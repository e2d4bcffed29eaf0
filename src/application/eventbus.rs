use crate::domain::event::DomainEvent;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Events buffered per subscriber before the slowest one starts lagging
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel carrying the diagnostics of approval sessions
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::trace!("No subscribers for {} event", e.0.event_name());
        }
    }

    /// Subscribe to every event, from every session
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the next session only. The stream follows the session id
    /// of the first event it receives and ends after that session stops.
    pub fn subscribe_session(&self) -> SessionEvents {
        SessionEvents {
            receiver: self.sender.subscribe(),
            session_id: None,
            finished: false,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Events of a single session, in publish order.
pub struct SessionEvents {
    receiver: broadcast::Receiver<DomainEvent>,
    session_id: Option<String>,
    finished: bool,
}

impl SessionEvents {
    /// Next event of the session, or `None` once it has stopped or the bus is gone.
    pub async fn next(&mut self) -> Option<DomainEvent> {
        while !self.finished {
            match self.receiver.recv().await {
                Ok(event) => {
                    let session_id = self
                        .session_id
                        .get_or_insert_with(|| event.session_id().to_string());
                    if event.session_id() != session_id.as_str() {
                        continue;
                    }
                    self.finished = matches!(event, DomainEvent::SessionStopped { .. });
                    return Some(event);
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Session event stream lagged by {} events", n);
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Event bus closed");
                    self.finished = true;
                }
            }
        }
        None
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{SessionResult, StopReason};
    use std::collections::BTreeSet;

    fn scan_started(session_id: &str) -> DomainEvent {
        DomainEvent::ScanStarted {
            session_id: session_id.to_string(),
        }
    }

    fn stopped(session_id: &str) -> DomainEvent {
        DomainEvent::SessionStopped {
            session_id: session_id.to_string(),
            reason: StopReason::Exhausted,
            result: SessionResult {
                session_id: session_id.to_string(),
                approved_count: 0,
                skipped_count: 0,
                failed_count: 0,
                filter_was_active: false,
                allowed_usernames: BTreeSet::new(),
                stop_reason: StopReason::Exhausted,
            },
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(scan_started("s1"));
    }

    #[test]
    fn test_subscribers_receive_events() {
        let bus = create_event_bus();
        let mut rx = bus.subscribe();
        bus.publish(DomainEvent::ScanCompleted {
            session_id: "s1".to_string(),
            found: 3,
            fresh: 2,
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_name(), "scan_completed");
        assert_eq!(event.session_id(), "s1");
    }

    #[tokio::test]
    async fn test_session_stream_follows_one_session() {
        let bus = EventBus::default();
        let mut events = bus.subscribe_session();
        bus.publish(scan_started("s1"));
        bus.publish(scan_started("s2"));
        bus.publish(stopped("s1"));
        bus.publish(scan_started("s1"));

        assert_eq!(events.next().await, Some(scan_started("s1")));
        assert_eq!(events.next().await.map(|e| e.event_name()), Some("session_stopped"));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_session_stream_survives_lag() {
        let bus = EventBus::new(2);
        let mut events = bus.subscribe_session();
        for _ in 0..4 {
            bus.publish(scan_started("s1"));
        }
        bus.publish(stopped("s1"));

        let mut names = Vec::new();
        while let Some(event) = events.next().await {
            names.push(event.event_name());
        }
        assert_eq!(names.last(), Some(&"session_stopped"));
        assert!(names.len() <= 2);
    }

    #[tokio::test]
    async fn test_session_stream_ends_when_bus_dropped() {
        let bus = EventBus::default();
        let mut events = bus.subscribe_session();
        bus.publish(scan_started("s1"));
        drop(bus);

        assert!(events.next().await.is_some());
        assert_eq!(events.next().await, None);
    }
}
