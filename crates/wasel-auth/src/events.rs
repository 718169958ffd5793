//! Session-change notifications.

use crate::Session;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

const DEFAULT_CAPACITY: usize = 32;

/// Why the session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    /// The session after the change; `None` when signed out.
    pub session: Option<Session>,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn signed_out() -> Self {
        Self::new(SessionEventKind::SignedOut, None)
    }
}

/// Fan-out of session events to any number of subscribers.
#[derive(Clone)]
pub struct SessionEventHub {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SessionEventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: SessionEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct SessionSubscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Next event, or `None` once the hub is gone.
    ///
    /// A subscriber that falls behind skips to the oldest retained event;
    /// only the latest session matters to consumers.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;
    use chrono::Utc;

    fn session(user_id: &str) -> Session {
        Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now(),
            user: Identity::new(user_id, None),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = SessionEventHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let event = SessionEvent::new(SessionEventKind::SignedIn, Some(session("u1")));
        assert_eq!(hub.publish(event.clone()), 2);

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(second.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_drop() {
        let hub = SessionEventHub::default();
        let first = hub.subscribe();
        let second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        first.unsubscribe();
        assert_eq!(hub.subscriber_count(), 1);

        drop(second);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(SessionEvent::signed_out()), 0);
    }

    #[tokio::test]
    async fn test_closed_hub_ends_subscription() {
        let hub = SessionEventHub::default();
        let mut subscription = hub.subscribe();
        drop(hub);
        assert_eq!(subscription.recv().await, None);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let hub = SessionEventHub::new(2);
        let mut subscription = hub.subscribe();
        for user in ["u1", "u2", "u3"] {
            hub.publish(SessionEvent::new(
                SessionEventKind::TokenRefreshed,
                Some(session(user)),
            ));
        }

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.session.unwrap().user.id, "u2");
    }
}
