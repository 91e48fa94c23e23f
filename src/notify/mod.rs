use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::models::event::{EventKind, NotificationEvent, RecipientRole};
use crate::observability::metrics::Metrics;
use crate::presence::PresenceRegistry;

/// Capability that moves one payload toward one live connection. Returns
/// false on failure; the dispatcher treats each connection independently.
///
/// Implementations must enqueue and return without waiting on the wire —
/// callers emit while still holding the owning entity's lock so that
/// per-connection delivery order follows commit order. Socket writes belong
/// in the connection's own send loop.
#[async_trait]
pub trait ConnectionTransport: Send + Sync {
    async fn send(&self, connection_id: Uuid, payload: String) -> bool;
}

/// Transport backed by a bounded per-connection channel. The WebSocket
/// handler attaches a sender on upgrade and detaches it on teardown; the far
/// side of each channel is drained by that connection's send loop, so
/// delivery order per connection follows emission order.
#[derive(Default)]
pub struct ChannelTransport {
    senders: DashMap<Uuid, mpsc::Sender<String>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, connection_id: Uuid, sender: mpsc::Sender<String>) {
        self.senders.insert(connection_id, sender);
    }

    pub fn detach(&self, connection_id: Uuid) {
        self.senders.remove(&connection_id);
    }
}

#[async_trait]
impl ConnectionTransport for ChannelTransport {
    async fn send(&self, connection_id: Uuid, payload: String) -> bool {
        let sender = match self.senders.get(&connection_id) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };

        // A full buffer means a client too slow to keep up; the event is
        // dropped for that connection rather than stalling the emitter.
        sender.try_send(payload).is_ok()
    }
}

/// Soft delivery result, never an error: a committed transition stands
/// regardless of what happened on the wire.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { connections: usize, failed: usize },
    Undelivered,
}

/// What the caller gets back per emitted event: the kind, who it targeted,
/// and how delivery went.
#[derive(Debug, Clone, Serialize)]
pub struct EmittedEvent {
    pub kind: EventKind,
    pub recipient: Uuid,
    pub role: RecipientRole,
    pub delivery: DeliveryOutcome,
}

pub struct Notifier {
    presence: Arc<PresenceRegistry>,
    transport: Arc<dyn ConnectionTransport>,
    metrics: Metrics,
}

impl Notifier {
    pub fn new(
        presence: Arc<PresenceRegistry>,
        transport: Arc<dyn ConnectionTransport>,
        metrics: Metrics,
    ) -> Self {
        Self {
            presence,
            transport,
            metrics,
        }
    }

    /// Fan one event out to every live connection of its recipient. With no
    /// live connections the event is dropped, reported `Undelivered`, and
    /// never retried; durable notification history is the caller's concern.
    pub async fn emit(&self, event: &NotificationEvent) -> EmittedEvent {
        let connections = self.presence.connections_for(event.recipient);

        let delivery = if connections.is_empty() {
            warn!(
                recipient = %event.recipient,
                kind = ?event.kind,
                "no live connections; notification dropped"
            );
            self.metrics.notifications_total.with_label_values(&["undelivered"]).inc();
            DeliveryOutcome::Undelivered
        } else {
            let payload = match serde_json::to_string(event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, kind = ?event.kind, "failed to serialize notification");
                    self.metrics.notifications_total.with_label_values(&["failed"]).inc();
                    return EmittedEvent {
                        kind: event.kind,
                        recipient: event.recipient,
                        role: event.role,
                        delivery: DeliveryOutcome::Undelivered,
                    };
                }
            };

            let sends = connections
                .iter()
                .map(|conn| self.transport.send(*conn, payload.clone()));
            let results = futures::future::join_all(sends).await;

            let failed = results.iter().filter(|ok| !**ok).count();
            if failed > 0 {
                warn!(
                    recipient = %event.recipient,
                    kind = ?event.kind,
                    failed,
                    total = connections.len(),
                    "partial notification delivery"
                );
            }
            self.metrics
                .notifications_total
                .with_label_values(&["delivered"])
                .inc_by((connections.len() - failed) as u64);
            if failed > 0 {
                self.metrics
                    .notifications_total
                    .with_label_values(&["failed"])
                    .inc_by(failed as u64);
            }

            DeliveryOutcome::Delivered {
                connections: connections.len(),
                failed,
            }
        };

        EmittedEvent {
            kind: event.kind,
            recipient: event.recipient,
            role: event.role,
            delivery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct RecordingTransport {
        sent: DashMap<Uuid, Vec<String>>,
        fail_for: Option<Uuid>,
    }

    impl RecordingTransport {
        fn new(fail_for: Option<Uuid>) -> Self {
            Self {
                sent: DashMap::new(),
                fail_for,
            }
        }
    }

    #[async_trait]
    impl ConnectionTransport for RecordingTransport {
        async fn send(&self, connection_id: Uuid, payload: String) -> bool {
            if self.fail_for == Some(connection_id) {
                return false;
            }
            self.sent.entry(connection_id).or_default().push(payload);
            true
        }
    }

    fn event_for(recipient: Uuid) -> NotificationEvent {
        NotificationEvent {
            recipient,
            role: RecipientRole::Requester,
            kind: EventKind::RequestStatusChanged,
            payload: json!({"request_id": Uuid::new_v4()}),
            emitted_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_live_connection() {
        let presence = Arc::new(PresenceRegistry::new());
        let transport = Arc::new(RecordingTransport::new(None));
        let notifier = Notifier::new(presence.clone(), transport.clone(), Metrics::new());

        let user = Uuid::new_v4();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        presence.register(user, c1);
        presence.register(user, c2);

        let emitted = notifier.emit(&event_for(user)).await;

        assert_eq!(
            emitted.delivery,
            DeliveryOutcome::Delivered {
                connections: 2,
                failed: 0
            }
        );
        assert_eq!(transport.sent.get(&c1).unwrap().len(), 1);
        assert_eq!(transport.sent.get(&c2).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failing_connection_does_not_block_the_rest() {
        let presence = Arc::new(PresenceRegistry::new());
        let user = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let broken = Uuid::new_v4();
        presence.register(user, healthy);
        presence.register(user, broken);

        let transport = Arc::new(RecordingTransport::new(Some(broken)));
        let notifier = Notifier::new(presence, transport.clone(), Metrics::new());

        let emitted = notifier.emit(&event_for(user)).await;

        assert_eq!(
            emitted.delivery,
            DeliveryOutcome::Delivered {
                connections: 2,
                failed: 1
            }
        );
        assert_eq!(transport.sent.get(&healthy).unwrap().len(), 1);
        assert!(transport.sent.get(&broken).is_none());
    }

    #[tokio::test]
    async fn no_live_connections_reports_undelivered_without_queueing() {
        let presence = Arc::new(PresenceRegistry::new());
        let transport = Arc::new(RecordingTransport::new(None));
        let notifier = Notifier::new(presence.clone(), transport.clone(), Metrics::new());

        let user = Uuid::new_v4();
        let emitted = notifier.emit(&event_for(user)).await;
        assert_eq!(emitted.delivery, DeliveryOutcome::Undelivered);

        // Connecting afterwards must not replay the dropped event.
        let conn = Uuid::new_v4();
        presence.register(user, conn);
        assert!(transport.sent.get(&conn).is_none());
    }

    #[tokio::test]
    async fn channel_transport_preserves_emission_order_per_connection() {
        let presence = Arc::new(PresenceRegistry::new());
        let transport = Arc::new(ChannelTransport::new());
        let notifier = Notifier::new(presence.clone(), transport.clone(), Metrics::new());

        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        transport.attach(conn, tx);
        presence.register(user, conn);

        let mut first = event_for(user);
        first.payload = json!({"seq": 1});
        let mut second = event_for(user);
        second.payload = json!({"seq": 2});

        notifier.emit(&first).await;
        notifier.emit(&second).await;

        let a: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let b: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(a["payload"]["seq"], 1);
        assert_eq!(b["payload"]["seq"], 2);
    }

    #[tokio::test]
    async fn full_connection_buffer_drops_instead_of_blocking() {
        let transport = ChannelTransport::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        transport.attach(conn, tx);

        assert!(transport.send(conn, "first".to_string()).await);
        assert!(!transport.send(conn, "second".to_string()).await);
    }

    #[tokio::test]
    async fn detached_connection_counts_as_failed_send() {
        let transport = ChannelTransport::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);

        transport.attach(conn, tx);
        transport.detach(conn);

        assert!(!transport.send(conn, "payload".to_string()).await);
    }
}
