use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Process-local registry of live connections per user identity. Nothing here
/// is persisted; a restart clears the registry and clients reconnect.
///
/// A user may hold any number of connections (one per device/tab). Unregister
/// is keyed by connection id alone so transport teardown does not need to
/// know which user the socket belonged to.
#[derive(Default)]
pub struct PresenceRegistry {
    connections: DashMap<Uuid, HashMap<Uuid, DateTime<Utc>>>,
    owners: DashMap<Uuid, Uuid>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-registering an existing connection keeps its original
    /// connected-at timestamp.
    pub fn register(&self, user_id: Uuid, connection_id: Uuid) {
        self.owners.insert(connection_id, user_id);
        self.connections
            .entry(user_id)
            .or_default()
            .entry(connection_id)
            .or_insert_with(Utc::now);
    }

    /// No-op for unknown connections. Safe against concurrent registers for
    /// other connections of the same user: the per-user map is only touched
    /// under its DashMap entry lock.
    pub fn unregister(&self, connection_id: Uuid) {
        let Some((_, user_id)) = self.owners.remove(&connection_id) else {
            return;
        };

        if let Some(mut entry) = self.connections.get_mut(&user_id) {
            entry.remove(&connection_id);
        }
        self.connections.remove_if(&user_id, |_, conns| conns.is_empty());
    }

    /// Snapshot of the user's live connections. Inherently racy with
    /// disconnects; callers must tolerate sends to a connection that has
    /// gone away since the call.
    pub fn connections_for(&self, user_id: Uuid) -> Vec<Uuid> {
        self.connections
            .get(&user_id)
            .map(|entry| entry.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }

    pub fn user_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_connections_per_user_tracked_independently() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();

        registry.register(user, c1);
        registry.register(user, c2);

        let mut live = registry.connections_for(user);
        live.sort();
        let mut expected = vec![c1, c2];
        expected.sort();
        assert_eq!(live, expected);

        registry.unregister(c1);
        assert_eq!(registry.connections_for(user), vec![c2]);

        registry.unregister(c2);
        assert!(registry.connections_for(user).is_empty());
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn register_is_idempotent() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();

        registry.register(user, conn);
        registry.register(user, conn);

        assert_eq!(registry.connections_for(user).len(), 1);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn unregister_unknown_connection_is_noop() {
        let registry = PresenceRegistry::new();
        registry.unregister(Uuid::new_v4());
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_connect_disconnect_does_not_lose_entries() {
        use std::sync::Arc;

        let registry = Arc::new(PresenceRegistry::new());
        let user = Uuid::new_v4();
        let keeper = Uuid::new_v4();
        registry.register(user, keeper);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let conn = Uuid::new_v4();
                registry.register(user, conn);
                registry.unregister(conn);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.connections_for(user), vec![keeper]);
    }
}
