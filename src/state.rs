use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::engine::coordinator::DispatchCoordinator;
use crate::engine::matcher::{MatchingPolicy, RosterPolicy};
use crate::models::driver::Driver;
use crate::notify::{ChannelTransport, Notifier};
use crate::observability::metrics::Metrics;
use crate::presence::PresenceRegistry;
use crate::store::{EntityStore, MemoryStore};

pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub drivers: Arc<DashMap<Uuid, Driver>>,
    pub presence: Arc<PresenceRegistry>,
    pub transport: Arc<ChannelTransport>,
    pub coordinator: DispatchCoordinator,
    pub policy: Arc<dyn MatchingPolicy>,
    pub match_tx: mpsc::Sender<Uuid>,
    pub connection_buffer_size: usize,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        match_queue_size: usize,
        connection_buffer_size: usize,
    ) -> (Self, mpsc::Receiver<Uuid>) {
        let (match_tx, match_rx) = mpsc::channel(match_queue_size);

        let metrics = Metrics::new();
        let store: Arc<dyn EntityStore> = Arc::new(MemoryStore::new());
        let drivers = Arc::new(DashMap::new());
        let presence = Arc::new(PresenceRegistry::new());
        let transport = Arc::new(ChannelTransport::new());
        let notifier = Arc::new(Notifier::new(
            presence.clone(),
            transport.clone(),
            metrics.clone(),
        ));
        let coordinator = DispatchCoordinator::new(
            store.clone(),
            notifier,
            match_tx.clone(),
            metrics.clone(),
        );
        let policy: Arc<dyn MatchingPolicy> = Arc::new(RosterPolicy::new(drivers.clone()));

        (
            Self {
                store,
                drivers,
                presence,
                transport,
                coordinator,
                policy,
                match_tx,
                connection_buffer_size,
                metrics,
            },
            match_rx,
        )
    }
}
