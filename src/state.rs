use std::sync::Arc;

use tokio::sync::broadcast;

use crate::engine::assignment::DeliveryEngine;
use crate::engine::ledger::StatsLedger;
use crate::engine::profiles::ProfileDirectory;
use crate::models::event::CourierEvent;
use crate::observability::metrics::Metrics;
use crate::store::guarded::{GuardedStore, RetryPolicy};
use crate::store::DocumentStore;

pub struct AppState {
    pub engine: DeliveryEngine,
    pub ledger: StatsLedger,
    pub profiles: ProfileDirectory,
    pub events_tx: broadcast::Sender<CourierEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        policy: RetryPolicy,
        event_buffer_size: usize,
    ) -> Self {
        let metrics = Metrics::new();
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        let guarded = GuardedStore::new(store, policy, metrics.clone());
        let ledger = StatsLedger::new(guarded.clone(), events_tx.clone());
        let profiles = ProfileDirectory::new(guarded.clone());
        let engine = DeliveryEngine::new(guarded, ledger.clone(), profiles.clone(), events_tx.clone());

        Self {
            engine,
            ledger,
            profiles,
            events_tx,
            metrics,
        }
    }
}
