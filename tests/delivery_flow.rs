use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use delivery_rewards::error::AppError;
use delivery_rewards::models::courier::Courier;
use delivery_rewards::models::event::CourierEvent;
use delivery_rewards::models::order::OrderStatus;
use delivery_rewards::state::AppState;
use delivery_rewards::store::guarded::RetryPolicy;
use delivery_rewards::store::memory::InMemoryStore;
use delivery_rewards::store::{
    Collection, CommitOutcome, DocPath, DocumentStore, Snapshot, StoreError, WriteBatch,
};
use serde_json::{json, Map, Value};

fn patient_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 200,
        call_timeout: Duration::from_secs(5),
        backoff: Duration::from_millis(1),
    }
}

async fn seeded_store(orders: &[(&str, f64)]) -> InMemoryStore {
    let store = InMemoryStore::new();
    for (id, total) in orders {
        store
            .set(
                &DocPath::order(*id),
                json!({
                    "status": "delivering",
                    "totalPrice": total,
                    "deliveryPersonId": "",
                    "deliveryPersonName": ""
                }),
            )
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn accept_then_deliver_scenario() {
    let store = seeded_store(&[("o-150", 150.0)]).await;
    let state = AppState::new(Arc::new(store), RetryPolicy::default(), 64);
    let mut events = state.engine.subscribe();
    let courier = Courier::new("courier-a", "Ahmed");

    state.engine.accept_order("o-150", &courier).await.unwrap();

    let available = state.engine.list_available_orders().await.unwrap();
    assert!(available.iter().all(|order| order.order_id != "o-150"));

    let mine = state.engine.list_my_deliveries("courier-a").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].order_id, "o-150");

    let receipt = state.engine.mark_delivered("o-150", &courier).await.unwrap();
    assert_eq!(receipt.order.status, OrderStatus::Delivered);
    assert_eq!(receipt.order.reward_points, 15);

    let stats = state.ledger.get("courier-a").await.unwrap();
    assert_eq!(stats.total_points, 15);
    assert_eq!(stats.total_earnings, 7.5);

    assert!(matches!(events.recv().await.unwrap(), CourierEvent::Accepted { .. }));
    match events.recv().await.unwrap() {
        CourierEvent::Delivered {
            order_id,
            courier_id,
            reward_points,
            ..
        } => {
            assert_eq!(order_id, "o-150");
            assert_eq!(courier_id, "courier-a");
            assert_eq!(reward_points, 15);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_couriers_produce_exactly_one_winner() {
    let store = seeded_store(&[("contested", 80.0)]).await;
    let state = Arc::new(AppState::new(Arc::new(store), patient_policy(), 64));

    let mut handles = Vec::new();
    for n in 0..16 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let courier = Courier::new(format!("courier-{n}"), format!("Courier {n}"));
            let won = state.engine.try_accept("contested", &courier).await.unwrap();
            (courier.id, won)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (id, won) = handle.await.unwrap();
        if won {
            winners.push(id);
        }
    }

    assert_eq!(winners.len(), 1);
    let order = state.engine.get_order("contested").await.unwrap();
    assert_eq!(order.delivery_person_id, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_credits_are_not_lost() {
    let state = Arc::new(AppState::new(
        Arc::new(InMemoryStore::new()),
        patient_policy(),
        64,
    ));

    let mut handles = Vec::new();
    for n in 0..20u64 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let points = if n % 2 == 0 { 10 } else { 15 };
            state.ledger.credit("courier-a", points).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = state.ledger.get("courier-a").await.unwrap();
    assert_eq!(stats.total_deliveries, 20);
    assert_eq!(stats.total_points, 10 * 10 + 10 * 15);
    assert_eq!(stats.total_earnings, 125.0);
    assert!(stats.is_balanced());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_never_overdraw() {
    let state = Arc::new(AppState::new(
        Arc::new(InMemoryStore::new()),
        patient_policy(),
        64,
    ));
    state.ledger.credit("courier-a", 50).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.ledger.redeem("courier-a", 8).await.is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 6);
    let stats = state.ledger.get("courier-a").await.unwrap();
    assert_eq!(stats.available_points, 2);
    assert_eq!(stats.redeemed_points, 48);
    assert!(stats.is_balanced());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_deliveries_credit_once() {
    let store = seeded_store(&[("o-1", 120.0)]).await;
    let state = Arc::new(AppState::new(Arc::new(store), patient_policy(), 64));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.engine.mark_delivered("o-1", &Courier::new("courier-a", "Ahmed")).await.unwrap()
        }));
    }

    let mut fresh = 0;
    for handle in handles {
        if !handle.await.unwrap().already_delivered {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1);
    let order = state.engine.get_order("o-1").await.unwrap();
    assert_eq!(order.delivery_person_id, "courier-a");
    assert_eq!(order.delivery_person_name, "Ahmed");
    let stats = state.ledger.get("courier-a").await.unwrap();
    assert_eq!(stats.total_deliveries, 1);
    assert_eq!(stats.total_points, 15);
}

#[tokio::test]
async fn balance_invariant_survives_mixed_operations() {
    let orders: Vec<(String, f64)> = (0..12)
        .map(|n| (format!("o-{n}"), if n % 3 == 0 { 100.0 } else { 45.0 }))
        .collect();
    let refs: Vec<(&str, f64)> = orders.iter().map(|(id, total)| (id.as_str(), *total)).collect();
    let store = seeded_store(&refs).await;
    let state = AppState::new(Arc::new(store), RetryPolicy::default(), 64);
    let courier = Courier::new("courier-a", "Ahmed");

    for (n, (id, _)) in orders.iter().enumerate() {
        state.engine.mark_delivered(id, &courier).await.unwrap();
        let outcome = state.ledger.redeem("courier-a", (n as u64 * 7) % 23).await;
        if let Err(err) = outcome {
            assert!(matches!(err, AppError::Validation(_)));
        }

        let stats = state.ledger.get("courier-a").await.unwrap();
        assert!(stats.is_balanced());
        assert_eq!(stats.total_deliveries, n as u64 + 1);
    }

    let stats = state.ledger.get("courier-a").await.unwrap();
    assert_eq!(stats.total_points, 4 * 15 + 8 * 10);
}

/// Wraps a store and makes its first `failures` commits fail as if the
/// backend were unreachable.
struct FlakyStore {
    inner: InMemoryStore,
    failures: AtomicU32,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError> {
        self.inner.get(path).await
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Snapshot>, StoreError> {
        self.inner.query_eq(collection, field, value).await
    }

    async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        self.inner.set(path, value).await
    }

    async fn merge(&self, path: &DocPath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.merge(path, fields).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.commit(batch).await
    }
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let inner = seeded_store(&[("o-1", 150.0)]).await;
    let flaky = FlakyStore {
        inner: inner.clone(),
        failures: AtomicU32::new(2),
    };
    let policy = RetryPolicy {
        max_attempts: 3,
        call_timeout: Duration::from_secs(1),
        backoff: Duration::from_millis(1),
    };
    let state = AppState::new(Arc::new(flaky), policy, 16);

    let receipt = state.engine.mark_delivered("o-1", &Courier::new("courier-a", "Ahmed")).await.unwrap();
    assert_eq!(receipt.points_awarded, 15);
    assert_eq!(state.ledger.get("courier-a").await.unwrap().total_points, 15);
}

#[tokio::test]
async fn persistent_store_failure_leaves_order_and_stats_untouched() {
    let inner = seeded_store(&[("o-1", 150.0)]).await;
    let flaky = FlakyStore {
        inner: inner.clone(),
        failures: AtomicU32::new(10),
    };
    let policy = RetryPolicy {
        max_attempts: 2,
        call_timeout: Duration::from_secs(1),
        backoff: Duration::from_millis(1),
    };
    let state = AppState::new(Arc::new(flaky), policy, 16);

    let result = state.engine.mark_delivered("o-1", &Courier::new("courier-a", "Ahmed")).await;
    assert!(matches!(result, Err(AppError::Store(_))));

    let order = inner.get(&DocPath::order("o-1")).await.unwrap().unwrap();
    assert_eq!(order.data["status"], "delivering");
    assert!(inner.get(&DocPath::stats("courier-a")).await.unwrap().is_none());
}
