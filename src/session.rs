use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use crate::engine::assignment::DeliveryReceipt;
use crate::engine::ledger::Redemption;
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::order::Order;
use crate::models::stats::DeliveryStats;
use crate::state::AppState;

/// State of a request as seen by a screen: still running, finished with a
/// payload, or failed with a message to show.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum Resource<T> {
    #[default]
    Loading,
    Success(T),
    Error(String),
}

impl<T> Resource<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Resource::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Resource::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Resource::Loading => Resource::Loading,
            Resource::Success(data) => Resource::Success(f(data)),
            Resource::Error(message) => Resource::Error(message),
        }
    }
}

impl<T> From<Result<T, AppError>> for Resource<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Resource::Success(data),
            Err(err) => Resource::Error(err.to_string()),
        }
    }
}

/// The courier-facing facade: every operation runs on behalf of the
/// signed-in courier and settles into a [`Resource`], never an error.
pub struct CourierSession {
    state: Arc<AppState>,
    courier: Option<Courier>,
}

impl CourierSession {
    pub fn new(state: Arc<AppState>, courier: Option<Courier>) -> Self {
        Self { state, courier }
    }

    pub fn courier(&self) -> Option<&Courier> {
        self.courier.as_ref()
    }

    fn signed_in(&self) -> Result<&Courier, AppError> {
        self.courier
            .as_ref()
            .filter(|courier| !courier.id.is_empty())
            .ok_or_else(|| AppError::Authentication("no courier is signed in".to_string()))
    }

    pub async fn available_orders(&self) -> Resource<Vec<Order>> {
        settle(
            "fetch available orders",
            self.state.engine.list_available_orders().await,
        )
    }

    pub async fn my_deliveries(&self) -> Resource<Vec<Order>> {
        let result = match self.signed_in() {
            Ok(courier) => self.state.engine.list_my_deliveries(&courier.id).await,
            Err(err) => Err(err),
        };
        settle("fetch my deliveries", result)
    }

    pub async fn accept(&self, order_id: &str) -> Resource<Order> {
        let result = match self.signed_in() {
            Ok(courier) => self.state.engine.accept_order(order_id, courier).await,
            Err(err) => Err(err),
        };
        settle("accept order", result)
    }

    pub async fn mark_delivered(&self, order_id: &str) -> Resource<DeliveryReceipt> {
        let result = match self.signed_in() {
            Ok(courier) => self.state.engine.mark_delivered(order_id, courier).await,
            Err(err) => Err(err),
        };
        settle("mark order delivered", result)
    }

    pub async fn stats(&self) -> Resource<DeliveryStats> {
        let result = match self.signed_in() {
            Ok(courier) => self.state.ledger.get(&courier.id).await,
            Err(err) => Err(err),
        };
        settle("fetch delivery stats", result)
    }

    pub async fn redeem(&self, points: u64) -> Resource<Redemption> {
        let result = match self.signed_in() {
            Ok(courier) => self.state.ledger.redeem(&courier.id, points).await,
            Err(err) => Err(err),
        };
        settle("redeem points", result)
    }
}

fn settle<T>(action: &str, result: Result<T, AppError>) -> Resource<T> {
    if let Err(err) = &result {
        error!(action, error = %err, "courier request failed");
    }
    result.into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::guarded::RetryPolicy;
    use crate::store::memory::InMemoryStore;
    use crate::store::{DocPath, DocumentStore};

    async fn session(courier: Option<Courier>) -> CourierSession {
        let store = InMemoryStore::new();
        store
            .set(
                &DocPath::order("o-1"),
                json!({ "status": "delivering", "totalPrice": 120.0 }),
            )
            .await
            .unwrap();
        let state = AppState::new(Arc::new(store), RetryPolicy::default(), 16);
        CourierSession::new(Arc::new(state), courier)
    }

    #[test]
    fn default_state_is_loading() {
        let resource: Resource<u8> = Resource::default();
        assert!(resource.is_loading());
        assert_eq!(resource.data(), None);
    }

    #[test]
    fn results_settle_into_success_or_message() {
        let ok: Resource<u8> = Ok(3).into();
        assert_eq!(ok.data(), Some(&3));

        let failed: Resource<u8> = Err(AppError::Validation("insufficient points".to_string())).into();
        assert_eq!(failed.message(), Some("invalid request: insufficient points"));
        assert_eq!(failed.map(|n| n + 1).message(), Some("invalid request: insufficient points"));
    }

    #[test]
    fn serializes_with_state_tag() {
        let ok: Resource<u8> = Resource::Success(5);
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "state": "success", "data": 5 }));

        let loading: Resource<u8> = Resource::Loading;
        assert_eq!(serde_json::to_value(&loading).unwrap(), json!({ "state": "loading" }));
    }

    #[tokio::test]
    async fn signed_out_session_reports_errors() {
        let session = session(None).await;

        assert_eq!(session.available_orders().await.data().map(Vec::len), Some(1));
        assert!(session.accept("o-1").await.message().is_some());
        assert!(session.stats().await.message().is_some());
        assert!(session.my_deliveries().await.message().is_some());
    }

    #[tokio::test]
    async fn signed_in_session_runs_the_delivery_flow() {
        let session = session(Some(Courier::new("a", "Amr"))).await;

        let order = session.accept("o-1").await;
        assert_eq!(order.data().map(|o| o.delivery_person_name.as_str()), Some("Amr"));
        assert_eq!(session.my_deliveries().await.data().map(Vec::len), Some(1));

        let receipt = session.mark_delivered("o-1").await;
        assert_eq!(receipt.data().map(|r| r.points_awarded), Some(15));

        let redemption = session.redeem(10).await;
        assert_eq!(redemption.data().map(|r| r.value), Some(5.0));

        let stats = session.stats().await;
        assert_eq!(stats.data().map(|s| s.available_points), Some(5));
        assert!(session.redeem(50).await.message().is_some());
    }
}
