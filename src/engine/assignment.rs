use serde::Serialize;
use serde_json::{json, Map};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::engine::ledger::{self, StatsLedger};
use crate::engine::profiles::ProfileDirectory;
use crate::engine::rewards::compute_reward_points;
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::event::CourierEvent;
use crate::models::now_millis;
use crate::models::order::{Order, OrderStatus};
use crate::models::stats::DeliveryStats;
use crate::store::guarded::GuardedStore;
use crate::store::{Collection, CommitOutcome, DocPath, Snapshot, WriteBatch};

/// Result of marking an order delivered.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub order: Order,
    /// Points credited by this call; `0` when the order was already delivered.
    pub points_awarded: u64,
    pub already_delivered: bool,
    /// The courier's stats after crediting, when a courier was credited.
    pub stats: Option<DeliveryStats>,
}

/// Claims orders for couriers and completes deliveries.
///
/// Claims are conditional on the order still being unassigned, and a
/// delivery writes the order transition and the courier's points in one
/// atomic batch.
pub struct DeliveryEngine {
    store: GuardedStore,
    ledger: StatsLedger,
    profiles: ProfileDirectory,
    events: broadcast::Sender<CourierEvent>,
}

impl DeliveryEngine {
    pub fn new(
        store: GuardedStore,
        ledger: StatsLedger,
        profiles: ProfileDirectory,
        events: broadcast::Sender<CourierEvent>,
    ) -> Self {
        Self {
            store,
            ledger,
            profiles,
            events,
        }
    }

    pub fn ledger(&self) -> &StatsLedger {
        &self.ledger
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CourierEvent> {
        self.events.subscribe()
    }

    /// Orders out for delivery that no courier has claimed.
    pub async fn list_available_orders(&self) -> Result<Vec<Order>, AppError> {
        let snapshots = self
            .store
            .query_eq(
                Collection::Orders,
                "status",
                &json!(OrderStatus::Delivering.as_str()),
            )
            .await?;

        Ok(decode_orders(&snapshots)
            .into_iter()
            .filter(Order::is_available)
            .collect())
    }

    /// Orders the courier has claimed and not yet delivered.
    pub async fn list_my_deliveries(&self, courier_id: &str) -> Result<Vec<Order>, AppError> {
        require_courier(courier_id)?;

        let snapshots = self
            .store
            .query_eq(Collection::Orders, "deliveryPersonId", &json!(courier_id))
            .await?;

        Ok(decode_orders(&snapshots)
            .into_iter()
            .filter(|order| order.is_assigned_to(courier_id))
            .collect())
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, AppError> {
        let snapshot = self.read_order(order_id).await?;
        Ok(Order::from_snapshot(&snapshot)?)
    }

    /// Claims `order_id` for `courier` if it is still available.
    ///
    /// Returns `false` when the order is delivered or claimed by someone
    /// else. Claiming an order the courier already holds returns `true`.
    pub async fn try_accept(&self, order_id: &str, courier: &Courier) -> Result<bool, AppError> {
        require_courier(&courier.id)?;
        let path = DocPath::order(order_id);

        for attempt in 1..=self.max_attempts() {
            let snapshot = self.read_order(order_id).await?;
            let order = Order::from_snapshot(&snapshot)?;

            if order.is_assigned_to(&courier.id) {
                return Ok(true);
            }

            if !order.is_available() {
                self.store
                    .metrics()
                    .order_accepts_total
                    .with_label_values(&["rejected"])
                    .inc();
                info!(
                    order_id,
                    courier_id = %courier.id,
                    holder = %order.delivery_person_id,
                    status = order.status.as_str(),
                    "order is no longer available"
                );
                return Ok(false);
            }

            let mut fields = Map::new();
            fields.insert("deliveryPersonId".to_string(), json!(courier.id));
            fields.insert("deliveryPersonName".to_string(), json!(courier.name));

            let batch = WriteBatch::new().merge(path.clone(), Some(snapshot.version), fields);
            match self.store.commit(batch).await? {
                CommitOutcome::Committed => {
                    self.store
                        .metrics()
                        .order_accepts_total
                        .with_label_values(&["accepted"])
                        .inc();
                    info!(order_id, courier_id = %courier.id, "order accepted");
                    let _ = self.events.send(CourierEvent::Accepted {
                        order_id: order_id.to_string(),
                        courier_id: courier.id.clone(),
                        at: now_millis(),
                    });
                    return Ok(true);
                }
                CommitOutcome::Conflict { .. } => {
                    debug!(order_id, attempt, "order changed during accept; re-reading");
                }
            }
        }

        Err(self.exhausted(order_id))
    }

    /// Claims `order_id` and returns the updated order.
    ///
    /// The stored display name comes from the courier's profile when one
    /// exists, otherwise from `courier.name`.
    pub async fn accept_order(&self, order_id: &str, courier: &Courier) -> Result<Order, AppError> {
        require_courier(&courier.id)?;

        let courier = Courier::new(courier.id.clone(), self.display_name(courier).await);

        if !self.try_accept(order_id, &courier).await? {
            return Err(AppError::Conflict(format!(
                "order {order_id} is no longer available"
            )));
        }

        self.get_order(order_id).await
    }

    /// Marks `order_id` delivered and credits its reward points to
    /// `courier` in the same atomic write.
    ///
    /// A courier delivering an unassigned order is recorded as its delivery
    /// person. An empty courier id completes the order without crediting
    /// anyone. Repeating the call for a delivered order credits nothing and
    /// reports `already_delivered`.
    pub async fn mark_delivered(
        &self,
        order_id: &str,
        courier: &Courier,
    ) -> Result<DeliveryReceipt, AppError> {
        let courier_id = courier.id.as_str();
        let order_path = DocPath::order(order_id);

        for attempt in 1..=self.max_attempts() {
            let snapshot = self.read_order(order_id).await?;
            let mut order = Order::from_snapshot(&snapshot)?;

            if order.is_delivered() {
                info!(order_id, "order already delivered; nothing to credit");
                return Ok(DeliveryReceipt {
                    order,
                    points_awarded: 0,
                    already_delivered: true,
                    stats: None,
                });
            }

            if order.status != OrderStatus::Delivering {
                return Err(AppError::Conflict(format!(
                    "order {order_id} is not out for delivery"
                )));
            }

            if !courier_id.is_empty()
                && !order.delivery_person_id.is_empty()
                && order.delivery_person_id != courier_id
            {
                return Err(AppError::Conflict(format!(
                    "order {order_id} is assigned to another courier"
                )));
            }

            let points = compute_reward_points(order.total_price);
            let now = now_millis();

            let mut fields = Map::new();
            fields.insert("status".to_string(), json!(OrderStatus::Delivered.as_str()));
            fields.insert("deliveredAt".to_string(), json!(now));
            fields.insert("rewardPoints".to_string(), json!(points));

            // Unassigned orders are claimed by whoever delivers them.
            let claimed_name = if !courier_id.is_empty() && order.delivery_person_id.is_empty() {
                let name = self.display_name(courier).await;
                fields.insert("deliveryPersonId".to_string(), json!(courier_id));
                fields.insert("deliveryPersonName".to_string(), json!(name));
                Some(name)
            } else {
                None
            };

            let mut batch =
                WriteBatch::new().merge(order_path.clone(), Some(snapshot.version), fields);

            let stats = if courier_id.is_empty() {
                None
            } else {
                let (version, mut stats) = self.ledger.load(courier_id).await?;
                stats.credit(points, now);
                batch = batch.set(
                    DocPath::stats(courier_id),
                    Some(version),
                    ledger::encode(&stats)?,
                );
                Some(stats)
            };

            match self.store.commit(batch).await? {
                CommitOutcome::Committed => {
                    order.status = OrderStatus::Delivered;
                    order.delivered_at = now;
                    order.reward_points = points;
                    if let Some(name) = claimed_name {
                        order.delivery_person_id = courier_id.to_string();
                        order.delivery_person_name = name;
                    }

                    let metrics = self.store.metrics();
                    metrics.deliveries_completed_total.inc();
                    if stats.is_some() {
                        metrics.points_credited_total.inc_by(points);
                    }

                    info!(order_id, courier_id, points, "order delivered");
                    let _ = self.events.send(CourierEvent::Delivered {
                        order_id: order_id.to_string(),
                        courier_id: courier_id.to_string(),
                        reward_points: points,
                        at: now,
                    });

                    return Ok(DeliveryReceipt {
                        order,
                        points_awarded: points,
                        already_delivered: false,
                        stats,
                    });
                }
                CommitOutcome::Conflict { path } => {
                    debug!(order_id, attempt, conflict = %path, "delivery raced another write; retrying");
                }
            }
        }

        Err(self.exhausted(order_id))
    }

    /// Name to store on an order: the profile name when the profile has one,
    /// otherwise the name the courier signed in with.
    async fn display_name(&self, courier: &Courier) -> String {
        match self.profiles.get(&courier.id).await {
            Ok(Some(profile)) if !profile.name.is_empty() => profile.name,
            Ok(_) => courier.name.clone(),
            Err(err) => {
                warn!(
                    courier_id = %courier.id,
                    error = %err,
                    "courier profile unreadable; using sign-in name"
                );
                courier.name.clone()
            }
        }
    }

    async fn read_order(&self, order_id: &str) -> Result<Snapshot, AppError> {
        self.store
            .get(&DocPath::order(order_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    fn max_attempts(&self) -> u32 {
        self.store.policy().max_attempts.max(1)
    }

    fn exhausted(&self, order_id: &str) -> AppError {
        AppError::Conflict(format!(
            "order {order_id} kept changing; gave up after {} attempts",
            self.max_attempts()
        ))
    }
}

fn require_courier(courier_id: &str) -> Result<(), AppError> {
    if courier_id.is_empty() {
        return Err(AppError::Authentication("courier id is required".to_string()));
    }
    Ok(())
}

/// Decodes order documents, skipping ones that are malformed.
fn decode_orders(snapshots: &[Snapshot]) -> Vec<Order> {
    snapshots
        .iter()
        .filter_map(|snapshot| match Order::from_snapshot(snapshot) {
            Ok(order) => Some(order),
            Err(err) => {
                warn!(order_id = %snapshot.id, error = %err, "skipping malformed order");
                None
            }
        })
        .collect()
}
