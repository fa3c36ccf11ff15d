use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::engine::rewards::points_value;
use crate::error::AppError;
use crate::models::event::CourierEvent;
use crate::models::now_millis;
use crate::models::stats::DeliveryStats;
use crate::store::guarded::GuardedStore;
use crate::store::{CommitOutcome, DocPath, WriteBatch};

/// Receipt for a successful points redemption.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub points: u64,
    /// Payout owed for the redeemed points, in EGP.
    pub value: f64,
    pub stats: DeliveryStats,
}

/// Per-courier points and earnings kept in the `deliveryStats` collection.
///
/// Every mutation is a read-modify-write guarded by the document version, so
/// concurrent credits and redemptions for one courier serialize instead of
/// overwriting each other.
#[derive(Clone)]
pub struct StatsLedger {
    store: GuardedStore,
    events: broadcast::Sender<CourierEvent>,
}

impl StatsLedger {
    pub fn new(store: GuardedStore, events: broadcast::Sender<CourierEvent>) -> Self {
        Self { store, events }
    }

    /// Current stats, or zeroed stats if the courier has none yet.
    pub async fn get(&self, user_id: &str) -> Result<DeliveryStats, AppError> {
        let (_, stats) = self.load(user_id).await?;
        Ok(stats)
    }

    /// Stats together with the document version they were read at (`0` when
    /// no record exists).
    pub(crate) async fn load(&self, user_id: &str) -> Result<(u64, DeliveryStats), AppError> {
        match self.store.get(&DocPath::stats(user_id)).await? {
            Some(snapshot) => {
                let mut stats: DeliveryStats = snapshot.decode()?;
                stats.user_id = user_id.to_string();
                Ok((snapshot.version, stats))
            }
            None => Ok((0, DeliveryStats::empty(user_id))),
        }
    }

    /// Records one completed delivery worth `points` for `user_id`.
    pub async fn credit(&self, user_id: &str, points: u64) -> Result<DeliveryStats, AppError> {
        require_user(user_id)?;
        let path = DocPath::stats(user_id);

        for attempt in 1..=self.max_attempts() {
            let (version, mut stats) = self.load(user_id).await?;
            stats.credit(points, now_millis());

            let batch = WriteBatch::new().set(path.clone(), Some(version), encode(&stats)?);
            match self.store.commit(batch).await? {
                CommitOutcome::Committed => {
                    self.store.metrics().points_credited_total.inc_by(points);
                    info!(courier_id = %user_id, points, total = stats.total_points, "points credited");
                    return Ok(stats);
                }
                CommitOutcome::Conflict { .. } => {
                    debug!(courier_id = %user_id, attempt, "stats changed during credit; retrying");
                }
            }
        }

        Err(self.exhausted(user_id))
    }

    /// Converts `points` of the spendable balance into redeemed points.
    ///
    /// Fails with `NotFound` when the courier has no stats record and with
    /// `Validation` when the balance is insufficient; stats are unchanged in
    /// both cases.
    pub async fn redeem(&self, user_id: &str, points: u64) -> Result<Redemption, AppError> {
        require_user(user_id)?;
        let path = DocPath::stats(user_id);

        for attempt in 1..=self.max_attempts() {
            let snapshot = self
                .store
                .get(&path)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("no delivery stats for {user_id}")))?;

            let mut stats: DeliveryStats = snapshot.decode()?;
            stats.user_id = user_id.to_string();
            let now = now_millis();
            stats.redeem(points, now)?;

            let mut fields = Map::new();
            fields.insert("availablePoints".to_string(), json!(stats.available_points));
            fields.insert("redeemedPoints".to_string(), json!(stats.redeemed_points));
            fields.insert("lastUpdated".to_string(), json!(stats.last_updated));

            let batch = WriteBatch::new().merge(path.clone(), Some(snapshot.version), fields);
            match self.store.commit(batch).await? {
                CommitOutcome::Committed => {
                    self.store.metrics().points_redeemed_total.inc_by(points);
                    info!(courier_id = %user_id, points, available = stats.available_points, "points redeemed");
                    let _ = self.events.send(CourierEvent::Redeemed {
                        courier_id: user_id.to_string(),
                        points,
                        at: now,
                    });

                    return Ok(Redemption {
                        points,
                        value: points_value(points),
                        stats,
                    });
                }
                CommitOutcome::Conflict { .. } => {
                    debug!(courier_id = %user_id, attempt, "stats changed during redeem; retrying");
                }
            }
        }

        Err(self.exhausted(user_id))
    }

    fn max_attempts(&self) -> u32 {
        self.store.policy().max_attempts.max(1)
    }

    fn exhausted(&self, user_id: &str) -> AppError {
        AppError::Conflict(format!(
            "stats for {user_id} kept changing; gave up after {} attempts",
            self.max_attempts()
        ))
    }
}

fn require_user(user_id: &str) -> Result<(), AppError> {
    if user_id.is_empty() {
        return Err(AppError::Authentication("courier id is required".to_string()));
    }
    Ok(())
}

pub(crate) fn encode(stats: &DeliveryStats) -> Result<Value, AppError> {
    serde_json::to_value(stats)
        .map_err(|err| AppError::Internal(format!("failed to encode stats: {err}")))
}
