use serde::{Deserialize, Serialize};

use crate::engine::rewards::EGP_PER_POINT;
use crate::error::AppError;

/// Per-courier reward totals from the `deliveryStats` collection.
///
/// `available_points + redeemed_points == total_points` holds before and
/// after every mutation below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryStats {
    pub user_id: String,
    pub total_points: u64,
    pub total_deliveries: u64,
    pub available_points: u64,
    pub redeemed_points: u64,
    pub total_earnings: f64,
    pub last_updated: i64,
}

impl DeliveryStats {
    /// Stats for a courier with no completed deliveries.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Records one completed delivery worth `points`.
    pub fn credit(&mut self, points: u64, now: i64) {
        self.total_points += points;
        self.total_deliveries += 1;
        self.available_points += points;
        self.total_earnings += points as f64 * EGP_PER_POINT;
        self.last_updated = now;
    }

    /// Moves `points` from the spendable balance into the redeemed total.
    pub fn redeem(&mut self, points: u64, now: i64) -> Result<(), AppError> {
        if points == 0 {
            return Err(AppError::Validation(
                "points to redeem must be positive".to_string(),
            ));
        }

        if points > self.available_points {
            return Err(AppError::Validation(format!(
                "insufficient points: requested {points}, available {}",
                self.available_points
            )));
        }

        self.available_points -= points;
        self.redeemed_points += points;
        self.last_updated = now;
        Ok(())
    }

    pub fn is_balanced(&self) -> bool {
        self.available_points + self.redeemed_points == self.total_points
    }
}
