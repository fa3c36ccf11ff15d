use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourierEvent {
    Accepted {
        order_id: String,
        courier_id: String,
        at: i64,
    },
    Delivered {
        order_id: String,
        courier_id: String,
        reward_points: u64,
        at: i64,
    },
    Redeemed {
        courier_id: String,
        points: u64,
        at: i64,
    },
}
