use serde::{Deserialize, Serialize};

use crate::store::{Snapshot, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Delivering,
    Delivered,
    /// Any status string other than the two above, including a missing one.
    #[default]
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub product_price: f64,
    pub quantity: u32,
    pub subtotal: f64,
}

/// An order document from the `orders` collection.
///
/// Assignment fields use the empty string as the "unassigned" sentinel, and
/// timestamps use `0` for "not set", matching the stored document shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub order_id: String,
    pub buyer_id: String,
    pub buyer_name: String,
    pub shop_id: String,
    pub shop_name: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total_price: f64,
    pub status: OrderStatus,
    pub payment_method: String,
    pub address: String,
    pub delivery_zone: String,
    pub delivery_id: String,
    pub delivery_person_id: String,
    pub delivery_person_name: String,
    pub reward_points: u64,
    pub created_at: i64,
    pub delivered_at: i64,
}

impl Order {
    /// Decodes a stored order, taking its id from the document key.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StoreError> {
        let mut order: Order = snapshot.decode()?;
        order.order_id = snapshot.id.clone();
        Ok(order)
    }

    /// Out for delivery and not yet claimed by any courier.
    pub fn is_available(&self) -> bool {
        self.status == OrderStatus::Delivering && self.delivery_person_id.is_empty()
    }

    /// Out for delivery and claimed by `courier_id`.
    pub fn is_assigned_to(&self, courier_id: &str) -> bool {
        self.status == OrderStatus::Delivering
            && !courier_id.is_empty()
            && self.delivery_person_id == courier_id
    }

    pub fn is_delivered(&self) -> bool {
        self.status == OrderStatus::Delivered
    }
}
