// ==========================================
// KandyPack Ledger - Order domain model
// ==========================================
// Orders, their items and the product catalog rows the ledger reads.
// The ledger references orders; it never owns them.
// ==========================================

use crate::domain::types::OrderStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub order_date: NaiveDate,
    pub deliver_address: String,
    pub deliver_city_id: String,
    pub full_price: f64,
    pub status: OrderStatus,
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: String,
    pub order_id: String,
    pub store_id: String,
    pub product_type_id: String,
    pub quantity: i64,
    pub item_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_type_id: String,
    pub product_name: String,
    pub space_consumption_rate: f64, // space units per item
}

/// Order together with its computed rail space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithSpace {
    #[serde(flatten)]
    pub order: Order,
    pub calculated_space: f64,
    pub items: Vec<OrderItem>,
}
