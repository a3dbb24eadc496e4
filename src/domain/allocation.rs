// ==========================================
// KandyPack Ledger - Allocation domain model
// ==========================================
// An allocation reserves room on exactly one schedule for one order.
// Rail legs meter space; truck legs take a single slot.
// ==========================================

use crate::domain::types::{AllocationType, ScheduleStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// AllocationLeg - tagged by allocation_type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "allocation_type")]
pub enum AllocationLeg {
    Rail { allocated_space: f64 },
    Truck,
}

impl AllocationLeg {
    pub fn allocation_type(&self) -> AllocationType {
        match self {
            AllocationLeg::Rail { .. } => AllocationType::Rail,
            AllocationLeg::Truck => AllocationType::Truck,
        }
    }

    /// Metered space, zero for truck slots
    pub fn allocated_space(&self) -> f64 {
        match self {
            AllocationLeg::Rail { allocated_space } => *allocated_space,
            AllocationLeg::Truck => 0.0,
        }
    }
}

// ==========================================
// Allocation
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub allocation_id: String,
    pub order_id: String,
    pub schedule_id: String,
    pub shipment_date: NaiveDate,
    pub status: ScheduleStatus,
    pub seq: i64, // creation order within the ledger
    #[serde(flatten)]
    pub leg: AllocationLeg,
}

impl Allocation {
    pub fn allocation_type(&self) -> AllocationType {
        self.leg.allocation_type()
    }

    pub fn allocated_space(&self) -> f64 {
        self.leg.allocated_space()
    }

    /// Non-cancelled allocations hold capacity
    pub fn is_active(&self) -> bool {
        self.status != ScheduleStatus::Cancelled
    }
}

// ==========================================
// Allocated order view (schedule manifest)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedOrder {
    pub allocation_id: String,
    pub order_id: String,
    pub customer_id: String,
    pub deliver_city_id: String,
    pub full_price: f64,
    pub allocated_space: f64,
    pub shipment_date: NaiveDate,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAllocatedOrders {
    pub schedule_id: String,
    pub total_allocations: usize,
    pub allocations: Vec<AllocatedOrder>,
}
