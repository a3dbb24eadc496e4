// ==========================================
// KandyPack Ledger - Domain type definitions
// ==========================================
// Status vocabularies shared by schedules, allocations and orders.
// Stored in the database as SCREAMING_SNAKE_CASE strings.
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Schedule status
// ==========================================
// Forward only: PLANNED -> IN_PROGRESS -> COMPLETED
// CANCELLED is reachable from any non-terminal state.
// Allocations reuse the same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Planned,    // planned, not departed
    InProgress, // running
    Completed,  // finished
    Cancelled,  // cancelled
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ScheduleStatus {
    /// Parse a stored status string (case-insensitive)
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLANNED" => Some(ScheduleStatus::Planned),
            "IN_PROGRESS" => Some(ScheduleStatus::InProgress),
            "COMPLETED" => Some(ScheduleStatus::Completed),
            "CANCELLED" => Some(ScheduleStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Planned => "PLANNED",
            ScheduleStatus::InProgress => "IN_PROGRESS",
            ScheduleStatus::Completed => "COMPLETED",
            ScheduleStatus::Cancelled => "CANCELLED",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ScheduleStatus::Planned => 0,
            ScheduleStatus::InProgress => 1,
            ScheduleStatus::Completed => 2,
            ScheduleStatus::Cancelled => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Cancelled)
    }

    /// Whether new allocations may be placed on a schedule in this status
    pub fn is_bookable(&self) -> bool {
        matches!(self, ScheduleStatus::Planned | ScheduleStatus::InProgress)
    }

    /// Check a status change against the lifecycle
    ///
    /// # Rules
    /// - terminal states never move
    /// - CANCELLED is reachable from any non-terminal state
    /// - otherwise the status must move strictly forward
    pub fn can_transition_to(&self, next: ScheduleStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == ScheduleStatus::Cancelled {
            return true;
        }
        next.rank() > self.rank()
    }
}

// ==========================================
// Order status
// ==========================================
// PLACED -> SCHEDULED_RAIL -> IN_WAREHOUSE -> SCHEDULED_ROAD -> DELIVERED
// FAILED is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    ScheduledRail,
    InWarehouse,
    ScheduledRoad,
    Delivered,
    Failed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl OrderStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLACED" => Some(OrderStatus::Placed),
            "SCHEDULED_RAIL" => Some(OrderStatus::ScheduledRail),
            "IN_WAREHOUSE" => Some(OrderStatus::InWarehouse),
            "SCHEDULED_ROAD" => Some(OrderStatus::ScheduledRoad),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "FAILED" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::ScheduledRail => "SCHEDULED_RAIL",
            OrderStatus::InWarehouse => "IN_WAREHOUSE",
            OrderStatus::ScheduledRoad => "SCHEDULED_ROAD",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Failed)
    }

    /// Next step on the happy path, None for terminal states
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Placed => Some(OrderStatus::ScheduledRail),
            OrderStatus::ScheduledRail => Some(OrderStatus::InWarehouse),
            OrderStatus::InWarehouse => Some(OrderStatus::ScheduledRoad),
            OrderStatus::ScheduledRoad => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Failed => None,
        }
    }

    /// Only single steps along the chain, or FAILED from a non-terminal state
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == OrderStatus::Failed || self.next() == Some(next)
    }
}

// ==========================================
// Transport mode of a schedule
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Rail, // train run
    Road, // truck run (last mile)
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl TransportMode {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "RAIL" => Some(TransportMode::Rail),
            "ROAD" => Some(TransportMode::Road),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TransportMode::Rail => "RAIL",
            TransportMode::Road => "ROAD",
        }
    }
}

// ==========================================
// Allocation type (leg discriminator)
// ==========================================
// Serialized as "Rail" / "Truck" to match the REST payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationType {
    Rail,
    Truck,
}

impl fmt::Display for AllocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl AllocationType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Rail" | "RAIL" | "rail" => Some(AllocationType::Rail),
            "Truck" | "TRUCK" | "truck" => Some(AllocationType::Truck),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AllocationType::Rail => "Rail",
            AllocationType::Truck => "Truck",
        }
    }

    /// Schedule mode this leg books against
    pub fn transport_mode(&self) -> TransportMode {
        match self {
            AllocationType::Rail => TransportMode::Rail,
            AllocationType::Truck => TransportMode::Road,
        }
    }
}
