// ==========================================
// KandyPack Ledger - Domain layer
// ==========================================
// Entities, status machines and capacity value types.
// No data access, no engine logic.
// ==========================================

pub mod allocation;
pub mod capacity;
pub mod order;
pub mod schedule;
pub mod types;

pub use allocation::{AllocatedOrder, Allocation, AllocationLeg, ScheduleAllocatedOrders};
pub use capacity::{CapacityConstraint, ScheduleCapacityInfo, ValidationError};
pub use order::{Order, OrderItem, OrderWithSpace, Product};
pub use schedule::Schedule;
pub use types::{AllocationType, OrderStatus, ScheduleStatus, TransportMode};
