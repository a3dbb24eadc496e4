// ==========================================
// KandyPack Ledger - Repository layer
// ==========================================
// SQLite access for schedules, allocations and the order catalog.
// All queries are parameterized; no business rules here.
// ==========================================

pub mod allocation_repo;
pub mod error;
pub mod order_repo;
pub mod schedule_repo;

pub use allocation_repo::{AllocationRepository, NewAllocation};
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::OrderRepository;
pub use schedule_repo::{ScheduleRepository, ScheduleRouteQuery};
