// ==========================================
// KandyPack Ledger - Engine layer
// ==========================================
// Allocation rules: capacity, duplicates, lifecycle, locking.
// No SQL here; every rejection carries its reason.
// ==========================================

pub mod allocation_ledger;
pub mod allocation_service;
pub mod capacity_calculator;
pub mod error;
pub mod lock_registry;

pub use allocation_ledger::AllocationLedger;
pub use allocation_service::{AllocationOutcome, AllocationService};
pub use capacity_calculator::{check_capacity_available, required_space, CapacityCheck};
pub use error::{AllocationError, AllocationResult};
pub use lock_registry::{order_leg_key, schedule_key, KeyedLockGuard, KeyedLockRegistry};
