// ==========================================
// KandyPack Ledger - Core library
// ==========================================
// Capacity allocation ledger for rail and truck schedules.
// Stack: Rust + SQLite (rusqlite)
// ==========================================

// ==========================================
// Modules
// ==========================================

// Domain - entities and types
pub mod domain;

// Repository - data access
pub mod repository;

// Engine - allocation rules
pub mod engine;

// Configuration
pub mod config;

// Database infrastructure (connection setup / PRAGMAs / schema)
pub mod db;

// Logging
pub mod logging;

// API - request/response shapes
pub mod api;

// ==========================================
// Re-exports
// ==========================================

pub use domain::types::{AllocationType, OrderStatus, ScheduleStatus, TransportMode};

pub use domain::{
    AllocatedOrder, Allocation, AllocationLeg, Order, OrderItem, OrderWithSpace, Product,
    Schedule, ScheduleAllocatedOrders, ScheduleCapacityInfo,
};

pub use engine::{
    AllocationError, AllocationLedger, AllocationOutcome, AllocationResult, AllocationService,
};

pub use api::{AllocationApi, ApiError};

pub use config::{ConfigManager, LedgerSettings};

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "KandyPack Ledger";
