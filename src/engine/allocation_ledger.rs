// ==========================================
// KandyPack Ledger - Allocation ledger
// ==========================================
// Registry of allocations per schedule, enforcing:
// - rail: sum(allocated_space of non-cancelled rail allocations) <= capacity
// - one non-cancelled allocation per order per leg
// - bookings only on PLANNED / IN_PROGRESS schedules
// ==========================================
// Writes on a schedule run under its key in the lock registry;
// creation also holds the order-leg key.
// ==========================================

use crate::config::LedgerSettings;
use crate::domain::allocation::{Allocation, AllocationLeg, ScheduleAllocatedOrders};
use crate::domain::capacity::{CapacityConstraint, ScheduleCapacityInfo};
use crate::domain::schedule::Schedule;
use crate::domain::types::{AllocationType, ScheduleStatus};
use crate::engine::capacity_calculator::{
    capacity_info, check_capacity_available, required_space,
};
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::lock_registry::{order_leg_key, schedule_key, KeyedLockRegistry};
use crate::repository::{
    AllocationRepository, NewAllocation, OrderRepository, RepositoryError, ScheduleRepository,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::instrument;
use uuid::Uuid;

pub struct AllocationLedger {
    schedule_repo: Arc<ScheduleRepository>,
    allocation_repo: Arc<AllocationRepository>,
    order_repo: Arc<OrderRepository>,
    locks: KeyedLockRegistry,
    settings: LedgerSettings,
}

fn require_id(field: &str, value: &str) -> AllocationResult<()> {
    if value.trim().is_empty() {
        return Err(AllocationError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl AllocationLedger {
    pub fn new(
        schedule_repo: Arc<ScheduleRepository>,
        allocation_repo: Arc<AllocationRepository>,
        order_repo: Arc<OrderRepository>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            schedule_repo,
            allocation_repo,
            order_repo,
            locks: KeyedLockRegistry::new(),
            settings,
        }
    }

    /// Build all repositories over one shared connection
    pub fn from_connection(conn: Arc<Mutex<Connection>>, settings: LedgerSettings) -> Self {
        Self::new(
            Arc::new(ScheduleRepository::new(conn.clone())),
            Arc::new(AllocationRepository::new(conn.clone())),
            Arc::new(OrderRepository::new(conn)),
            settings,
        )
    }

    /// Settings the ledger was built with
    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Shared by every booking and cancel on this ledger
    pub fn lock_registry(&self) -> &KeyedLockRegistry {
        &self.locks
    }

    /// Order rows are owned by the order system; the ledger only reads them
    pub fn order_repo(&self) -> &Arc<OrderRepository> {
        &self.order_repo
    }

    pub fn schedule_repo(&self) -> &Arc<ScheduleRepository> {
        &self.schedule_repo
    }

    // ==========================================
    // Schedules
    // ==========================================

    /// Validate and store a schedule produced by planning
    #[instrument(skip(self, schedule), fields(schedule_id = %schedule.schedule_id))]
    pub fn register_schedule(&self, schedule: &Schedule) -> AllocationResult<()> {
        schedule.validate()?;
        match self.schedule_repo.insert(schedule) {
            Ok(()) => {
                tracing::info!(mode = %schedule.mode, capacity = schedule.capacity, "schedule registered");
                Ok(())
            }
            Err(RepositoryError::UniqueConstraintViolation(_)) => Err(AllocationError::Validation(
                format!("schedule {} already exists", schedule.schedule_id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a schedule, `NotFound` when it was never registered
    pub fn find_schedule(&self, schedule_id: &str) -> AllocationResult<Schedule> {
        self.schedule_repo
            .find_by_id(schedule_id)?
            .ok_or_else(|| AllocationError::not_found("Schedule", schedule_id))
    }

    /// Move a schedule along its lifecycle
    #[instrument(skip(self))]
    pub fn update_schedule_status(
        &self,
        schedule_id: &str,
        next: ScheduleStatus,
    ) -> AllocationResult<Schedule> {
        let _guard = self
            .locks
            .acquire(&schedule_key(schedule_id), self.settings.lock_wait_timeout())?;

        let mut schedule = self.find_schedule(schedule_id)?;
        if !schedule.status.can_transition_to(next) {
            return Err(AllocationError::InvalidStateTransition {
                from: schedule.status.to_string(),
                to: next.to_string(),
            });
        }

        self.schedule_repo.update_status(schedule_id, next)?;
        tracing::info!(from = %schedule.status, to = %next, "schedule status changed");
        schedule.status = next;
        Ok(schedule)
    }

    // ==========================================
    // Allocation writes
    // ==========================================

    /// Space a rail allocation of this order would take
    pub fn required_space_for_order(&self, order_id: &str) -> AllocationResult<f64> {
        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(AllocationError::not_found("Order", order_id));
        }
        let items = self.order_repo.find_items_with_products(order_id)?;
        Ok(required_space(order_id, &items)?)
    }

    /// Reserve room on a schedule for an order
    ///
    /// # Errors
    /// - `NotFound`: unknown schedule or order
    /// - `Validation`: blank ids, leg does not match the schedule mode, bad order items
    /// - `ScheduleNotBookable`: schedule not PLANNED / IN_PROGRESS
    /// - `DuplicateAllocation`: the order already holds an active allocation of this leg
    /// - `CapacityExceeded`: rail only, available_space < required_space
    /// - `Busy`: lock wait ran out
    #[instrument(skip(self))]
    pub fn create_allocation(
        &self,
        order_id: &str,
        schedule_id: &str,
        allocation_type: AllocationType,
        shipment_date: NaiveDate,
    ) -> AllocationResult<Allocation> {
        require_id("order_id", order_id)?;
        require_id("schedule_id", schedule_id)?;

        let keys = [
            schedule_key(schedule_id),
            order_leg_key(order_id, allocation_type),
        ];
        let _guard = self
            .locks
            .acquire_all(&keys, self.settings.lock_wait_timeout())?;

        let schedule = self.find_schedule(schedule_id)?;
        if schedule.mode != allocation_type.transport_mode() {
            return Err(AllocationError::Validation(format!(
                "{} allocation cannot be placed on {} schedule {}",
                allocation_type, schedule.mode, schedule_id
            )));
        }
        if !schedule.is_bookable() {
            return Err(AllocationError::ScheduleNotBookable {
                schedule_id: schedule_id.to_string(),
                status: schedule.status,
            });
        }

        if self.order_repo.find_by_id(order_id)?.is_none() {
            return Err(AllocationError::not_found("Order", order_id));
        }

        if let Some(existing) = self
            .allocation_repo
            .find_active_for_order(order_id, allocation_type)?
        {
            return Err(AllocationError::DuplicateAllocation {
                order_id: order_id.to_string(),
                allocation_type,
                existing_allocation_id: existing.allocation_id,
            });
        }

        let leg = match allocation_type {
            AllocationType::Rail => {
                let items = self.order_repo.find_items_with_products(order_id)?;
                let required = required_space(order_id, &items)?;

                let (allocated, active) = self.allocation_repo.active_usage(schedule_id)?;
                let info = capacity_info(
                    &schedule,
                    allocated,
                    active,
                    self.settings.utilization_decimals,
                )?;
                let check = check_capacity_available(&info, required);
                if !check.is_available {
                    tracing::debug!(
                        required = check.required_space,
                        available = check.available_space,
                        "rail capacity exceeded"
                    );
                    return Err(AllocationError::CapacityExceeded {
                        schedule_id: schedule_id.to_string(),
                        required: check.required_space,
                        available: check.available_space,
                    });
                }
                AllocationLeg::Rail {
                    allocated_space: required,
                }
            }
            AllocationType::Truck => AllocationLeg::Truck,
        };

        let allocation = self.allocation_repo.insert(NewAllocation {
            allocation_id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            schedule_id: schedule_id.to_string(),
            shipment_date,
            status: ScheduleStatus::Planned,
            leg,
        })?;

        tracing::info!(
            allocation_id = %allocation.allocation_id,
            allocated_space = allocation.allocated_space(),
            "allocation created"
        );
        Ok(allocation)
    }

    /// Cancel an allocation; its space is free for the next capacity query
    ///
    /// Cancelling an already cancelled allocation is a no-op.
    #[instrument(skip(self))]
    pub fn cancel_allocation(&self, allocation_id: &str) -> AllocationResult<()> {
        self.update_allocation_status(allocation_id, ScheduleStatus::Cancelled)
            .map(|_| ())
    }

    /// Move an allocation along the schedule lifecycle
    pub fn update_allocation_status(
        &self,
        allocation_id: &str,
        next: ScheduleStatus,
    ) -> AllocationResult<Allocation> {
        let allocation = self.find_allocation(allocation_id)?;

        let _guard = self.locks.acquire(
            &schedule_key(&allocation.schedule_id),
            self.settings.lock_wait_timeout(),
        )?;

        // re-read under the lock
        let mut allocation = self.find_allocation(allocation_id)?;
        if allocation.status == ScheduleStatus::Cancelled && next == ScheduleStatus::Cancelled {
            tracing::debug!(allocation_id, "allocation already cancelled");
            return Ok(allocation);
        }
        if !allocation.status.can_transition_to(next) {
            return Err(AllocationError::InvalidStateTransition {
                from: allocation.status.to_string(),
                to: next.to_string(),
            });
        }

        self.allocation_repo.update_status(allocation_id, next)?;
        tracing::info!(
            allocation_id,
            schedule_id = %allocation.schedule_id,
            from = %allocation.status,
            to = %next,
            "allocation status changed"
        );
        allocation.status = next;
        Ok(allocation)
    }

    // ==========================================
    // Queries
    // ==========================================

    /// Load one allocation in any status, cancelled included
    ///
    /// # Errors
    /// - `NotFound`: unknown allocation id
    pub fn find_allocation(&self, allocation_id: &str) -> AllocationResult<Allocation> {
        self.allocation_repo
            .find_by_id(allocation_id)?
            .ok_or_else(|| AllocationError::not_found("Allocation", allocation_id))
    }

    /// Capacity snapshot of a schedule
    ///
    /// Usage is recomputed from non-cancelled allocations on every call.
    pub fn get_schedule_capacity(&self, schedule_id: &str) -> AllocationResult<ScheduleCapacityInfo> {
        let schedule = self.find_schedule(schedule_id)?;
        let (allocated, active) = self.allocation_repo.active_usage(schedule_id)?;
        let info = capacity_info(
            &schedule,
            allocated,
            active,
            self.settings.utilization_decimals,
        )?;
        if info.is_overflow() {
            // only reachable if rows were written around the ledger
            tracing::error!(
                schedule_id,
                allocated = info.allocated_space,
                capacity = info.cargo_capacity,
                "schedule is overbooked"
            );
        }
        Ok(info)
    }

    /// Allocations of a schedule by shipment_date, then creation order
    pub fn list_allocations_for_schedule(&self, schedule_id: &str) -> AllocationResult<Vec<Allocation>> {
        self.find_schedule(schedule_id)?;
        Ok(self.allocation_repo.list_by_schedule(schedule_id)?)
    }

    /// Every allocation an order ever held, oldest first, cancelled included
    pub fn list_allocations_for_order(&self, order_id: &str) -> AllocationResult<Vec<Allocation>> {
        Ok(self.allocation_repo.list_by_order(order_id)?)
    }

    /// Manifest of active allocations with order details
    pub fn get_schedule_allocated_orders(
        &self,
        schedule_id: &str,
    ) -> AllocationResult<ScheduleAllocatedOrders> {
        self.find_schedule(schedule_id)?;
        let allocations = self.allocation_repo.list_allocated_orders(schedule_id)?;
        Ok(ScheduleAllocatedOrders {
            schedule_id: schedule_id.to_string(),
            total_allocations: allocations.len(),
            allocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::order::{Order, OrderItem, Product};
    use crate::domain::types::OrderStatus;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, day).unwrap()
    }

    fn ledger() -> AllocationLedger {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        AllocationLedger::from_connection(conn, LedgerSettings::default())
    }

    /// Order whose rail space equals `space` (one item, rate 1.0)
    fn seed_order(ledger: &AllocationLedger, order_id: &str, space: i64) {
        let repo = ledger.order_repo();
        repo.insert_order(&Order {
            order_id: order_id.to_string(),
            customer_id: "C1".to_string(),
            order_date: d(1),
            deliver_address: "addr".to_string(),
            deliver_city_id: "CITY1".to_string(),
            full_price: 100.0,
            status: OrderStatus::Placed,
            warehouse_id: None,
        })
        .unwrap();
        repo.upsert_product(&Product {
            product_type_id: "UNIT".to_string(),
            product_name: "Unit crate".to_string(),
            space_consumption_rate: 1.0,
        })
        .unwrap();
        repo.insert_items(&[OrderItem {
            item_id: format!("{}-I1", order_id),
            order_id: order_id.to_string(),
            store_id: "S1".to_string(),
            product_type_id: "UNIT".to_string(),
            quantity: space,
            item_price: 1.0,
        }])
        .unwrap();
    }

    #[test]
    fn test_rail_capacity_boundary() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        seed_order(&ledger, "O60", 60);
        seed_order(&ledger, "O50", 50);
        seed_order(&ledger, "O40", 40);

        ledger
            .create_allocation("O60", "TS1", AllocationType::Rail, d(5))
            .unwrap();

        let err = ledger
            .create_allocation("O50", "TS1", AllocationType::Rail, d(5))
            .unwrap_err();
        assert!(matches!(err, AllocationError::CapacityExceeded { .. }));
        assert!(err.is_retryable());

        ledger
            .create_allocation("O40", "TS1", AllocationType::Rail, d(5))
            .unwrap();
        let info = ledger.get_schedule_capacity("TS1").unwrap();
        assert_eq!(info.available_space, 0.0);
        assert!(info.is_full);
        assert_eq!(info.utilization_percentage, 100.0);
    }

    #[test]
    fn test_fractional_space_fills_schedule_exactly() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 0.3))
            .unwrap();
        let repo = ledger.order_repo();
        repo.upsert_product(&Product {
            product_type_id: "TENTH".to_string(),
            product_name: "Tenth crate".to_string(),
            space_consumption_rate: 0.1,
        })
        .unwrap();
        for (order_id, qty) in [("OA", 1), ("OB", 2)] {
            repo.insert_order(&Order {
                order_id: order_id.to_string(),
                customer_id: "C1".to_string(),
                order_date: d(1),
                deliver_address: "addr".to_string(),
                deliver_city_id: "CITY1".to_string(),
                full_price: 10.0,
                status: OrderStatus::Placed,
                warehouse_id: None,
            })
            .unwrap();
            repo.insert_items(&[OrderItem {
                item_id: format!("{}-I1", order_id),
                order_id: order_id.to_string(),
                store_id: "S1".to_string(),
                product_type_id: "TENTH".to_string(),
                quantity: qty,
                item_price: 1.0,
            }])
            .unwrap();
        }

        // 0.3 - 0.1 leaves 0.19999999999999998 in f64; 0.2 must still fit
        ledger
            .create_allocation("OA", "TS1", AllocationType::Rail, d(5))
            .unwrap();
        ledger
            .create_allocation("OB", "TS1", AllocationType::Rail, d(5))
            .unwrap();

        let info = ledger.get_schedule_capacity("TS1").unwrap();
        assert!(info.is_full);
        assert_eq!(info.available_space, 0.0);
        assert!(!info.is_overflow());
        assert_eq!(info.active_allocations, 2);
    }

    #[test]
    fn test_not_bookable_schedule() {
        let ledger = ledger();
        ledger
            .register_schedule(
                &Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0)
                    .with_status(ScheduleStatus::Completed),
            )
            .unwrap();
        seed_order(&ledger, "O1", 1);

        let err = ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(5))
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::ScheduleNotBookable {
                status: ScheduleStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn test_leg_must_match_schedule_mode() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::road("RS1", "TR1", "S1", "R1", d(5), 10.0))
            .unwrap();
        seed_order(&ledger, "O1", 1);

        let err = ledger
            .create_allocation("O1", "RS1", AllocationType::Rail, d(5))
            .unwrap_err();
        assert!(matches!(err, AllocationError::Validation(_)));
    }

    #[test]
    fn test_unknown_ids() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();

        assert!(matches!(
            ledger.create_allocation("O-missing", "TS1", AllocationType::Rail, d(5)),
            Err(AllocationError::NotFound { .. })
        ));
        assert!(matches!(
            ledger.create_allocation("O1", "TS-missing", AllocationType::Rail, d(5)),
            Err(AllocationError::NotFound { .. })
        ));
        assert!(matches!(
            ledger.cancel_allocation("A-missing"),
            Err(AllocationError::NotFound { .. })
        ));
        assert!(matches!(
            ledger.get_schedule_capacity("TS-missing"),
            Err(AllocationError::NotFound { .. })
        ));
        assert!(matches!(
            ledger.create_allocation("", "TS1", AllocationType::Rail, d(5)),
            Err(AllocationError::Validation(_))
        ));
    }

    #[test]
    fn test_order_without_items_is_validation_error() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        ledger
            .order_repo()
            .insert_order(&Order {
                order_id: "O-empty".to_string(),
                customer_id: "C1".to_string(),
                order_date: d(1),
                deliver_address: "addr".to_string(),
                deliver_city_id: "CITY1".to_string(),
                full_price: 0.0,
                status: OrderStatus::Placed,
                warehouse_id: None,
            })
            .unwrap();

        let err = ledger
            .create_allocation("O-empty", "TS1", AllocationType::Rail, d(5))
            .unwrap_err();
        assert!(matches!(err, AllocationError::Validation(_)));
    }

    #[test]
    fn test_cancel_reclaims_space_and_is_idempotent() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        seed_order(&ledger, "O1", 30);

        let before = ledger.get_schedule_capacity("TS1").unwrap().available_space;
        let a = ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(5))
            .unwrap();
        assert_eq!(ledger.get_schedule_capacity("TS1").unwrap().available_space, 70.0);

        ledger.cancel_allocation(&a.allocation_id).unwrap();
        ledger.cancel_allocation(&a.allocation_id).unwrap();
        assert_eq!(
            ledger.get_schedule_capacity("TS1").unwrap().available_space,
            before
        );

        // same order may book again once the old leg is cancelled
        let again = ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(5))
            .unwrap();
        assert_ne!(again.allocation_id, a.allocation_id);
        assert_eq!(ledger.get_schedule_capacity("TS1").unwrap().available_space, 70.0);
    }

    #[test]
    fn test_completed_allocation_cannot_be_cancelled() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        seed_order(&ledger, "O1", 10);
        let a = ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(5))
            .unwrap();

        ledger
            .update_allocation_status(&a.allocation_id, ScheduleStatus::Completed)
            .unwrap();
        assert!(matches!(
            ledger.cancel_allocation(&a.allocation_id),
            Err(AllocationError::InvalidStateTransition { .. })
        ));
        // completed cargo still counts against the run
        assert_eq!(ledger.get_schedule_capacity("TS1").unwrap().allocated_space, 10.0);
    }

    #[test]
    fn test_duplicate_truck_allocation() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::road("RS1", "TR1", "S1", "R1", d(6), 5.0))
            .unwrap();
        ledger
            .register_schedule(&Schedule::road("RS2", "TR2", "S1", "R1", d(7), 5.0))
            .unwrap();
        seed_order(&ledger, "O1", 3);

        let first = ledger
            .create_allocation("O1", "RS1", AllocationType::Truck, d(6))
            .unwrap();
        assert_eq!(first.allocated_space(), 0.0);

        let err = ledger
            .create_allocation("O1", "RS2", AllocationType::Truck, d(7))
            .unwrap_err();
        match err {
            AllocationError::DuplicateAllocation {
                existing_allocation_id,
                allocation_type,
                ..
            } => {
                assert_eq!(existing_allocation_id, first.allocation_id);
                assert_eq!(allocation_type, AllocationType::Truck);
            }
            other => panic!("expected DuplicateAllocation, got {:?}", other),
        }
    }

    #[test]
    fn test_truck_allocation_skips_space_check() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::road("RS1", "TR1", "S1", "R1", d(6), 0.0))
            .unwrap();
        seed_order(&ledger, "O1", 500);
        seed_order(&ledger, "O2", 500);

        ledger
            .create_allocation("O1", "RS1", AllocationType::Truck, d(6))
            .unwrap();
        ledger
            .create_allocation("O2", "RS1", AllocationType::Truck, d(6))
            .unwrap();

        let info = ledger.get_schedule_capacity("RS1").unwrap();
        assert_eq!(info.allocated_space, 0.0);
        assert_eq!(info.active_allocations, 2);
    }

    #[test]
    fn test_list_allocations_order() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        seed_order(&ledger, "O1", 1);
        seed_order(&ledger, "O2", 1);
        seed_order(&ledger, "O3", 1);

        let a1 = ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(6))
            .unwrap();
        let a2 = ledger
            .create_allocation("O2", "TS1", AllocationType::Rail, d(5))
            .unwrap();
        let a3 = ledger
            .create_allocation("O3", "TS1", AllocationType::Rail, d(6))
            .unwrap();

        let ids: Vec<String> = ledger
            .list_allocations_for_schedule("TS1")
            .unwrap()
            .into_iter()
            .map(|a| a.allocation_id)
            .collect();
        assert_eq!(ids, vec![a2.allocation_id, a1.allocation_id, a3.allocation_id]);

        assert!(matches!(
            ledger.list_allocations_for_schedule("nope"),
            Err(AllocationError::NotFound { .. })
        ));
    }

    #[test]
    fn test_schedule_status_changes() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();

        let s = ledger
            .update_schedule_status("TS1", ScheduleStatus::InProgress)
            .unwrap();
        assert_eq!(s.status, ScheduleStatus::InProgress);

        assert!(matches!(
            ledger.update_schedule_status("TS1", ScheduleStatus::Planned),
            Err(AllocationError::InvalidStateTransition { .. })
        ));

        ledger
            .update_schedule_status("TS1", ScheduleStatus::Cancelled)
            .unwrap();
        seed_order(&ledger, "O1", 1);
        assert!(matches!(
            ledger.create_allocation("O1", "TS1", AllocationType::Rail, d(5)),
            Err(AllocationError::ScheduleNotBookable { .. })
        ));
    }

    #[test]
    fn test_register_schedule_rejects_duplicates_and_bad_capacity() {
        let ledger = ledger();
        let s = Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0);
        ledger.register_schedule(&s).unwrap();
        assert!(matches!(
            ledger.register_schedule(&s),
            Err(AllocationError::Validation(_))
        ));
        assert!(matches!(
            ledger.register_schedule(&Schedule::rail("TS2", "T1", "KDY", "CMB", d(5), -5.0)),
            Err(AllocationError::Validation(_))
        ));
    }

    #[test]
    fn test_busy_when_schedule_lock_held() {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let settings = LedgerSettings {
            lock_wait_timeout_ms: 20,
            ..LedgerSettings::default()
        };
        let ledger = AllocationLedger::from_connection(conn, settings);
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        seed_order(&ledger, "O1", 1);

        let _held = ledger
            .lock_registry()
            .acquire(&schedule_key("TS1"), std::time::Duration::from_millis(10))
            .unwrap();
        let err = ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(5))
            .unwrap_err();
        assert!(matches!(err, AllocationError::Busy { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_allocated_orders_manifest() {
        let ledger = ledger();
        ledger
            .register_schedule(&Schedule::rail("TS1", "T1", "KDY", "CMB", d(5), 100.0))
            .unwrap();
        seed_order(&ledger, "O1", 12);
        ledger
            .create_allocation("O1", "TS1", AllocationType::Rail, d(5))
            .unwrap();

        let manifest = ledger.get_schedule_allocated_orders("TS1").unwrap();
        assert_eq!(manifest.total_allocations, 1);
        assert_eq!(manifest.allocations[0].allocated_space, 12.0);
        assert_eq!(manifest.allocations[0].deliver_city_id, "CITY1");
    }
}
