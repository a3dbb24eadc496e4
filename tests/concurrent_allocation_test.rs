// ==========================================
// Concurrent allocation tests
// ==========================================
// Many writers on one ledger: capacity and duplicate rules must hold.
// ==========================================


#[cfg(test)]
mod concurrent_allocation_test {
    use kandypack_ledger::config::LedgerSettings;
    use kandypack_ledger::domain::{AllocationType, OrderStatus};
    use kandypack_ledger::AllocationError;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::{
        create_test_db, day, ledger_on, rail_schedule, road_schedule, seed_order,
    };

    fn settings() -> LedgerSettings {
        LedgerSettings {
            lock_wait_timeout_ms: 10_000,
            ..LedgerSettings::default()
        }
    }

    // ==========================================
    // Test 1: racing writers never overbook
    // ==========================================

    #[test]
    fn test_parallel_rail_bookings_respect_capacity() {
        kandypack_ledger::logging::init_test();
        let (_tmp, db_path) = create_test_db().unwrap();
        let ledger = ledger_on(&db_path, settings());
        rail_schedule(&ledger, "TS-HOT", 5, 100.0);

        let writers = 12;
        for i in 0..writers {
            seed_order(&ledger, &format!("O-{}", i), 15.0, OrderStatus::Placed);
        }

        let barrier = Arc::new(Barrier::new(writers));
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.create_allocation(
                        &format!("O-{}", i),
                        "TS-HOT",
                        AllocationType::Rail,
                        day(5),
                    )
                })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => booked += 1,
                Err(AllocationError::CapacityExceeded { .. }) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        // floor(100 / 15) = 6
        assert_eq!(booked, 6);
        let info = ledger.get_schedule_capacity("TS-HOT").unwrap();
        assert!(info.allocated_space <= info.cargo_capacity);
        assert_eq!(info.allocated_space, 90.0);
        assert_eq!(info.active_allocations, 6);
    }

    // ==========================================
    // Test 2: one order, one active leg
    // ==========================================

    #[test]
    fn test_parallel_truck_bookings_for_same_order() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let ledger = ledger_on(&db_path, settings());
        let schedules = ["RS-1", "RS-2", "RS-3", "RS-4"];
        for (i, id) in schedules.iter().enumerate() {
            road_schedule(&ledger, id, 6 + i as u32);
        }
        seed_order(&ledger, "O-SHARED", 2.0, OrderStatus::InWarehouse);

        let barrier = Arc::new(Barrier::new(schedules.len()));
        let handles: Vec<_> = schedules
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                let id = id.to_string();
                thread::spawn(move || {
                    barrier.wait();
                    ledger.create_allocation("O-SHARED", &id, AllocationType::Truck, day(6 + i as u32))
                })
            })
            .collect();

        let mut ok = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => ok += 1,
                Err(AllocationError::DuplicateAllocation { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(duplicates, schedules.len() - 1);

        let active: Vec<_> = ledger
            .list_allocations_for_order("O-SHARED")
            .unwrap()
            .into_iter()
            .filter(|a| a.is_active())
            .collect();
        assert_eq!(active.len(), 1);
    }

    // ==========================================
    // Test 3: cancels interleaved with bookings
    // ==========================================

    #[test]
    fn test_cancel_and_book_interleaved() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let ledger = ledger_on(&db_path, settings());
        rail_schedule(&ledger, "TS-MIX", 5, 50.0);

        // 5 x 10 fills the run
        let mut existing = Vec::new();
        for i in 0..5 {
            let order_id = format!("O-OLD-{}", i);
            seed_order(&ledger, &order_id, 10.0, OrderStatus::Placed);
            let a = ledger
                .create_allocation(&order_id, "TS-MIX", AllocationType::Rail, day(5))
                .unwrap();
            existing.push(a.allocation_id);
        }
        for i in 0..5 {
            seed_order(&ledger, &format!("O-NEW-{}", i), 10.0, OrderStatus::Placed);
        }

        let mut handles = Vec::new();
        for allocation_id in existing {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                ledger.cancel_allocation(&allocation_id).map(|_| false)
            }));
        }
        for i in 0..5 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                ledger
                    .create_allocation(
                        &format!("O-NEW-{}", i),
                        "TS-MIX",
                        AllocationType::Rail,
                        day(5),
                    )
                    .map(|_| true)
            }));
        }

        let mut new_booked = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(true) => new_booked += 1,
                Ok(false) => {}
                Err(AllocationError::CapacityExceeded { .. }) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        // every old allocation is gone; only new bookings remain
        let info = ledger.get_schedule_capacity("TS-MIX").unwrap();
        assert!(info.allocated_space <= info.cargo_capacity);
        assert_eq!(info.allocated_space, 10.0 * new_booked as f64);
        assert_eq!(info.active_allocations, new_booked);
    }
}
