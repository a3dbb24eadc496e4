// ==========================================
// KandyPack Ledger - Capacity domain model
// ==========================================
// Derived capacity metrics of a schedule.
// Invariant: allocated_space of non-cancelled rail allocations <= capacity
// ==========================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default rounding for utilization_percentage
pub const DEFAULT_UTILIZATION_DECIMALS: u32 = 2;

/// Tolerance for space comparisons; SUM over fractional rates drifts by a few ulps
pub const SPACE_EPSILON: f64 = 1e-9;

// ==========================================
// ValidationError
// ==========================================
/// Malformed input; the caller must fix the request
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Reject negative and non-finite quantities
pub fn ensure_non_negative(field: &str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(format!(
            "{} must be a finite number, got {}",
            field, value
        )));
    }
    if value < 0.0 {
        return Err(ValidationError::new(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(value)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// ==========================================
// ScheduleCapacityInfo
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCapacityInfo {
    pub schedule_id: String,
    pub cargo_capacity: f64,
    pub allocated_space: f64,
    pub available_space: f64,        // capacity - allocated, never below 0
    pub utilization_percentage: f64, // allocated / capacity * 100
    pub is_full: bool,               // available_space <= 0
    pub active_allocations: usize,   // non-cancelled allocations of either leg
}

impl ScheduleCapacityInfo {
    /// Compute the capacity snapshot of a schedule
    ///
    /// # Arguments
    /// - `capacity`: schedule cargo capacity
    /// - `allocated_space`: sum over non-cancelled rail allocations
    /// - `active_allocations`: non-cancelled allocation count
    /// - `decimals`: rounding of utilization_percentage
    ///
    /// # Errors
    /// `ValidationError` for negative or non-finite capacity/space
    pub fn compute(
        schedule_id: &str,
        capacity: f64,
        allocated_space: f64,
        active_allocations: usize,
        decimals: u32,
    ) -> Result<Self, ValidationError> {
        let capacity = ensure_non_negative("capacity", capacity)?;
        let allocated_space = ensure_non_negative("allocated_space", allocated_space)?;

        let raw_available = capacity - allocated_space;
        let utilization = if capacity > 0.0 {
            round_to(allocated_space / capacity * 100.0, decimals)
        } else {
            0.0
        };

        Ok(Self {
            schedule_id: schedule_id.to_string(),
            cargo_capacity: capacity,
            allocated_space,
            available_space: if raw_available.abs() <= SPACE_EPSILON {
                0.0
            } else {
                raw_available.max(0.0)
            },
            utilization_percentage: utilization,
            is_full: raw_available <= SPACE_EPSILON,
            active_allocations,
        })
    }
}

// ==========================================
// Trait: CapacityConstraint
// ==========================================
// Capacity check interface used by the ledger
pub trait CapacityConstraint {
    /// Whether `space` more units fit
    fn can_allocate(&self, space: f64) -> bool;

    /// Remaining space
    fn remaining_space(&self) -> f64;

    /// Allocated beyond capacity (should never happen under the ledger)
    fn is_overflow(&self) -> bool;
}

impl CapacityConstraint for ScheduleCapacityInfo {
    fn can_allocate(&self, space: f64) -> bool {
        self.available_space + SPACE_EPSILON >= space
    }

    fn remaining_space(&self) -> f64 {
        self.available_space
    }

    fn is_overflow(&self) -> bool {
        self.allocated_space > self.cargo_capacity + SPACE_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_basic() {
        let info = ScheduleCapacityInfo::compute("TS1", 100.0, 60.0, 2, 2).unwrap();
        assert_eq!(info.available_space, 40.0);
        assert_eq!(info.utilization_percentage, 60.0);
        assert!(!info.is_full);
        assert_eq!(info.active_allocations, 2);
        assert!(info.can_allocate(40.0));
        assert!(!info.can_allocate(40.5));
    }

    #[test]
    fn test_compute_full_schedule() {
        let info = ScheduleCapacityInfo::compute("TS1", 100.0, 100.0, 1, 2).unwrap();
        assert_eq!(info.available_space, 0.0);
        assert!(info.is_full);
        assert!(!info.is_overflow());
    }

    #[test]
    fn test_compute_rounds_utilization() {
        let info = ScheduleCapacityInfo::compute("TS1", 300.0, 100.0, 1, 2).unwrap();
        assert_eq!(info.utilization_percentage, 33.33);
    }

    #[test]
    fn test_zero_capacity_is_full() {
        let info = ScheduleCapacityInfo::compute("RS1", 0.0, 0.0, 0, 2).unwrap();
        assert_eq!(info.utilization_percentage, 0.0);
        assert!(info.is_full);
    }

    #[test]
    fn test_overflow_clamps_available() {
        let info = ScheduleCapacityInfo::compute("TS1", 10.0, 12.0, 1, 2).unwrap();
        assert_eq!(info.available_space, 0.0);
        assert!(info.is_overflow());
    }

    #[test]
    fn test_fractional_exact_fit() {
        // 0.3 - 0.1 == 0.19999999999999998 in f64
        let info = ScheduleCapacityInfo::compute("TS1", 0.3, 0.1, 1, 2).unwrap();
        assert!(info.can_allocate(0.2));
        assert!(!info.can_allocate(0.2001));

        // 0.1 + 0.2 == 0.30000000000000004 in f64
        let full = ScheduleCapacityInfo::compute("TS1", 0.3, 0.1 + 0.2, 2, 2).unwrap();
        assert_eq!(full.available_space, 0.0);
        assert!(full.is_full);
        assert!(!full.is_overflow());
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        assert!(ScheduleCapacityInfo::compute("TS1", -1.0, 0.0, 0, 2).is_err());
        assert!(ScheduleCapacityInfo::compute("TS1", f64::INFINITY, 0.0, 0, 2).is_err());
        assert!(ScheduleCapacityInfo::compute("TS1", 10.0, -0.5, 0, 2).is_err());
        assert!(ScheduleCapacityInfo::compute("TS1", 10.0, f64::NAN, 0, 2).is_err());
    }
}
