// ==========================================
// KandyPack Ledger - Capacity calculator
// ==========================================
// Order space: sum over items of quantity * space_consumption_rate
// Stateless; callers supply the rows.
// ==========================================

use crate::domain::capacity::{
    ensure_non_negative, CapacityConstraint, ScheduleCapacityInfo, ValidationError,
};
use crate::domain::order::{OrderItem, Product};
use crate::domain::schedule::Schedule;
use serde::{Deserialize, Serialize};

/// Outcome of a capacity check against one schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityCheck {
    pub is_available: bool,
    pub available_space: f64,
    pub required_space: f64,
}

/// Total rail space an order consumes
///
/// # Errors
/// - the order has no items
/// - a quantity is negative
/// - a product rate is negative or non-finite
pub fn required_space(
    order_id: &str,
    items: &[(OrderItem, Product)],
) -> Result<f64, ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new(format!(
            "no items found for order {}",
            order_id
        )));
    }

    let mut total = 0.0;
    for (item, product) in items {
        if item.quantity < 0 {
            return Err(ValidationError::new(format!(
                "item {} has negative quantity {}",
                item.item_id, item.quantity
            )));
        }
        let rate = ensure_non_negative(
            &format!("space_consumption_rate of {}", product.product_type_id),
            product.space_consumption_rate,
        )?;
        total += item.quantity as f64 * rate;
    }

    ensure_non_negative("required_space", total)
}

/// Capacity snapshot of a schedule from its current usage
pub fn capacity_info(
    schedule: &Schedule,
    allocated_space: f64,
    active_allocations: usize,
    decimals: u32,
) -> Result<ScheduleCapacityInfo, ValidationError> {
    ScheduleCapacityInfo::compute(
        &schedule.schedule_id,
        schedule.capacity,
        allocated_space,
        active_allocations,
        decimals,
    )
}

/// Compare required space with what is left
pub fn check_capacity_available<C: CapacityConstraint>(info: &C, required: f64) -> CapacityCheck {
    CapacityCheck {
        is_available: info.can_allocate(required),
        available_space: info.remaining_space(),
        required_space: required,
    }
}
