// ==========================================
// KandyPack Ledger - Engine error type
// ==========================================
// Every failure carries its reason; nothing is swallowed.
// Only CapacityExceeded and Busy are retryable.
// ==========================================

use crate::domain::capacity::ValidationError;
use crate::domain::types::{AllocationType, ScheduleStatus};
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: id={id}")]
    NotFound { entity: String, id: String },

    #[error(
        "capacity exceeded on schedule {schedule_id}: required={required}, available={available}"
    )]
    CapacityExceeded {
        schedule_id: String,
        required: f64,
        available: f64,
    },

    #[error("schedule {schedule_id} is not bookable (status={status})")]
    ScheduleNotBookable {
        schedule_id: String,
        status: ScheduleStatus,
    },

    #[error(
        "order {order_id} already holds active {allocation_type} allocation {existing_allocation_id}"
    )]
    DuplicateAllocation {
        order_id: String,
        allocation_type: AllocationType,
        existing_allocation_id: String,
    },

    #[error("resource busy: {key} (waited {waited_ms}ms)")]
    Busy { key: String, waited_ms: u64 },

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AllocationError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        AllocationError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// CapacityExceeded (another schedule) and Busy (backoff) may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AllocationError::CapacityExceeded { .. } | AllocationError::Busy { .. }
        )
    }
}

impl From<ValidationError> for AllocationError {
    fn from(err: ValidationError) -> Self {
        AllocationError::Validation(err.0)
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;
