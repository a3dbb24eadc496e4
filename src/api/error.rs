// ==========================================
// KandyPack Ledger - API error type
// ==========================================
// Maps engine and repository errors to caller-facing categories.
// Every message carries an explicit reason.
// ==========================================

use crate::engine::error::AllocationError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // Allocation rule violations
    // ==========================================
    #[error("capacity exceeded: schedule={schedule_id}, required={required}, available={available}")]
    CapacityExceeded {
        schedule_id: String,
        required: f64,
        available: f64,
    },

    #[error("schedule not bookable: {0}")]
    ScheduleNotBookable(String),

    #[error("duplicate allocation: {0}")]
    DuplicateAllocation(String),

    // ==========================================
    // Input / lookup errors
    // ==========================================
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("business rule violation: {0}")]
    BusinessRuleViolation(String),

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // Concurrency
    // ==========================================
    #[error("resource busy: {0}")]
    Busy(String),

    // ==========================================
    // Data access
    // ==========================================
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("connection lock failed: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("unique constraint: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("foreign key constraint: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("field {}: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Validation(msg) => ApiError::InvalidInput(msg),
            AllocationError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            AllocationError::CapacityExceeded {
                schedule_id,
                required,
                available,
            } => ApiError::CapacityExceeded {
                schedule_id,
                required,
                available,
            },
            e @ AllocationError::ScheduleNotBookable { .. } => {
                ApiError::ScheduleNotBookable(e.to_string())
            }
            e @ AllocationError::DuplicateAllocation { .. } => {
                ApiError::DuplicateAllocation(e.to_string())
            }
            e @ AllocationError::Busy { .. } => ApiError::Busy(e.to_string()),
            AllocationError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            AllocationError::Repository(repo) => repo.into(),
        }
    }
}

impl ApiError {
    /// HTTP status the REST layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::CapacityExceeded { .. }
            | ApiError::ScheduleNotBookable(_)
            | ApiError::DuplicateAllocation(_)
            | ApiError::BusinessRuleViolation(_)
            | ApiError::InvalidStateTransition { .. } => 409,
            ApiError::Busy(_) => 503,
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_)
            | ApiError::Other(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ApiError::ScheduleNotBookable(_) => "SCHEDULE_NOT_BOOKABLE",
            ApiError::DuplicateAllocation(_) => "DUPLICATE_ALLOCATION",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::Busy(_) => "BUSY",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "DATABASE_ERROR",
            ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            status: self.status_code(),
        }
    }
}

/// Error body returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub status: u16,
}

pub type ApiResult<T> = Result<T, ApiError>;
