// ==========================================
// KandyPack Ledger - API layer
// ==========================================
// Entry points for the external REST layer: request/response shapes
// and error mapping. No HTTP server here.
// ==========================================

pub mod allocation_api;
pub mod error;

pub use allocation_api::{
    AllocateNextRequest, AllocationApi, CreateAllocationRequest, CreateAllocationResponse,
};
pub use error::{ApiError, ApiResult, ErrorResponse};
