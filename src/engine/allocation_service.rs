// ==========================================
// KandyPack Ledger - Allocation service
// ==========================================
// Drives the ledger over a candidate list:
// earliest schedule first, next candidate only on CapacityExceeded.
// Advances the order status after a successful booking.
// ==========================================

use crate::domain::allocation::Allocation;
use crate::domain::order::{Order, OrderWithSpace};
use crate::domain::schedule::Schedule;
use crate::domain::types::{AllocationType, OrderStatus, TransportMode};
use crate::engine::allocation_ledger::AllocationLedger;
use crate::engine::capacity_calculator::required_space;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::repository::ScheduleRouteQuery;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Result of a next-available booking attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AllocationOutcome {
    Allocated {
        allocation: Allocation,
        /// Order status after the booking, None when it was left alone
        order_status: Option<OrderStatus>,
        /// Set when the booking stands but the order status update failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_status_error: Option<String>,
    },
    /// Every candidate was full; retry with later schedules
    Overflow {
        order_id: String,
        required_space: f64,
        tried: Vec<String>,
    },
}

impl AllocationOutcome {
    pub fn allocation(&self) -> Option<&Allocation> {
        match self {
            AllocationOutcome::Allocated { allocation, .. } => Some(allocation),
            AllocationOutcome::Overflow { .. } => None,
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, AllocationOutcome::Overflow { .. })
    }
}

pub struct AllocationService {
    ledger: Arc<AllocationLedger>,
}

impl AllocationService {
    pub fn new(ledger: Arc<AllocationLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<AllocationLedger> {
        &self.ledger
    }

    /// Route query bounded by the configured lookahead window
    ///
    /// # Errors
    /// `Validation` when the window end falls outside the calendar range
    pub fn route_query(
        &self,
        mode: TransportMode,
        vehicle_id: &str,
        source_id: &str,
        destination_id: &str,
        after_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> AllocationResult<ScheduleRouteQuery> {
        let lookahead = self.ledger.settings().candidate_lookahead_days;
        let until_date = if lookahead > 0 {
            let start = after_date.unwrap_or(today);
            let end = Duration::try_days(lookahead)
                .and_then(|window| start.checked_add_signed(window))
                .ok_or_else(|| {
                    AllocationError::Validation(format!(
                        "lookahead of {} days from {} is out of range",
                        lookahead, start
                    ))
                })?;
            Some(end)
        } else {
            None
        };

        Ok(ScheduleRouteQuery {
            mode,
            vehicle_id: vehicle_id.to_string(),
            source_id: source_id.to_string(),
            destination_id: destination_id.to_string(),
            after_date,
            from_date: today,
            until_date,
        })
    }

    /// Bookable schedules on the same vehicle and route, earliest first
    pub fn find_candidate_schedules(
        &self,
        query: &ScheduleRouteQuery,
    ) -> AllocationResult<Vec<Schedule>> {
        let schedules = self.ledger.schedule_repo().find_planned_on_route(query)?;
        Ok(schedules.into_iter().filter(|s| s.is_bookable()).collect())
    }

    /// Book the order on the earliest candidate with room
    ///
    /// # Errors
    /// Anything other than CapacityExceeded from the ledger aborts the walk.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub fn allocate_order_to_next_available_schedule(
        &self,
        order_id: &str,
        candidates: &[Schedule],
        allocation_type: AllocationType,
    ) -> AllocationResult<AllocationOutcome> {
        let mut ordered: Vec<&Schedule> = candidates.iter().collect();
        ordered.sort_by_key(|s| s.scheduled_date);

        let mut tried = Vec::with_capacity(ordered.len());
        let mut last_required = None;

        for schedule in ordered {
            tried.push(schedule.schedule_id.clone());
            match self.ledger.create_allocation(
                order_id,
                &schedule.schedule_id,
                allocation_type,
                schedule.scheduled_date,
            ) {
                Ok(allocation) => {
                    let (order_status, order_status_error) =
                        self.advance_after_booking(order_id, allocation_type);
                    return Ok(AllocationOutcome::Allocated {
                        allocation,
                        order_status,
                        order_status_error,
                    });
                }
                Err(AllocationError::CapacityExceeded {
                    schedule_id,
                    required,
                    available,
                }) => {
                    tracing::debug!(%schedule_id, required, available, "candidate full, trying next");
                    last_required = Some(required);
                }
                Err(e) => return Err(e),
            }
        }

        let required_space = match (last_required, allocation_type) {
            (Some(required), _) => required,
            (None, AllocationType::Rail) => self.ledger.required_space_for_order(order_id)?,
            (None, AllocationType::Truck) => 0.0,
        };

        tracing::warn!(
            order_id,
            required_space,
            tried = tried.len(),
            "no candidate schedule had room"
        );
        Ok(AllocationOutcome::Overflow {
            order_id: order_id.to_string(),
            required_space,
            tried,
        })
    }

    /// find_candidate_schedules + allocate_order_to_next_available_schedule
    pub fn allocate_on_route(
        &self,
        order_id: &str,
        query: &ScheduleRouteQuery,
    ) -> AllocationResult<AllocationOutcome> {
        let allocation_type = match query.mode {
            TransportMode::Rail => AllocationType::Rail,
            TransportMode::Road => AllocationType::Truck,
        };
        let candidates = self.find_candidate_schedules(query)?;
        self.allocate_order_to_next_available_schedule(order_id, &candidates, allocation_type)
    }

    /// Move an order along its lifecycle
    #[instrument(skip(self))]
    pub fn advance_order_status(&self, order_id: &str, next: OrderStatus) -> AllocationResult<Order> {
        let repo = self.ledger.order_repo();
        let mut order = repo
            .find_by_id(order_id)?
            .ok_or_else(|| AllocationError::not_found("Order", order_id))?;

        if !order.status.can_transition_to(next) {
            return Err(AllocationError::InvalidStateTransition {
                from: order.status.to_string(),
                to: next.to_string(),
            });
        }

        repo.update_status(order_id, next)?;
        tracing::info!(from = %order.status, to = %next, "order status changed");
        order.status = next;
        Ok(order)
    }

    /// Order with its items and total rail space
    pub fn order_with_space(&self, order_id: &str) -> AllocationResult<OrderWithSpace> {
        let repo = self.ledger.order_repo();
        let order = repo
            .find_by_id(order_id)?
            .ok_or_else(|| AllocationError::not_found("Order", order_id))?;
        let rows = repo.find_items_with_products(order_id)?;
        let calculated_space = required_space(order_id, &rows)?;

        Ok(OrderWithSpace {
            order,
            calculated_space,
            items: rows.into_iter().map(|(item, _)| item).collect(),
        })
    }

    /// Bump the order to its scheduled state for this leg
    ///
    /// Returns (new status, failure reason). A status that is not one step
    /// before the target is left alone without error.
    fn advance_after_booking(
        &self,
        order_id: &str,
        allocation_type: AllocationType,
    ) -> (Option<OrderStatus>, Option<String>) {
        let target = match allocation_type {
            AllocationType::Rail => OrderStatus::ScheduledRail,
            AllocationType::Truck => OrderStatus::ScheduledRoad,
        };
        match self.advance_order_status(order_id, target) {
            Ok(order) => (Some(order.status), None),
            Err(AllocationError::InvalidStateTransition { from, .. }) => {
                tracing::debug!(order_id, %from, "order status left unchanged");
                (None, None)
            }
            Err(e) => {
                tracing::error!(order_id, error = %e, "order status update failed after booking");
                (None, Some(e.to_string()))
            }
        }
    }
}
