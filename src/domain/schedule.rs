// ==========================================
// KandyPack Ledger - Schedule domain model
// ==========================================
// A single transport run (train or truck) with finite cargo capacity.
// Created by the planning process; the ledger only moves its status.
// ==========================================

use crate::domain::capacity::{ensure_non_negative, ValidationError};
use crate::domain::types::{ScheduleStatus, TransportMode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Schedule
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,
    pub mode: TransportMode,

    // ===== Run identity =====
    pub vehicle_id: String,     // train_id (RAIL) / truck_id (ROAD)
    pub source_id: String,      // source station (RAIL) / store (ROAD)
    pub destination_id: String, // destination station (RAIL) / route (ROAD)
    pub scheduled_date: NaiveDate,

    // ===== Capacity =====
    pub capacity: f64, // cargo capacity in space units

    pub status: ScheduleStatus,
}

impl Schedule {
    /// Build a PLANNED rail schedule
    pub fn rail(
        schedule_id: impl Into<String>,
        train_id: impl Into<String>,
        source_station_id: impl Into<String>,
        destination_station_id: impl Into<String>,
        scheduled_date: NaiveDate,
        cargo_capacity: f64,
    ) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            mode: TransportMode::Rail,
            vehicle_id: train_id.into(),
            source_id: source_station_id.into(),
            destination_id: destination_station_id.into(),
            scheduled_date,
            capacity: cargo_capacity,
            status: ScheduleStatus::Planned,
        }
    }

    /// Build a PLANNED road schedule
    pub fn road(
        schedule_id: impl Into<String>,
        truck_id: impl Into<String>,
        store_id: impl Into<String>,
        route_id: impl Into<String>,
        scheduled_date: NaiveDate,
        capacity: f64,
    ) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            mode: TransportMode::Road,
            vehicle_id: truck_id.into(),
            source_id: store_id.into(),
            destination_id: route_id.into(),
            scheduled_date,
            capacity,
            status: ScheduleStatus::Planned,
        }
    }

    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.status = status;
        self
    }

    /// Reject blank ids and negative/non-finite capacity
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schedule_id.trim().is_empty() {
            return Err(ValidationError::new("schedule_id must not be empty"));
        }
        if self.vehicle_id.trim().is_empty() {
            return Err(ValidationError::new(format!(
                "schedule {} has no vehicle",
                self.schedule_id
            )));
        }
        ensure_non_negative("capacity", self.capacity)?;
        Ok(())
    }

    pub fn is_bookable(&self) -> bool {
        self.status.is_bookable()
    }
}
