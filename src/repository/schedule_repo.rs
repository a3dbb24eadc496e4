// ==========================================
// KandyPack Ledger - Schedule repository
// ==========================================
// Table: schedule (rail and road runs)
// Repository holds no business rules.
// ==========================================

use crate::domain::schedule::Schedule;
use crate::domain::types::{ScheduleStatus, TransportMode};
use crate::repository::error::{bad_column, parse_date_column, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT schedule_id, mode, vehicle_id, source_id, destination_id,
           scheduled_date, capacity, status
    FROM schedule
"#;

/// Filter for "next available trip" lookups
#[derive(Debug, Clone)]
pub struct ScheduleRouteQuery {
    pub mode: TransportMode,
    pub vehicle_id: String,
    pub source_id: String,
    pub destination_id: String,
    /// Strictly after this date when set
    pub after_date: Option<NaiveDate>,
    /// On or after this date when after_date is not set
    pub from_date: NaiveDate,
    /// Inclusive upper bound
    pub until_date: Option<NaiveDate>,
}

pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
        let mode_raw: String = row.get(1)?;
        let date_raw: String = row.get(5)?;
        let status_raw: String = row.get(7)?;

        Ok(Schedule {
            schedule_id: row.get(0)?,
            mode: TransportMode::from_db_str(&mode_raw)
                .ok_or_else(|| bad_column(1, format!("unknown mode '{}'", mode_raw)))?,
            vehicle_id: row.get(2)?,
            source_id: row.get(3)?,
            destination_id: row.get(4)?,
            scheduled_date: parse_date_column(5, &date_raw)?,
            capacity: row.get(6)?,
            status: ScheduleStatus::from_db_str(&status_raw)
                .ok_or_else(|| bad_column(7, format!("unknown status '{}'", status_raw)))?,
        })
    }

    // ==========================================
    // Writes
    // ==========================================

    /// Insert a schedule row
    ///
    /// # Returns
    /// - Err(UniqueConstraintViolation) when the schedule_id is taken
    pub fn insert(&self, schedule: &Schedule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO schedule (
                schedule_id, mode, vehicle_id, source_id, destination_id,
                scheduled_date, capacity, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                schedule.schedule_id,
                schedule.mode.to_db_str(),
                schedule.vehicle_id,
                schedule.source_id,
                schedule.destination_id,
                schedule.scheduled_date.format("%Y-%m-%d").to_string(),
                schedule.capacity,
                schedule.status.to_db_str(),
            ],
        )?;
        Ok(())
    }

    /// Update the status column
    ///
    /// # Returns
    /// - Err(NotFound) when no row matches
    pub fn update_status(&self, schedule_id: &str, status: ScheduleStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE schedule SET status = ?1 WHERE schedule_id = ?2",
            params![status.to_db_str(), schedule_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Schedule".to_string(),
                id: schedule_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Look up a schedule by id
    pub fn find_by_id(&self, schedule_id: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE schedule_id = ?1", SELECT_COLUMNS);
        let schedule = conn
            .query_row(&sql, params![schedule_id], Self::map_row)
            .optional()?;
        Ok(schedule)
    }

    /// Every schedule of one mode, any status
    pub fn list_by_mode(&self, mode: TransportMode) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE mode = ?1 ORDER BY scheduled_date, schedule_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let schedules = stmt
            .query_map(params![mode.to_db_str()], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(schedules)
    }

    /// PLANNED schedules on one route, earliest first
    pub fn find_planned_on_route(
        &self,
        query: &ScheduleRouteQuery,
    ) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;

        let (lower_op, lower_date) = match query.after_date {
            Some(after) => (">", after),
            None => (">=", query.from_date),
        };
        let until = query
            .until_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "9999-12-31".to_string());

        let sql = format!(
            r#"{}
            WHERE mode = ?1
              AND vehicle_id = ?2
              AND source_id = ?3
              AND destination_id = ?4
              AND status = 'PLANNED'
              AND scheduled_date {} ?5
              AND scheduled_date <= ?6
            ORDER BY scheduled_date, schedule_id
            "#,
            SELECT_COLUMNS, lower_op
        );

        let mut stmt = conn.prepare(&sql)?;
        let schedules = stmt
            .query_map(
                params![
                    query.mode.to_db_str(),
                    query.vehicle_id,
                    query.source_id,
                    query.destination_id,
                    lower_date.format("%Y-%m-%d").to_string(),
                    until,
                ],
                Self::map_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(schedules)
    }
}
