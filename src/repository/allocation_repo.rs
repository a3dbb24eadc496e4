// ==========================================
// KandyPack Ledger - Allocation repository
// ==========================================
// Table: allocation (rail and truck legs, discriminated by allocation_type)
// seq is the AUTOINCREMENT key and doubles as creation order.
// Repository holds no business rules; capacity checks live in the ledger.
// ==========================================

use crate::domain::allocation::{AllocatedOrder, Allocation, AllocationLeg};
use crate::domain::types::{AllocationType, ScheduleStatus};
use crate::repository::error::{bad_column, parse_date_column, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT seq, allocation_id, order_id, schedule_id, allocation_type,
           shipment_date, allocated_space, status
    FROM allocation
"#;

/// Allocation about to be written (seq is assigned by the database)
#[derive(Debug, Clone)]
pub struct NewAllocation {
    pub allocation_id: String,
    pub order_id: String,
    pub schedule_id: String,
    pub shipment_date: NaiveDate,
    pub status: ScheduleStatus,
    pub leg: AllocationLeg,
}

pub struct AllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Allocation> {
        let type_raw: String = row.get(4)?;
        let date_raw: String = row.get(5)?;
        let space: Option<f64> = row.get(6)?;
        let status_raw: String = row.get(7)?;

        let leg = match AllocationType::from_db_str(&type_raw) {
            Some(AllocationType::Rail) => AllocationLeg::Rail {
                allocated_space: space.unwrap_or(0.0),
            },
            Some(AllocationType::Truck) => AllocationLeg::Truck,
            None => {
                return Err(bad_column(
                    4,
                    format!("unknown allocation_type '{}'", type_raw),
                ))
            }
        };

        Ok(Allocation {
            seq: row.get(0)?,
            allocation_id: row.get(1)?,
            order_id: row.get(2)?,
            schedule_id: row.get(3)?,
            shipment_date: parse_date_column(5, &date_raw)?,
            status: ScheduleStatus::from_db_str(&status_raw)
                .ok_or_else(|| bad_column(7, format!("unknown status '{}'", status_raw)))?,
            leg,
        })
    }

    // ==========================================
    // Writes
    // ==========================================

    /// Insert an allocation and return it with its assigned seq
    pub fn insert(&self, new: NewAllocation) -> RepositoryResult<Allocation> {
        let conn = self.get_conn()?;

        let space = match new.leg {
            AllocationLeg::Rail { allocated_space } => Some(allocated_space),
            AllocationLeg::Truck => None,
        };

        conn.execute(
            r#"
            INSERT INTO allocation (
                allocation_id, order_id, schedule_id, allocation_type,
                shipment_date, allocated_space, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                new.allocation_id,
                new.order_id,
                new.schedule_id,
                new.leg.allocation_type().to_db_str(),
                new.shipment_date.format("%Y-%m-%d").to_string(),
                space,
                new.status.to_db_str(),
            ],
        )?;
        let seq = conn.last_insert_rowid();

        Ok(Allocation {
            allocation_id: new.allocation_id,
            order_id: new.order_id,
            schedule_id: new.schedule_id,
            shipment_date: new.shipment_date,
            status: new.status,
            seq,
            leg: new.leg,
        })
    }

    /// Update the status column
    ///
    /// # Returns
    /// - Err(NotFound) when no row matches
    pub fn update_status(
        &self,
        allocation_id: &str,
        status: ScheduleStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE allocation SET status = ?1 WHERE allocation_id = ?2",
            params![status.to_db_str(), allocation_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Allocation".to_string(),
                id: allocation_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Look up an allocation by id, cancelled rows included
    pub fn find_by_id(&self, allocation_id: &str) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE allocation_id = ?1", SELECT_COLUMNS);
        let allocation = conn
            .query_row(&sql, params![allocation_id], Self::map_row)
            .optional()?;
        Ok(allocation)
    }

    /// All allocations of a schedule, by shipment_date then creation order
    pub fn list_by_schedule(&self, schedule_id: &str) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE schedule_id = ?1 ORDER BY shipment_date, seq",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![schedule_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All allocations of an order in creation order
    pub fn list_by_order(&self, order_id: &str) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE order_id = ?1 ORDER BY seq", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The non-cancelled allocation of one leg for an order, if any
    pub fn find_active_for_order(
        &self,
        order_id: &str,
        allocation_type: AllocationType,
    ) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"{}
            WHERE order_id = ?1
              AND allocation_type = ?2
              AND status <> 'CANCELLED'
            ORDER BY seq
            LIMIT 1
            "#,
            SELECT_COLUMNS
        );
        let allocation = conn
            .query_row(
                &sql,
                params![order_id, allocation_type.to_db_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(allocation)
    }

    /// (allocated rail space, active allocation count) of a schedule
    pub fn active_usage(&self, schedule_id: &str) -> RepositoryResult<(f64, usize)> {
        let conn = self.get_conn()?;
        let (space, count): (Option<f64>, i64) = conn.query_row(
            r#"
            SELECT
                SUM(CASE WHEN allocation_type = 'Rail' THEN allocated_space ELSE 0 END),
                COUNT(*)
            FROM allocation
            WHERE schedule_id = ?1
              AND status <> 'CANCELLED'
            "#,
            params![schedule_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((space.unwrap_or(0.0), count.max(0) as usize))
    }

    /// Non-cancelled allocations of a schedule joined with their orders
    pub fn list_allocated_orders(&self, schedule_id: &str) -> RepositoryResult<Vec<AllocatedOrder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT a.allocation_id, a.order_id, o.customer_id, o.deliver_city_id,
                   o.full_price, a.allocated_space, a.shipment_date, a.status
            FROM allocation a
            JOIN orders o ON o.order_id = a.order_id
            WHERE a.schedule_id = ?1
              AND a.status <> 'CANCELLED'
            ORDER BY a.shipment_date, a.seq
            "#,
        )?;
        let rows = stmt
            .query_map(params![schedule_id], |row| {
                let date_raw: String = row.get(6)?;
                let status_raw: String = row.get(7)?;
                Ok(AllocatedOrder {
                    allocation_id: row.get(0)?,
                    order_id: row.get(1)?,
                    customer_id: row.get(2)?,
                    deliver_city_id: row.get(3)?,
                    full_price: row.get(4)?,
                    allocated_space: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    shipment_date: parse_date_column(6, &date_raw)?,
                    status: ScheduleStatus::from_db_str(&status_raw).ok_or_else(|| {
                        bad_column(7, format!("unknown status '{}'", status_raw))
                    })?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
