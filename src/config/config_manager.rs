// ==========================================
// KandyPack Ledger - Configuration manager
// ==========================================
// Storage: config_kv table (key-value, scope_id = 'global')
// Missing or unparsable values fall back to defaults with a warning.
// ==========================================

use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::domain::capacity::DEFAULT_UTILIZATION_DECIMALS;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Configuration keys
pub mod config_keys {
    /// Bounded wait for schedule/order locks (ms)
    pub const LOCK_WAIT_TIMEOUT_MS: &str = "ledger/lock_wait_timeout_ms";
    /// Rounding of utilization_percentage
    pub const UTILIZATION_DECIMALS: &str = "ledger/utilization_decimals";
    /// Window (days) searched for the next available trip
    pub const CANDIDATE_LOOKAHEAD_DAYS: &str = "ledger/candidate_lookahead_days";
}

pub const DEFAULT_LOCK_WAIT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_CANDIDATE_LOOKAHEAD_DAYS: i64 = 30;
/// Upper bound for the lookahead window (ten years)
pub const MAX_CANDIDATE_LOOKAHEAD_DAYS: i64 = 3_650;

// ==========================================
// LedgerSettings - resolved runtime settings
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub lock_wait_timeout_ms: u64,
    pub utilization_decimals: u32,
    pub candidate_lookahead_days: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            lock_wait_timeout_ms: DEFAULT_LOCK_WAIT_TIMEOUT_MS,
            utilization_decimals: DEFAULT_UTILIZATION_DECIMALS,
            candidate_lookahead_days: DEFAULT_CANDIDATE_LOOKAHEAD_DAYS,
        }
    }
}

impl LedgerSettings {
    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }
}

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Open the database at `db_path`
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Reuse an existing connection (PRAGMAs are re-applied, idempotent)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Read a global config value
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Upsert a global config value
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Display,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "unparsable config value, using default"
                );
                Ok(default)
            }
        }
    }

    pub fn get_lock_wait_timeout_ms(&self) -> RepositoryResult<u64> {
        self.get_parsed_or(config_keys::LOCK_WAIT_TIMEOUT_MS, DEFAULT_LOCK_WAIT_TIMEOUT_MS)
    }

    pub fn get_utilization_decimals(&self) -> RepositoryResult<u32> {
        let decimals =
            self.get_parsed_or(config_keys::UTILIZATION_DECIMALS, DEFAULT_UTILIZATION_DECIMALS)?;
        Ok(decimals.min(6))
    }

    /// Lookahead window in days, clamped to [0, MAX_CANDIDATE_LOOKAHEAD_DAYS]
    pub fn get_candidate_lookahead_days(&self) -> RepositoryResult<i64> {
        let days = self.get_parsed_or(
            config_keys::CANDIDATE_LOOKAHEAD_DAYS,
            DEFAULT_CANDIDATE_LOOKAHEAD_DAYS,
        )?;
        if days > MAX_CANDIDATE_LOOKAHEAD_DAYS {
            tracing::warn!(
                days,
                max = MAX_CANDIDATE_LOOKAHEAD_DAYS,
                "candidate lookahead too large, clamping"
            );
        }
        Ok(days.clamp(0, MAX_CANDIDATE_LOOKAHEAD_DAYS))
    }

    /// Resolve all ledger settings at once
    pub fn load_ledger_settings(&self) -> RepositoryResult<LedgerSettings> {
        Ok(LedgerSettings {
            lock_wait_timeout_ms: self.get_lock_wait_timeout_ms()?,
            utilization_decimals: self.get_utilization_decimals()?,
            candidate_lookahead_days: self.get_candidate_lookahead_days()?,
        })
    }

    /// Snapshot of all global config as a JSON object string
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

        serde_json::to_string(&config_map).map_err(|e| RepositoryError::Other(e.into()))
    }

    /// Restore global config from a snapshot; returns the number of keys written
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)
            .map_err(|e| RepositoryError::FieldValueError {
                field: "snapshot_json".to_string(),
                message: e.to_string(),
            })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

/// Default database path
///
/// KANDYPACK_DB_PATH wins when set; otherwise the user data directory,
/// falling back to ./kandypack_ledger.db.
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("KANDYPACK_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./kandypack_ledger.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("kandypack-ledger");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("kandypack_ledger.db");
        }
    }

    path.to_string_lossy().to_string()
}
