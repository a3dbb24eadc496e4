// ==========================================
// KandyPack Ledger - SQLite connection and schema
// ==========================================
// Every connection gets the same PRAGMAs (foreign keys, busy timeout).
// ensure_schema is idempotent and safe to run on every start.
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// schema_version written by ensure_schema
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Apply the per-connection PRAGMAs
///
/// foreign_keys and busy_timeout are connection-scoped in SQLite,
/// so every connection must go through here.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a file-backed connection with the standard configuration
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Open an in-memory connection with the schema already applied
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS schedule (
    schedule_id TEXT PRIMARY KEY,
    mode TEXT NOT NULL CHECK (mode IN ('RAIL', 'ROAD')),
    vehicle_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    destination_id TEXT NOT NULL,
    scheduled_date TEXT NOT NULL,
    capacity REAL NOT NULL CHECK (capacity >= 0),
    status TEXT NOT NULL DEFAULT 'PLANNED'
);

CREATE INDEX IF NOT EXISTS idx_schedule_route
    ON schedule (mode, vehicle_id, source_id, destination_id, scheduled_date);

CREATE TABLE IF NOT EXISTS orders (
    order_id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    order_date TEXT NOT NULL,
    deliver_address TEXT NOT NULL,
    deliver_city_id TEXT NOT NULL,
    full_price REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'PLACED',
    warehouse_id TEXT
);

CREATE TABLE IF NOT EXISTS product (
    product_type_id TEXT PRIMARY KEY,
    product_name TEXT NOT NULL,
    space_consumption_rate REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS order_item (
    item_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
    store_id TEXT NOT NULL,
    product_type_id TEXT NOT NULL REFERENCES product(product_type_id),
    quantity INTEGER NOT NULL,
    item_price REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_order_item_order ON order_item (order_id);

CREATE TABLE IF NOT EXISTS allocation (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    allocation_id TEXT NOT NULL UNIQUE,
    order_id TEXT NOT NULL REFERENCES orders(order_id),
    schedule_id TEXT NOT NULL REFERENCES schedule(schedule_id),
    allocation_type TEXT NOT NULL CHECK (allocation_type IN ('Rail', 'Truck')),
    shipment_date TEXT NOT NULL,
    allocated_space REAL,
    status TEXT NOT NULL DEFAULT 'PLANNED',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_allocation_schedule ON allocation (schedule_id, status);
CREATE INDEX IF NOT EXISTS idx_allocation_order ON allocation (order_id, allocation_type, status);
"#;

/// Create all ledger tables if missing and record the schema version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Read schema_version (None when the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
