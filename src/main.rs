// ==========================================
// KandyPack Ledger - operator CLI
// ==========================================
// Usage:
//   kandypack-ledger [--db <path>] <command> [args]
//
// Commands:
//   init                      create / upgrade the schema
//   capacity <schedule_id>    capacity snapshot (JSON)
//   schedules <RAIL|ROAD>     every schedule of a mode with its capacity (JSON)
//   manifest <schedule_id>    active allocations with order details (JSON)
//   cancel <allocation_id>    cancel an allocation
//   config                    config snapshot (JSON)
//
// Database path: --db, else KANDYPACK_DB_PATH, else the user data dir.
// ==========================================

use kandypack_ledger::config::{get_default_db_path, ConfigManager};
use kandypack_ledger::db::{ensure_schema, open_sqlite_connection, read_schema_version};
use kandypack_ledger::domain::TransportMode;
use kandypack_ledger::{logging, AllocationLedger, APP_NAME, VERSION};
use std::path::Path;
use std::sync::{Arc, Mutex};

const USAGE: &str = "usage: kandypack-ledger [--db <path>] <init|capacity|schedules|manifest|cancel|config> [args]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.iter().position(|a| a == "--db") {
        Some(idx) if idx + 1 < args.len() => {
            let path = args.remove(idx + 1);
            args.remove(idx);
            path
        }
        Some(_) => return Err("--db needs a path".into()),
        None => get_default_db_path(),
    };

    let mut args = args.into_iter();
    let command = args.next().ok_or(USAGE)?;

    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::info!(app = APP_NAME, version = VERSION, db_path = %db_path, "starting");

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let config = ConfigManager::from_connection(conn.clone())?;
    let settings = config.load_ledger_settings()?;
    let ledger = AllocationLedger::from_connection(conn.clone(), settings);

    match command.as_str() {
        "init" => {
            let version = {
                let c = conn.lock().map_err(|e| e.to_string())?;
                read_schema_version(&c)?
            };
            println!("db_path={}", db_path);
            println!("schema_version={}", version.unwrap_or(0));
        }
        "capacity" => {
            let schedule_id = args.next().ok_or("capacity needs a schedule_id")?;
            let info = ledger.get_schedule_capacity(&schedule_id)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        "schedules" => {
            let raw = args.next().ok_or("schedules needs RAIL or ROAD")?;
            let mode = TransportMode::from_db_str(&raw.to_ascii_uppercase())
                .ok_or_else(|| format!("unknown mode '{}'", raw))?;
            let mut rows = Vec::new();
            for schedule in ledger.schedule_repo().list_by_mode(mode)? {
                let capacity = ledger.get_schedule_capacity(&schedule.schedule_id)?;
                rows.push(serde_json::json!({
                    "schedule": schedule,
                    "capacity": capacity,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        "manifest" => {
            let schedule_id = args.next().ok_or("manifest needs a schedule_id")?;
            let manifest = ledger.get_schedule_allocated_orders(&schedule_id)?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        "cancel" => {
            let allocation_id = args.next().ok_or("cancel needs an allocation_id")?;
            ledger.cancel_allocation(&allocation_id)?;
            println!("cancelled={}", allocation_id);
        }
        "config" => {
            println!("{}", config.get_config_snapshot()?);
        }
        other => return Err(format!("unknown command '{}'\n{}", other, USAGE).into()),
    }

    Ok(())
}
