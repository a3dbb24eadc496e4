// ==========================================
// KandyPack Ledger - Configuration layer
// ==========================================
// Storage: config_kv table
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, get_default_db_path, ConfigManager, LedgerSettings};
