//! SQLite schema definitions and initialization.

use rusqlite::Connection;

use crate::error::{BackendError, RegistryError, RegistryResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn schema_error(message: String) -> RegistryError {
    RegistryError::Backend(BackendError::Internal {
        message,
        source: None,
    })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> RegistryResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::info!(version = SCHEMA_VERSION, "initialized registry schema");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> RegistryResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> RegistryResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| schema_error(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| schema_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1).
///
/// `created_at` and `test_date` are stored as fixed-width RFC 3339 / ISO 8601
/// UTC strings so string comparison in SQL equals chronological comparison.
/// The `*_norm` columns hold the lowercased, alphanumeric-only form of the
/// identifier fields; they are maintained on every write and are what the
/// normalized substring filters compare against.
fn create_schema_v1(conn: &Connection) -> RegistryResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            plate_number TEXT NOT NULL,
            plate_norm TEXT NOT NULL,
            chassis_number TEXT,
            chassis_norm TEXT,
            registration_number TEXT,
            registration_norm TEXT,
            driver_name TEXT NOT NULL,
            office_id TEXT NOT NULL,
            office_name TEXT NOT NULL,
            vehicle_type TEXT NOT NULL,
            engine_type TEXT NOT NULL,
            wheels INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create vehicles table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS emission_tests (
            id TEXT PRIMARY KEY,
            vehicle_id TEXT NOT NULL REFERENCES vehicles(id),
            test_date TEXT NOT NULL,
            year INTEGER NOT NULL,
            quarter INTEGER NOT NULL,
            result INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create emission_tests table: {}", e)))?;

    // Covering index for the (created_at DESC, id DESC) browse order.
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vehicles_recency
         ON vehicles (created_at DESC, id DESC)",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create recency index: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_vehicle_date
         ON emission_tests (vehicle_id, test_date DESC)",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create test index: {}", e)))?;

    Ok(())
}
