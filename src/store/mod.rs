//! SQLite record store.
//!
//! [`SqliteStore`] owns a pooled SQLite connection and exposes the record
//! surface the pagination engine and its callers need: registering vehicles
//! and tests, point reads, deletion, distinct filter options, and the
//! keyset page fetchers in [`paging`]. Supports in-memory databases (for
//! tests) and file-based databases.

mod paging;
mod schema;

use std::fmt::Debug;
use std::path::Path;

use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BackendError, RegistryError, RegistryResult};
use crate::query::normalize;
use crate::types::{FilterOptions, NewEmissionTest, NewVehicle, Vehicle, storage_timestamp};

pub use schema::SCHEMA_VERSION;

/// Columns selected whenever a full vehicle row is read, in `read_vehicle_row`
/// order.
pub(crate) const VEHICLE_COLUMNS: &str = "id, created_at, plate_number, chassis_number, \
     registration_number, driver_name, office_id, office_name, vehicle_type, engine_type, wheels";

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable WAL mode for better read concurrency (file-based only).
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// SQLite-backed vehicle registry store.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteStoreConfig,
    is_memory: bool,
}

impl Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Creates a new in-memory store with the schema initialized.
    pub fn in_memory() -> RegistryResult<Self> {
        Self::with_config(":memory:", SqliteStoreConfig::default())
    }

    /// Opens or creates a file-based store with the schema initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        Self::with_config(path, SqliteStoreConfig::default())
    }

    /// Creates a store with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteStoreConfig,
    ) -> RegistryResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        // Every new connection to ":memory:" opens a fresh, empty database,
        // so an in-memory store must hold exactly one pooled connection.
        let max_size = if is_memory { 1 } else { config.max_connections };

        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(std::time::Duration::from_millis(
                config.connection_timeout_ms,
            ))
            .build(manager)
            .map_err(|e| {
                RegistryError::Backend(BackendError::ConnectionFailed {
                    message: e.to_string(),
                })
            })?;

        let store = Self {
            pool,
            config,
            is_memory,
        };

        store.configure_connection()?;

        let conn = store.get_connection()?;
        schema::initialize_schema(&conn)?;

        Ok(store)
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> RegistryResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            RegistryError::Backend(BackendError::ConnectionFailed {
                message: e.to_string(),
            })
        })
    }

    /// Configure connection settings.
    fn configure_connection(&self) -> RegistryResult<()> {
        let conn = self.get_connection()?;

        conn.busy_timeout(std::time::Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(|e| internal_error(format!("Failed to set busy timeout: {}", e)))?;

        if self.config.enable_foreign_keys {
            conn.execute("PRAGMA foreign_keys = ON", [])
                .map_err(|e| internal_error(format!("Failed to enable foreign keys: {}", e)))?;
        }

        if self.config.enable_wal && !self.is_memory {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| internal_error(format!("Failed to enable WAL mode: {}", e)))?;
        }

        Ok(())
    }

    /// Registers a vehicle and returns the stored record.
    pub fn insert_vehicle(&self, new: NewVehicle) -> RegistryResult<Vehicle> {
        let conn = self.get_connection()?;

        let id = Uuid::new_v4();
        // Stored timestamps carry microsecond precision; truncate up front so
        // the returned record equals what a later read will parse.
        let created_at = new.created_at.unwrap_or_else(Utc::now);
        let created_at = chrono::DateTime::from_timestamp_micros(created_at.timestamp_micros())
            .unwrap_or(created_at);

        conn.execute(
            "INSERT INTO vehicles (id, created_at,
                plate_number, plate_norm,
                chassis_number, chassis_norm,
                registration_number, registration_norm,
                driver_name, office_id, office_name,
                vehicle_type, engine_type, wheels)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                id.to_string(),
                storage_timestamp(created_at),
                new.plate_number,
                normalize(&new.plate_number),
                new.chassis_number,
                new.chassis_number.as_deref().map(normalize),
                new.registration_number,
                new.registration_number.as_deref().map(normalize),
                new.driver_name,
                new.office_id.to_string(),
                new.office_name,
                new.vehicle_type,
                new.engine_type,
                new.wheels,
            ],
        )
        .map_err(|e| internal_error(format!("Failed to insert vehicle: {}", e)))?;

        Ok(Vehicle {
            id,
            created_at,
            plate_number: new.plate_number,
            chassis_number: new.chassis_number,
            registration_number: new.registration_number,
            driver_name: new.driver_name,
            office_id: new.office_id,
            office_name: new.office_name,
            vehicle_type: new.vehicle_type,
            engine_type: new.engine_type,
            wheels: new.wheels,
            latest_test: None,
        })
    }

    /// Reads a vehicle by id. Enrichment is not applied.
    pub fn get_vehicle(&self, id: Uuid) -> RegistryResult<Option<Vehicle>> {
        let conn = self.get_connection()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS),
            params![id.to_string()],
            read_vehicle_row,
        );

        match result {
            Ok(raw) => Ok(Some(raw.into_vehicle()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(internal_error(format!("Failed to read vehicle: {}", e))),
        }
    }

    /// Deletes a vehicle. Returns true if a row was removed.
    pub fn delete_vehicle(&self, id: Uuid) -> RegistryResult<bool> {
        let conn = self.get_connection()?;

        let affected = conn
            .execute("DELETE FROM vehicles WHERE id = ?1", params![id.to_string()])
            .map_err(|e| internal_error(format!("Failed to delete vehicle: {}", e)))?;

        Ok(affected > 0)
    }

    /// Records an emission test and returns its id.
    pub fn insert_test(&self, new: NewEmissionTest) -> RegistryResult<Uuid> {
        let conn = self.get_connection()?;

        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO emission_tests (id, vehicle_id, test_date, year, quarter, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                new.vehicle_id.to_string(),
                new.test_date.to_string(),
                new.year,
                new.quarter,
                new.result as i64,
            ],
        )
        .map_err(|e| internal_error(format!("Failed to insert emission test: {}", e)))?;

        Ok(id)
    }

    /// Returns the distinct attribute values in use, for filter dropdowns.
    pub fn filter_options(&self) -> RegistryResult<FilterOptions> {
        let conn = self.get_connection()?;

        let mut options = FilterOptions::default();
        options.offices = distinct_strings(&conn, "office_name")?;
        options.vehicle_types = distinct_strings(&conn, "vehicle_type")?;
        options.engine_types = distinct_strings(&conn, "engine_type")?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT wheels FROM vehicles ORDER BY wheels")
            .map_err(|e| internal_error(format!("Failed to prepare options query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|e| internal_error(format!("Failed to query wheel options: {}", e)))?;
        options.wheels = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read wheel options: {}", e)))?;

        Ok(options)
    }
}

fn distinct_strings(conn: &rusqlite::Connection, column: &str) -> RegistryResult<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT DISTINCT {col} FROM vehicles ORDER BY {col}",
            col = column
        ))
        .map_err(|e| internal_error(format!("Failed to prepare options query: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| internal_error(format!("Failed to query {} options: {}", column, e)))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| internal_error(format!("Failed to read {} options: {}", column, e)))
}

pub(crate) fn internal_error(message: String) -> RegistryError {
    RegistryError::Backend(BackendError::Internal {
        message,
        source: None,
    })
}

/// A vehicle row as read from SQLite, before parsing the typed fields.
pub(crate) struct RawVehicleRow {
    id: String,
    created_at: String,
    plate_number: String,
    chassis_number: Option<String>,
    registration_number: Option<String>,
    driver_name: String,
    office_id: String,
    office_name: String,
    vehicle_type: String,
    engine_type: String,
    wheels: i64,
}

/// Maps a row selected with [`VEHICLE_COLUMNS`].
pub(crate) fn read_vehicle_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVehicleRow> {
    Ok(RawVehicleRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        plate_number: row.get(2)?,
        chassis_number: row.get(3)?,
        registration_number: row.get(4)?,
        driver_name: row.get(5)?,
        office_id: row.get(6)?,
        office_name: row.get(7)?,
        vehicle_type: row.get(8)?,
        engine_type: row.get(9)?,
        wheels: row.get(10)?,
    })
}

impl RawVehicleRow {
    pub(crate) fn into_vehicle(self) -> RegistryResult<Vehicle> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| internal_error(format!("Failed to parse vehicle id: {}", e)))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| internal_error(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc);
        let office_id = Uuid::parse_str(&self.office_id)
            .map_err(|e| internal_error(format!("Failed to parse office id: {}", e)))?;

        Ok(Vehicle {
            id,
            created_at,
            plate_number: self.plate_number,
            chassis_number: self.chassis_number,
            registration_number: self.registration_number,
            driver_name: self.driver_name,
            office_id,
            office_name: self.office_name,
            vehicle_type: self.vehicle_type,
            engine_type: self.engine_type,
            wheels: self.wheels,
            latest_test: None,
        })
    }
}
