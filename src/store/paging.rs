//! Keyset page fetching over the vehicle collection.
//!
//! Pages are bounded by `(created_at, id)` tuple comparisons rather than row
//! offsets, so chained page fetches never repeat or skip a row while writers
//! insert or delete concurrently. Three mutually exclusive modes:
//!
//! - **First** — no cursor; the newest `limit` rows.
//! - **After** — rows strictly older than the boundary (forward).
//! - **Before** — rows strictly newer than the boundary (backward), fetched
//!   ascending so the extra-row trick finds the *nearest* newer rows, then
//!   reversed back to descending for the response.
//!
//! Whether more rows exist comes from fetching `limit + 1` rows and trimming
//! the extra; the Before mode additionally needs an existence probe for the
//! older side, since its fetch explored the newer side of the window. Every
//! call is a single independent read; there is no cross-call state and no
//! locking against concurrent writers.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, ToSql};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::RegistryResult;
use crate::query::{SqlFragment, SqlParam, VehicleFilter, search_predicate};
use crate::types::{CursorMode, Direction, LatestTest, Page, PageCursor, PageRequest, Vehicle};

use super::{SqliteStore, VEHICLE_COLUMNS, internal_error, read_vehicle_row};

/// Outcome of translating a legacy offset into a cursor.
enum SkipResolution {
    /// The offset landed on a row; continue after it.
    After(PageCursor),
    /// The offset is at or past the end of the collection.
    OutOfRange,
}

impl SqliteStore {
    /// Fetches one page of vehicles matching `filter`, newest first.
    ///
    /// Honors at most one of `after`/`before` in the request; supplying both
    /// is a validation error. A legacy `skip` is translated into an `after`
    /// cursor by one bounded seek query before the page query runs; a `skip`
    /// past the end of the collection yields an empty page.
    pub fn fetch_page(
        &self,
        filter: &VehicleFilter,
        page: &PageRequest,
    ) -> RegistryResult<Page<Vehicle>> {
        self.fetch_page_with(filter.predicate(), page)
    }

    /// Fetches one page of vehicles matching a free-text search term.
    ///
    /// A blank term matches nothing and returns an empty page without
    /// querying. Pagination behaves exactly as in [`fetch_page`](Self::fetch_page).
    pub fn search_page(&self, term: &str, page: &PageRequest) -> RegistryResult<Page<Vehicle>> {
        match search_predicate(term) {
            Some(predicate) => self.fetch_page_with(predicate, page),
            None => Ok(Page::empty(page.clamped_limit())),
        }
    }

    /// Returns whether at least one vehicle matching `filter` exists strictly
    /// beyond `boundary` in `direction`, with a single `LIMIT 1` query.
    pub fn has_more(
        &self,
        filter: &VehicleFilter,
        boundary: &PageCursor,
        direction: Direction,
    ) -> RegistryResult<bool> {
        let conn = self.get_connection()?;
        probe_beyond(&conn, &filter.predicate(), boundary, direction)
    }

    /// Attaches the most recent emission test to each vehicle in place.
    ///
    /// One batched query for the whole slice, reduced in memory to the
    /// maximum `(test_date, id)` per vehicle. Never one query per vehicle.
    pub fn attach_latest_tests(&self, vehicles: &mut [Vehicle]) -> RegistryResult<()> {
        if vehicles.is_empty() {
            return Ok(());
        }
        let conn = self.get_connection()?;

        let ids: Vec<String> = vehicles.iter().map(|v| v.id.to_string()).collect();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT vehicle_id, test_date, result, id FROM emission_tests
             WHERE vehicle_id IN ({})",
            placeholders
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare test lookup: {}", e)))?;
        let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let vehicle_id: String = row.get(0)?;
                let test_date: String = row.get(1)?;
                let result: i64 = row.get(2)?;
                let test_id: String = row.get(3)?;
                Ok((vehicle_id, test_date, result, test_id))
            })
            .map_err(|e| internal_error(format!("Failed to query emission tests: {}", e)))?;

        // Group by vehicle and keep the test with the greatest (date, id).
        let mut latest: HashMap<Uuid, (NaiveDate, String, bool)> = HashMap::new();
        for row in rows {
            let (vehicle_id, test_date, result, test_id) =
                row.map_err(|e| internal_error(format!("Failed to read test row: {}", e)))?;
            let vehicle_id = Uuid::parse_str(&vehicle_id)
                .map_err(|e| internal_error(format!("Failed to parse vehicle id: {}", e)))?;
            let test_date: NaiveDate = test_date
                .parse()
                .map_err(|e| internal_error(format!("Failed to parse test date: {}", e)))?;

            match latest.get(&vehicle_id) {
                Some((date, id, _)) if (*date, id.as_str()) >= (test_date, test_id.as_str()) => {}
                _ => {
                    latest.insert(vehicle_id, (test_date, test_id, result != 0));
                }
            }
        }

        for vehicle in vehicles {
            vehicle.latest_test = latest
                .get(&vehicle.id)
                .map(|(test_date, _, result)| LatestTest {
                    test_date: *test_date,
                    result: *result,
                });
        }

        Ok(())
    }

    fn fetch_page_with(
        &self,
        predicate: SqlFragment,
        page: &PageRequest,
    ) -> RegistryResult<Page<Vehicle>> {
        let limit = page.clamped_limit();
        let conn = self.get_connection()?;

        let mut mode = page.cursor_mode()?;

        // Legacy offset support: translated once into an `after` cursor and
        // never threaded into the page query itself. The translation and the
        // page fetch are two unsynchronized reads; a concurrent write between
        // them can shift the boundary by the rows it touched. Accepted
        // trade-off; do not wrap the two in a transaction.
        if let (CursorMode::First, Some(skip)) = (mode, page.skip) {
            if skip > 0 {
                match translate_skip(&conn, &predicate, skip)? {
                    SkipResolution::After(cursor) => mode = CursorMode::After(cursor),
                    SkipResolution::OutOfRange => return Ok(Page::empty(limit)),
                }
            }
        }

        tracing::debug!(?mode, limit, "fetching vehicle page");

        match mode {
            CursorMode::First => {
                let mut rows =
                    select_rows(&conn, &predicate, None, SortOrder::Descending, limit + 1)?;
                let more_older = trim_extra(&mut rows, limit);
                let items = into_vehicles(rows)?;

                Ok(Page {
                    next_cursor: more_older.then(|| cursor_of(items.last())).flatten(),
                    prev_cursor: None,
                    items,
                    limit,
                })
            }
            CursorMode::After(boundary) => {
                let mut rows = select_rows(
                    &conn,
                    &predicate,
                    Some((&boundary, Direction::Older)),
                    SortOrder::Descending,
                    limit + 1,
                )?;
                let more_older = trim_extra(&mut rows, limit);
                let items = into_vehicles(rows)?;

                // An `after` cursor means newer records exist by definition
                // (at least the boundary itself, even if since deleted), so
                // the previous cursor is derived without a probe.
                Ok(Page {
                    next_cursor: more_older.then(|| cursor_of(items.last())).flatten(),
                    prev_cursor: cursor_of(items.first()),
                    items,
                    limit,
                })
            }
            CursorMode::Before(boundary) => {
                let mut rows = select_rows(
                    &conn,
                    &predicate,
                    Some((&boundary, Direction::Newer)),
                    SortOrder::Ascending,
                    limit + 1,
                )?;
                let more_newer = trim_extra(&mut rows, limit);
                rows.reverse();
                let items = into_vehicles(rows)?;

                // The ascending fetch explored the newer side only; whether
                // older rows exist takes an existence probe from the oldest
                // retained item.
                let more_older = match items.last() {
                    Some(oldest) => probe_beyond(
                        &conn,
                        &predicate,
                        &PageCursor::new(oldest.created_at, oldest.id),
                        Direction::Older,
                    )?,
                    None => false,
                };

                Ok(Page {
                    next_cursor: more_older.then(|| cursor_of(items.last())).flatten(),
                    prev_cursor: more_newer.then(|| cursor_of(items.first())).flatten(),
                    items,
                    limit,
                })
            }
        }
    }
}

/// Sort direction of the page query.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SortOrder {
    Descending,
    Ascending,
}

/// The strict tuple comparison that bounds a page at `cursor` in `direction`.
///
/// Purely relational, so the predicate works whether or not the boundary row
/// still exists.
fn boundary_condition(cursor: &PageCursor, direction: Direction) -> SqlFragment {
    let op = match direction {
        Direction::Older => "<",
        Direction::Newer => ">",
    };
    SqlFragment::with_params(
        format!("created_at {op} ? OR (created_at = ? AND id {op} ?)"),
        vec![
            SqlParam::string(cursor.timestamp_str()),
            SqlParam::string(cursor.timestamp_str()),
            SqlParam::string(cursor.id().to_string()),
        ],
    )
}

fn select_rows(
    conn: &Connection,
    predicate: &SqlFragment,
    boundary: Option<(&PageCursor, Direction)>,
    order: SortOrder,
    fetch: i64,
) -> RegistryResult<Vec<super::RawVehicleRow>> {
    let mut combined = predicate.clone();
    if let Some((cursor, direction)) = boundary {
        combined = combined.and(boundary_condition(cursor, direction));
    }

    let dir = match order {
        SortOrder::Descending => "DESC",
        SortOrder::Ascending => "ASC",
    };
    let sql = format!(
        "SELECT {} FROM vehicles{} ORDER BY created_at {dir}, id {dir} LIMIT {}",
        VEHICLE_COLUMNS,
        where_clause(&combined),
        fetch,
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| internal_error(format!("Failed to prepare page query: {}", e)))?;
    let params: Vec<&dyn ToSql> = combined.params.iter().map(|p| p.as_sql()).collect();
    let rows = stmt
        .query_map(params.as_slice(), read_vehicle_row)
        .map_err(|e| internal_error(format!("Failed to execute page query: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| internal_error(format!("Failed to read vehicle row: {}", e)))
}

/// Issues the bounded existence query: is there at least one matching row
/// strictly beyond `boundary` in `direction`?
fn probe_beyond(
    conn: &Connection,
    predicate: &SqlFragment,
    boundary: &PageCursor,
    direction: Direction,
) -> RegistryResult<bool> {
    let combined = predicate
        .clone()
        .and(boundary_condition(boundary, direction));
    let sql = format!("SELECT 1 FROM vehicles{} LIMIT 1", where_clause(&combined));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| internal_error(format!("Failed to prepare existence probe: {}", e)))?;
    let params: Vec<&dyn ToSql> = combined.params.iter().map(|p| p.as_sql()).collect();

    match stmt.query_row(params.as_slice(), |_| Ok(())) {
        Ok(()) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(internal_error(format!("Existence probe failed: {}", e))),
    }
}

/// Seeks to the row a legacy offset points at and returns it as an `after`
/// boundary. One bounded query, not re-invoked per row.
fn translate_skip(
    conn: &Connection,
    predicate: &SqlFragment,
    skip: i64,
) -> RegistryResult<SkipResolution> {
    let sql = format!(
        "SELECT id, created_at FROM vehicles{} ORDER BY created_at DESC, id DESC LIMIT 1 OFFSET {}",
        where_clause(predicate),
        skip - 1,
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| internal_error(format!("Failed to prepare skip translation: {}", e)))?;
    let params: Vec<&dyn ToSql> = predicate.params.iter().map(|p| p.as_sql()).collect();

    let row = stmt.query_row(params.as_slice(), |row| {
        let id: String = row.get(0)?;
        let created_at: String = row.get(1)?;
        Ok((id, created_at))
    });

    match row {
        Ok((id, created_at)) => {
            let id = Uuid::parse_str(&id)
                .map_err(|e| internal_error(format!("Failed to parse vehicle id: {}", e)))?;
            let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| internal_error(format!("Failed to parse created_at: {}", e)))?
                .with_timezone(&Utc);
            Ok(SkipResolution::After(PageCursor::new(created_at, id)))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(SkipResolution::OutOfRange),
        Err(e) => Err(internal_error(format!("Skip translation failed: {}", e))),
    }
}

fn where_clause(fragment: &SqlFragment) -> String {
    if fragment.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", fragment.sql)
    }
}

/// Drops the extra probe row fetched beyond `limit`; returns whether it was
/// present (i.e. more rows exist past this page in the fetched direction).
fn trim_extra(rows: &mut Vec<super::RawVehicleRow>, limit: i64) -> bool {
    if rows.len() as i64 > limit {
        rows.pop();
        true
    } else {
        false
    }
}

fn into_vehicles(rows: Vec<super::RawVehicleRow>) -> RegistryResult<Vec<Vehicle>> {
    rows.into_iter().map(|row| row.into_vehicle()).collect()
}

fn cursor_of(vehicle: Option<&Vehicle>) -> Option<String> {
    vehicle.map(|v| PageCursor::new(v.created_at, v.id).encode())
}
