//! Core types: records, cursors, and pages.

mod pagination;
mod record;

pub use pagination::{DEFAULT_LIMIT, Direction, MAX_LIMIT, Page, PageCursor, PageRequest};
pub use record::{EmissionTest, FilterOptions, LatestTest, NewEmissionTest, NewVehicle, Vehicle};

pub(crate) use pagination::{CursorMode, storage_timestamp};
