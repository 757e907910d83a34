//! Keyset-paginated record browsing for a vehicle emissions testing registry.
//!
//! This crate is the record-browsing subsystem of an emissions-testing
//! backend: it pages through large, filterable vehicle collections ordered by
//! recency, using keyset (cursor-based) pagination instead of row offsets.
//! Page boundaries are `(created_at, id)` tuples encoded into opaque cursors,
//! so navigation stays stable while other writers insert and delete records
//! concurrently.
//!
//! # What's here
//!
//! - [`types::PageCursor`] — opaque boundary tokens,
//!   `base64url("<ISO-8601 created_at>|<uuid>")`
//! - [`query::VehicleFilter`] / [`query::search_predicate`] — declarative
//!   field filters and free-text search, with normalized identifier matching
//!   (`"ABC-1234"` finds `"abc 1234"`)
//! - [`store::SqliteStore`] — the SQLite record store with the page fetcher,
//!   existence probe, legacy-offset translation, and the batched
//!   latest-test-per-vehicle enrichment
//!
//! Routing, authentication, and business CRUD live in the calling service;
//! this crate only reads records and builds pages.
//!
//! # Quick start
//!
//! ```no_run
//! use emission_registry::query::VehicleFilter;
//! use emission_registry::store::SqliteStore;
//! use emission_registry::types::PageRequest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::open("registry.db")?;
//!
//! // First page: newest 20 diesel trucks.
//! let filter = VehicleFilter {
//!     vehicle_type: Some("Truck".to_string()),
//!     engine_type: Some("Diesel".to_string()),
//!     ..Default::default()
//! };
//! let page = store.fetch_page(&filter, &PageRequest::new().with_limit(20))?;
//!
//! // Follow the cursor to the next (older) page.
//! if let Some(cursor) = page.next_cursor {
//!     let older = store.fetch_page(
//!         &filter,
//!         &PageRequest::new().with_limit(20).with_after(cursor),
//!     )?;
//!     assert!(older.len() <= 20);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Every page fetch is a single bounded read with no cross-call state; calls
//! may run concurrently with each other and with writers without
//! coordination. The one documented exception is legacy `skip` translation,
//! which is two unsynchronized reads — see
//! [`store::SqliteStore::fetch_page`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod query;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{RegistryError, RegistryResult};
pub use query::VehicleFilter;
pub use store::SqliteStore;
pub use types::{Page, PageCursor, PageRequest, Vehicle};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
