//! Declarative predicate construction for filters and free-text search.

mod filter;
mod fragment;

pub use filter::{VehicleFilter, normalize, search_predicate};
pub use fragment::{SqlFragment, SqlParam};
