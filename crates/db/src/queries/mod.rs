// crates/db/src/queries/mod.rs
// Query methods on `Database`, grouped by table.

mod observations;
mod registry;
mod series;

pub use observations::{FilterOptions, InsertSummary, ObservationRow, OnConflict};
pub use registry::ForecastEntry;
