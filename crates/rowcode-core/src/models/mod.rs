//! Data models for the application
//!
//! Everything here is scoped to a single conversion run: the user's encoding
//! configuration, the rows read from the data source, the generated artifacts and the
//! counters reported while the run is in flight.

mod conversion;
mod item;
mod stats;

pub use conversion::*;
pub use item::*;
pub use stats::*;
