//! Repository layer: table-scoped database operations for each schema.
//!
//! All public functions are re-exported here.

mod audit_row;
mod high_risk;
mod pair_cache;
mod patient;

pub use audit_row::*;
pub use high_risk::*;
pub use pair_cache::*;
pub use patient::*;
