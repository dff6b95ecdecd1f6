//! kba-reconcile
//!
//! Change reconciliation engine.
//!
//! - `routes`: record type -> destination table (historical `NL_` / real-time
//!   `RT_`), destination table -> natural key
//! - `engine`: New / Update / Delete -> insert / insert-or-replace / keyed delete
//! - `importer`: raw bytes -> parser registry -> engine
//!
//! Results are always returned, never raised.

mod engine;
mod importer;
mod routes;

pub use engine::{
    keyed_delete, ApplyResult, Operation, Reconciler, UpdatePolicy, ERR_MISSING_KEY_VALUE,
    ERR_NO_PRIMARY_KEY,
};
pub use importer::{ImportOutcome, Importer};
pub use routes::{primary_key, TableRoute, HISTORICAL_PREFIX, REALTIME_PREFIX};
