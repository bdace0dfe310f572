//! Drug-pair audit pipeline
//!
//! Finds risky drug combinations across every polypharmacy patient while
//! asking the external scorers about each distinct pair only once.
//!
//! ## Architecture
//!
//! ```text
//! PatientSource → plan_pairs → AuditScheduler::fill (cache + scorers)
//!               → AuditScheduler::fan_out → ResultSink
//! ```
//!
//! - Pairs are canonicalized so (A, B) and (B, A) share one cache key.
//! - Phase 1 evaluates each distinct pair once, pacing literature calls.
//! - Phase 2 re-expands the pair verdicts to every patient row.
//! - Lookup failures become visible verdicts; they are never cached.

pub mod error;
pub mod types;
pub mod traits;
pub mod pair;
pub mod dedup;
pub mod biologics;
pub mod pacing;
pub mod cache;
pub mod sqlite_cache;
pub mod source;
pub mod sink;
pub mod scheduler;
pub mod runner;

pub use error::AuditError;
pub use types::*;
pub use traits::*;
pub use pair::{canonicalize, DrugPair};
pub use dedup::{plan_pairs, PairOccurrence, PairPlan};
pub use biologics::BiologicClassifier;
pub use pacing::Pacer;
pub use cache::{CacheEntry, JsonFileCache, MemoryPairCache};
pub use sqlite_cache::SqlitePairCache;
pub use source::SqlitePatientSource;
pub use sink::{bucket_name, SqliteResultSink};
pub use scheduler::AuditScheduler;
pub use runner::{new_run_id, run_full_audit};
