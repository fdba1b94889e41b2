//! # tnode-engine — Test Node Rule Resolution
//!
//! Applies a node's compiled directive list against the entity catalog and
//! persists the result as the node's new snapshot.
//!
//! ## Run lifecycle
//!
//! ```text
//! Idle → Compiling → Resolving → Flattening → Persisting → Idle
//! ```
//!
//! - **Compiling** validates directives. Failure aborts the run.
//! - **Resolving** applies directives in order to a working set. A
//!   directive that cannot be applied is marked invalid; the run goes on.
//! - **Flattening** turns working records into storable records.
//! - **Persisting** replaces the node's snapshot atomically.
//!
//! Runs for the same node are serialized by [`NodeLocks`]; runs for
//! different nodes proceed in parallel.

pub(crate) mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod phase;
pub mod query;
pub(crate) mod resolve;
pub mod working_set;

pub use config::EngineConfig;
pub use engine::{RunOutcome, TestRuleEngine};
pub use error::EngineError;
pub use lock::{NodeLockGuard, NodeLocks};
pub use phase::{PhaseError, ResolutionRun, RunPhase};
pub use query::{TestNodeQueries, TestResourceHit};
pub use working_set::WorkingSet;
