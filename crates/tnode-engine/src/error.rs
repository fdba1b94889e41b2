//! Engine error types.
//!
//! Only run-level failures surface here. A directive that cannot be applied
//! is not an error of the run; it is recorded on the directive itself.

use tnode_core::CompilationError;
use tnode_store::StoreError;

use crate::phase::PhaseError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The directive list did not compile. Nothing was persisted.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// The snapshot could not be written. The previous snapshot is intact.
    #[error("persisting snapshot failed: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}
