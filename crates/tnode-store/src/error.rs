//! Store error types.

use tnode_core::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("identifier {0} does not fit a BIGINT column")]
    IdOutOfRange(u64),

    #[error("test resource query must name a node")]
    MissingNode,

    #[error("snapshot for node {node_id} is inconsistent: {reason}")]
    Inconsistent { node_id: NodeId, reason: String },
}
