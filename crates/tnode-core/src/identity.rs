//! # Node Identity
//!
//! Newtype wrappers for node and user identifiers, plus the deterministic
//! hash helpers that derive test resource ids, directive ids and tree node
//! ids. Every derived id is a lowercase hex prefix of a SHA-256 digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a test node (the unit of rule ownership and locking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Identifier of the user owning a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex-encode the SHA-256 digest of `input`, truncated to `len` characters.
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.chars().take(len).collect()
}

/// Stable id of a test resource: derived from the owning node and the
/// test resource name, so re-running the same rules yields the same ids.
pub fn test_resource_id(node_id: NodeId, test_resource_name: &str) -> String {
    short_hash(&format!("{}-{}", node_id.0, test_resource_name), 32)
}
