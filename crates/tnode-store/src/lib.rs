//! # tnode-store — Snapshot Persistence
//!
//! A resolution run produces one [`NodeSnapshot`] per node: the rule
//! record, the test resource records and their flattened dependency trees.
//! Stores replace a node's snapshot as a whole. Readers see either the
//! previous snapshot or the new one, never a mix.
//!
//! Two backends:
//!
//! - [`MemorySnapshotStore`]: in-process tables behind one lock.
//! - [`PgSnapshotStore`]: PostgreSQL, one transaction per replacement.

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::MemorySnapshotStore;
pub use postgres::PgSnapshotStore;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tnode_core::{NodeId, NodeTestRuleSnapshot, TestResourceRecord, TestResourceTreeRecord};

/// Everything a run persists for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub rule: NodeTestRuleSnapshot,
    pub test_resources: Vec<TestResourceRecord>,
    pub trees: Vec<TestResourceTreeRecord>,
}

impl NodeSnapshot {
    pub fn node_id(&self) -> NodeId {
        self.rule.node_id
    }

    /// Every record belongs to the rule's node, test resource ids are
    /// unique, and every tree belongs to exactly one resource.
    pub fn validate(&self) -> Result<(), StoreError> {
        let node_id = self.node_id();
        let inconsistent = |reason: String| StoreError::Inconsistent { node_id, reason };

        let mut ids = HashSet::new();
        if let Some(r) = self
            .test_resources
            .iter()
            .find(|r| !ids.insert(r.test_resource_id.as_str()))
        {
            return Err(inconsistent(format!(
                "test resource id {} is used by more than one record ({})",
                r.test_resource_id, r.test_resource_name
            )));
        }
        let mut tree_ids = HashSet::new();
        if let Some(t) = self
            .trees
            .iter()
            .find(|t| !tree_ids.insert(t.test_resource_id.as_str()))
        {
            return Err(inconsistent(format!(
                "test resource {} has more than one dependency tree",
                t.test_resource_id
            )));
        }

        if let Some(r) = self.test_resources.iter().find(|r| r.node_id != node_id) {
            return Err(inconsistent(format!(
                "test resource {} belongs to node {}",
                r.test_resource_id, r.node_id
            )));
        }
        if let Some(t) = self.trees.iter().find(|t| {
            t.node_id != node_id
                || !self
                    .test_resources
                    .iter()
                    .any(|r| r.test_resource_id == t.test_resource_id)
        }) {
            return Err(inconsistent(format!(
                "dependency tree {} has no matching test resource",
                t.test_resource_id
            )));
        }
        Ok(())
    }
}

/// Query over a node's test resources. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResourceFilter {
    pub node_id: Option<NodeId>,
    /// Keep resources carrying any of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_online: Option<bool>,
    pub resource_type: Option<String>,
    pub omit_resource_type: Option<String>,
    /// Case-insensitive match on the test resource name or origin name.
    pub keyword: Option<String>,
}

impl TestResourceFilter {
    pub fn for_node(node_id: NodeId) -> Self {
        Self {
            node_id: Some(node_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &TestResourceRecord) -> bool {
        if self.node_id.is_some_and(|n| n != record.node_id) {
            return false;
        }
        let state = &record.state_info;
        if !self.tags.is_empty() && !self.tags.iter().any(|t| state.tags_info.tags.contains(t)) {
            return false;
        }
        if self
            .is_online
            .is_some_and(|online| online != state.online_status_info.is_online)
        {
            return false;
        }
        if self
            .resource_type
            .as_deref()
            .is_some_and(|t| t != record.resource_type)
        {
            return false;
        }
        if self
            .omit_resource_type
            .as_deref()
            .is_some_and(|t| t == record.resource_type)
        {
            return false;
        }
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.is_empty()) {
            let needle = keyword.to_lowercase();
            let hit = record.test_resource_name.to_lowercase().contains(&needle)
                || record.origin_info.name.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Persistence for node snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Atomically replace everything stored for `snapshot.node_id()`.
    async fn replace_snapshot(&self, snapshot: &NodeSnapshot) -> Result<(), StoreError>;

    async fn rule_snapshot(&self, node_id: NodeId) -> Result<Option<NodeTestRuleSnapshot>, StoreError>;

    async fn test_resource(&self, test_resource_id: &str) -> Result<Option<TestResourceRecord>, StoreError>;

    /// Test resources matching `filter`, in run order. `filter.node_id` is
    /// required.
    async fn test_resources(&self, filter: &TestResourceFilter) -> Result<Vec<TestResourceRecord>, StoreError>;

    async fn dependency_tree(&self, test_resource_id: &str) -> Result<Option<TestResourceTreeRecord>, StoreError>;

    async fn dependency_trees(&self, node_id: NodeId) -> Result<Vec<TestResourceTreeRecord>, StoreError>;
}
