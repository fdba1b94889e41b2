//! In-memory snapshot store.
//!
//! All three tables sit behind one `RwLock`, so a replacement is a single
//! critical section.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tnode_core::{NodeId, NodeTestRuleSnapshot, TestResourceRecord, TestResourceTreeRecord};

use crate::{NodeSnapshot, SnapshotStore, StoreError, TestResourceFilter};

#[derive(Debug, Default)]
struct Tables {
    rules: HashMap<NodeId, NodeTestRuleSnapshot>,
    resources: HashMap<NodeId, Vec<TestResourceRecord>>,
    trees: HashMap<NodeId, Vec<TestResourceTreeRecord>>,
}

/// In-memory [`SnapshotStore`]. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes with a stored snapshot.
    pub fn len(&self) -> usize {
        self.tables.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn replace_snapshot(&self, snapshot: &NodeSnapshot) -> Result<(), StoreError> {
        snapshot.validate()?;
        let node_id = snapshot.node_id();
        let mut tables = self.tables.write();
        tables.rules.insert(node_id, snapshot.rule.clone());
        tables
            .resources
            .insert(node_id, snapshot.test_resources.clone());
        tables.trees.insert(node_id, snapshot.trees.clone());
        tracing::debug!(
            node_id = %node_id,
            test_resources = snapshot.test_resources.len(),
            "snapshot replaced in memory"
        );
        Ok(())
    }

    async fn rule_snapshot(&self, node_id: NodeId) -> Result<Option<NodeTestRuleSnapshot>, StoreError> {
        Ok(self.tables.read().rules.get(&node_id).cloned())
    }

    async fn test_resource(&self, test_resource_id: &str) -> Result<Option<TestResourceRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .resources
            .values()
            .flatten()
            .find(|r| r.test_resource_id == test_resource_id)
            .cloned())
    }

    async fn test_resources(&self, filter: &TestResourceFilter) -> Result<Vec<TestResourceRecord>, StoreError> {
        let node_id = filter.node_id.ok_or(StoreError::MissingNode)?;
        Ok(self
            .tables
            .read()
            .resources
            .get(&node_id)
            .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn dependency_tree(&self, test_resource_id: &str) -> Result<Option<TestResourceTreeRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .trees
            .values()
            .flatten()
            .find(|t| t.test_resource_id == test_resource_id)
            .cloned())
    }

    async fn dependency_trees(&self, node_id: NodeId) -> Result<Vec<TestResourceTreeRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .trees
            .get(&node_id)
            .cloned()
            .unwrap_or_default())
    }
}
