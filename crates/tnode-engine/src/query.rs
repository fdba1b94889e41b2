//! Read operations over stored snapshots.
//!
//! Nothing here touches the catalog. Trees are rebuilt from the flattened
//! records written by the last successful run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tnode_core::tree::{contains_dependency, filter_by_dependency, rebuild, search_by_keyword};
use tnode_core::{
    DependencySearchHit, DependencyTreeNode, EntityType, FilteredDependencyNode, NodeId, NodeTestRuleSnapshot,
    TestResourceRecord, VersionRange,
};
use tnode_store::{SnapshotStore, TestResourceFilter};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// A test resource whose dependency tree contains the searched entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResourceHit {
    pub test_resource_id: String,
    pub test_resource_name: String,
}

#[derive(Clone)]
pub struct TestNodeQueries {
    store: Arc<dyn SnapshotStore>,
    config: EngineConfig,
}

impl TestNodeQueries {
    pub fn new(store: Arc<dyn SnapshotStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Nested dependency tree of a test resource, starting at `nid` or at
    /// the root. `None` when the test resource has no stored tree.
    pub async fn get_dependency_tree(
        &self,
        test_resource_id: &str,
        nid: Option<&str>,
        max_deep: Option<usize>,
        include_root: bool,
    ) -> Result<Option<Vec<DependencyTreeNode>>, EngineError> {
        let Some(tree) = self.store.dependency_tree(test_resource_id).await? else {
            return Ok(None);
        };
        let max_deep = max_deep.unwrap_or(self.config.default_max_deep);
        Ok(Some(rebuild(&tree.dependency_tree, nid, max_deep, include_root)))
    }

    /// The paths of a test resource's tree that lead to `entity_id`.
    pub async fn filter_dependency_tree(
        &self,
        test_resource_id: &str,
        entity_id: &str,
        entity_type: EntityType,
        range: Option<&VersionRange>,
    ) -> Result<Option<Vec<FilteredDependencyNode>>, EngineError> {
        let Some(tree) = self.store.dependency_tree(test_resource_id).await? else {
            return Ok(None);
        };
        Ok(Some(filter_by_dependency(&tree.dependency_tree, entity_id, entity_type, range)))
    }

    /// Test resources of `node_id` that depend on `entity_id` anywhere in
    /// their tree.
    pub async fn search_by_dependency(
        &self,
        node_id: NodeId,
        entity_id: &str,
        range: Option<&VersionRange>,
    ) -> Result<Vec<TestResourceHit>, EngineError> {
        let trees = self.store.dependency_trees(node_id).await?;
        Ok(trees
            .into_iter()
            .filter(|t| contains_dependency(&t.dependency_tree, entity_id, range))
            .map(|t| TestResourceHit {
                test_resource_id: t.test_resource_id,
                test_resource_name: t.test_resource_name,
            })
            .collect())
    }

    /// Entities anywhere in the node's trees whose name contains `keyword`.
    pub async fn search_by_keyword(
        &self,
        node_id: NodeId,
        keyword: &str,
    ) -> Result<Vec<DependencySearchHit>, EngineError> {
        let trees = self.store.dependency_trees(node_id).await?;
        Ok(search_by_keyword(trees.iter().flat_map(|t| t.dependency_tree.iter()), keyword))
    }

    pub async fn rule_snapshot(&self, node_id: NodeId) -> Result<Option<NodeTestRuleSnapshot>, EngineError> {
        Ok(self.store.rule_snapshot(node_id).await?)
    }

    pub async fn find_test_resources(
        &self,
        filter: &TestResourceFilter,
    ) -> Result<Vec<TestResourceRecord>, EngineError> {
        Ok(self.store.test_resources(filter).await?)
    }
}
