//! In-memory catalog.
//!
//! Holds entities, dependency trees and presentables registered up front.
//! Entities without a registered tree resolve to a single-node tree built
//! from their metadata.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tnode_core::{DependencyTreeNode, EntityType, NodeId};

use crate::error::CatalogError;
use crate::types::{CatalogEntity, PresentableInfo, Resolution};
use crate::EntityCatalog;

/// A dependency tree registered for one entity version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeFixture {
    pub entity_id: String,
    #[serde(default)]
    pub version: String,
    pub tree: Vec<DependencyTreeNode>,
}

/// File format for loading a [`StaticCatalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFixture {
    #[serde(default)]
    pub entities: Vec<CatalogEntity>,
    #[serde(default)]
    pub trees: Vec<TreeFixture>,
    #[serde(default)]
    pub presentables: Vec<PresentableInfo>,
}

#[derive(Debug, Default)]
struct Tables {
    entities: Vec<CatalogEntity>,
    trees: HashMap<(String, String), Vec<DependencyTreeNode>>,
    presentables: HashMap<(NodeId, String), PresentableInfo>,
    unavailable: bool,
}

/// In-memory [`EntityCatalog`].
#[derive(Debug, Default)]
pub struct StaticCatalog {
    tables: RwLock<Tables>,
    lookups: AtomicUsize,
    tree_fetches: AtomicUsize,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog whose presentables all belong to `node_id`.
    pub fn from_fixture(node_id: NodeId, fixture: CatalogFixture) -> Self {
        let catalog = Self::new();
        for entity in fixture.entities {
            catalog.insert_entity(entity);
        }
        for tree in fixture.trees {
            catalog.insert_tree(&tree.entity_id, &tree.version, tree.tree);
        }
        for presentable in fixture.presentables {
            catalog.insert_presentable(node_id, presentable);
        }
        catalog
    }

    /// Register an entity. A later entity with the same id replaces it.
    pub fn insert_entity(&self, entity: CatalogEntity) {
        let mut tables = self.tables.write();
        tables
            .entities
            .retain(|e| !(e.id == entity.id && e.entity_type == entity.entity_type));
        tables.entities.push(entity);
    }

    /// Register the tree of `entity_id` at `version` (empty for objects).
    pub fn insert_tree(&self, entity_id: &str, version: &str, tree: Vec<DependencyTreeNode>) {
        self.tables
            .write()
            .trees
            .insert((entity_id.to_string(), version.to_string()), tree);
    }

    pub fn insert_presentable(&self, node_id: NodeId, presentable: PresentableInfo) {
        self.tables
            .write()
            .presentables
            .insert((node_id, presentable.presentable_name.clone()), presentable);
    }

    /// Make every call fail as if the catalog were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.tables.write().unavailable = unavailable;
    }

    /// Number of entity lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of tree fetches served so far.
    pub fn tree_fetch_count(&self) -> usize {
        self.tree_fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self, tables: &Tables) -> Result<(), CatalogError> {
        if tables.unavailable {
            return Err(CatalogError::Unavailable("static catalog is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityCatalog for StaticCatalog {
    async fn lookup_entity(
        &self,
        name_or_id: &str,
        entity_type: EntityType,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read();
        self.check_available(&tables)?;
        Ok(tables
            .entities
            .iter()
            .find(|e| e.entity_type == entity_type && (e.id == name_or_id || e.name == name_or_id))
            .cloned())
    }

    async fn fetch_dependency_tree(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        version: Option<&str>,
    ) -> Result<Option<Vec<DependencyTreeNode>>, CatalogError> {
        self.tree_fetches.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read();
        self.check_available(&tables)?;

        let version = version.unwrap_or_default();
        if let Some(tree) = tables
            .trees
            .get(&(entity_id.to_string(), version.to_string()))
        {
            return Ok(Some(tree.clone()));
        }

        let Some(entity) = tables
            .entities
            .iter()
            .find(|e| e.entity_type == entity_type && e.id == entity_id)
        else {
            return Ok(None);
        };
        let exact = if version.is_empty() {
            None
        } else {
            Some(tnode_core::VersionRange::parse(&format!("={version}")).map_err(|e| {
                CatalogError::Unavailable(format!("bad version '{version}': {e}"))
            })?)
        };
        match entity.select(exact.as_ref()) {
            Resolution::Resolved(resolved) => Ok(Some(vec![resolved.to_tree_node()])),
            _ => Ok(None),
        }
    }

    async fn find_presentable(
        &self,
        node_id: NodeId,
        presentable_name: &str,
    ) -> Result<Option<PresentableInfo>, CatalogError> {
        let tables = self.tables.read();
        self.check_available(&tables)?;
        Ok(tables
            .presentables
            .get(&(node_id, presentable_name.to_string()))
            .cloned())
    }
}
