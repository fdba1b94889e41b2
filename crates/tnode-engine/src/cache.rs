//! Per-run catalog memoization.
//!
//! One [`RunCatalog`] lives for exactly one resolution run. Lookups are
//! memoized by `(name, type, range)` and trees by `(id, type, version)`.
//! Failed lookups are not cached. The cache lock is never held across an
//! await.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use parking_lot::Mutex;
use tnode_catalog::{EntityCatalog, PresentableInfo, Resolution, ResolvedEntity};
use tnode_core::{DependencyTreeNode, EntityRef, EntityType, NodeId, ResolutionError};

type EntityKey = (String, EntityType, String);
type TreeKey = (String, EntityType, String);

pub(crate) struct RunCatalog<'a> {
    catalog: &'a dyn EntityCatalog,
    node_id: NodeId,
    entities: Mutex<HashMap<EntityKey, Resolution>>,
    trees: Mutex<HashMap<TreeKey, Vec<DependencyTreeNode>>>,
    presentables: Mutex<HashMap<String, Option<PresentableInfo>>>,
}

fn unavailable(name: &str, error: impl std::fmt::Display) -> ResolutionError {
    ResolutionError::CatalogUnavailable {
        name: name.to_string(),
        reason: error.to_string(),
    }
}

impl<'a> RunCatalog<'a> {
    pub(crate) fn new(catalog: &'a dyn EntityCatalog, node_id: NodeId) -> Self {
        Self {
            catalog,
            node_id,
            entities: Mutex::new(HashMap::new()),
            trees: Mutex::new(HashMap::new()),
            presentables: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `entity` to a pinned version.
    pub(crate) async fn resolve(&self, entity: &EntityRef) -> Result<ResolvedEntity, ResolutionError> {
        let range = entity.range();
        let key = (entity.name.clone(), entity.entity_type, range.as_str().to_string());

        let cached = self.entities.lock().get(&key).cloned();
        let resolution = match cached {
            Some(resolution) => resolution,
            None => {
                let resolution = self
                    .catalog
                    .resolve_entity(&entity.name, entity.entity_type, Some(&range))
                    .await
                    .map_err(|e| unavailable(&entity.name, e))?;
                self.entities.lock().insert(key, resolution.clone());
                resolution
            }
        };

        match resolution {
            Resolution::Resolved(resolved) => Ok(resolved),
            Resolution::NotFound => Err(ResolutionError::EntityNotFound {
                name: entity.name.clone(),
                entity_type: entity.entity_type,
            }),
            Resolution::VersionUnsatisfied { .. } => Err(ResolutionError::VersionUnsatisfied {
                name: entity.name.clone(),
                range: range.to_string(),
            }),
        }
    }

    /// Dependency tree of a resolved entity; never empty.
    pub(crate) async fn tree(&self, entity: &ResolvedEntity) -> Result<Vec<DependencyTreeNode>, ResolutionError> {
        let key = (entity.id.clone(), entity.entity_type, entity.version.clone());
        let cached = self.trees.lock().get(&key).cloned();
        if let Some(tree) = cached {
            return Ok(tree);
        }

        let version = (!entity.version.is_empty()).then_some(entity.version.as_str());
        let fetched = self
            .catalog
            .fetch_dependency_tree(&entity.id, entity.entity_type, version)
            .await
            .map_err(|e| unavailable(&entity.name, e))?;
        let tree = match fetched {
            None => {
                return Err(ResolutionError::TreeUnavailable {
                    name: entity.name.clone(),
                    entity_type: entity.entity_type,
                })
            }
            Some(tree) if tree.is_empty() => vec![entity.to_tree_node()],
            Some(tree) => tree,
        };
        self.trees.lock().insert(key, tree.clone());
        Ok(tree)
    }

    /// Presentable of the run's node published as `name`.
    pub(crate) async fn presentable(&self, name: &str) -> Result<Option<PresentableInfo>, ResolutionError> {
        let cached = self.presentables.lock().get(name).cloned();
        if let Some(presentable) = cached {
            return Ok(presentable);
        }
        let presentable = self
            .catalog
            .find_presentable(self.node_id, name)
            .await
            .map_err(|e| unavailable(name, e))?;
        self.presentables
            .lock()
            .insert(name.to_string(), presentable.clone());
        Ok(presentable)
    }

    /// Resolve `entities` and fetch their trees concurrently, warming the
    /// cache for the sequential pass. Errors are left for that pass.
    pub(crate) async fn prefetch<'r>(&self, entities: impl IntoIterator<Item = &'r EntityRef>) {
        let mut seen = HashSet::new();
        let unique: Vec<&EntityRef> = entities
            .into_iter()
            .filter(|e| seen.insert((e.name.as_str(), e.entity_type, e.range().to_string())))
            .collect();
        if unique.is_empty() {
            return;
        }
        tracing::debug!(node_id = %self.node_id, candidates = unique.len(), "prefetching catalog entities");
        join_all(unique.into_iter().map(|entity| async move {
            if let Ok(resolved) = self.resolve(entity).await {
                let _ = self.tree(&resolved).await;
            }
        }))
        .await;
    }
}
