//! # tnode-catalog — Entity Catalog Access
//!
//! The resolution engine never talks to the catalog directly; it goes
//! through the [`EntityCatalog`] trait defined here. Two implementations
//! ship with the crate:
//!
//! - [`HttpCatalog`]: the catalog HTTP API. Unreachable or overloaded
//!   catalogs are retried per [`RetryPolicy`].
//! - [`StaticCatalog`]: an in-memory catalog loaded from fixtures, used by
//!   tests and by the CLI for offline runs.
//!
//! ## API Path Convention
//!
//! All endpoints live under `{base_url}/v2/` and answer with an envelope
//! `{ "ret": 0, "errcode": 0, "msg": "...", "data": ... }`. A `null` data
//! field or a 404 means "not found".

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod types;

pub use config::{CatalogConfig, ConfigError};
pub use error::CatalogError;
pub use http::HttpCatalog;
pub use memory::{CatalogFixture, StaticCatalog};
pub use retry::RetryPolicy;
pub use types::{CatalogEntity, CatalogVersion, PresentableInfo, Resolution, ResolvedEntity};

use async_trait::async_trait;
use tnode_core::{DependencyTreeNode, EntityType, NodeId, VersionRange};

/// Read access to the entity catalog.
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// Look up an entity and all its versions by name or id.
    async fn lookup_entity(
        &self,
        name_or_id: &str,
        entity_type: EntityType,
    ) -> Result<Option<CatalogEntity>, CatalogError>;

    /// Dependency tree rooted at the entity. `Some(vec![])` is a leaf with
    /// no recorded tree; `None` means the entity is unknown.
    async fn fetch_dependency_tree(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        version: Option<&str>,
    ) -> Result<Option<Vec<DependencyTreeNode>>, CatalogError>;

    /// A presentable published on the node under `presentable_name`.
    async fn find_presentable(
        &self,
        node_id: NodeId,
        presentable_name: &str,
    ) -> Result<Option<PresentableInfo>, CatalogError>;

    /// Resolve an entity reference to a concrete version.
    ///
    /// Resources resolve to the highest version inside `range` (default `*`).
    async fn resolve_entity(
        &self,
        name_or_id: &str,
        entity_type: EntityType,
        range: Option<&VersionRange>,
    ) -> Result<Resolution, CatalogError> {
        match self.lookup_entity(name_or_id, entity_type).await? {
            Some(entity) => Ok(entity.select(range)),
            None => Ok(Resolution::NotFound),
        }
    }
}
