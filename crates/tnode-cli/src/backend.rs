//! Catalog and store selection.
//!
//! - Catalog: a fixture file when given, else [`HttpCatalog`] configured
//!   from `TNODE_CATALOG_*`.
//! - Store: PostgreSQL when `DATABASE_URL` is set, else in memory.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tnode_catalog::{CatalogConfig, CatalogFixture, EntityCatalog, HttpCatalog, StaticCatalog};
use tnode_core::NodeId;
use tnode_store::postgres::init_pool;
use tnode_store::{MemorySnapshotStore, PgSnapshotStore, SnapshotStore};

pub fn load_catalog(node_id: NodeId, fixture: Option<&Path>) -> anyhow::Result<Arc<dyn EntityCatalog>> {
    match fixture {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading catalog fixture {}", path.display()))?;
            let fixture: CatalogFixture = serde_json::from_str(&raw)
                .with_context(|| format!("parsing catalog fixture {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                entities = fixture.entities.len(),
                "using fixture catalog"
            );
            Ok(Arc::new(StaticCatalog::from_fixture(node_id, fixture)))
        }
        None => {
            let config = CatalogConfig::from_env().context("catalog configuration")?;
            tracing::info!(base_url = %config.base_url, "using HTTP catalog");
            Ok(Arc::new(HttpCatalog::new(config).context("building catalog client")?))
        }
    }
}

pub async fn open_store() -> anyhow::Result<Arc<dyn SnapshotStore>> {
    match init_pool().await.context("connecting to PostgreSQL")? {
        Some(pool) => Ok(Arc::new(PgSnapshotStore::new(pool))),
        None => Ok(Arc::new(MemorySnapshotStore::new())),
    }
}

/// Read commands need the snapshots of earlier runs.
pub async fn require_persistent_store() -> anyhow::Result<Arc<dyn SnapshotStore>> {
    match init_pool().await.context("connecting to PostgreSQL")? {
        Some(pool) => Ok(Arc::new(PgSnapshotStore::new(pool))),
        None => bail!("DATABASE_URL must be set to read stored snapshots"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fixture_catalog_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"entities":[{{"id":"r1","name":"alice/novel","type":"resource","versions":[{{"version":"1.0.0"}}]}}]}}"#
        )
        .unwrap();
        assert!(load_catalog(NodeId(1), Some(file.path())).is_ok());
    }

    #[test]
    fn malformed_fixture_is_reported_with_its_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_catalog(NodeId(1), Some(file.path())).err().unwrap();
        assert!(format!("{err:#}").contains("parsing catalog fixture"));
    }
}
