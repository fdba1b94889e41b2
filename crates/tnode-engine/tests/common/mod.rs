//! Shared catalog fixture for engine tests.
//!
//! ```text
//! alice/app 1.0.0 (widget)
//! ├── alice/lib-a 1.0.0
//! │   └── alice/lib-c 1.0.0
//! └── alice/lib-b 1.0.0
//! ```
//!
//! `alice/lib-d` has versions 1.0.0 and 2.0.0. `alice/dark` is a theme.
//! Node 1 publishes `alice/app` as "My App" and `alice/dark` as "Dark".

#![allow(dead_code)]

use std::sync::Arc;

use tnode_catalog::{CatalogEntity, CatalogVersion, EntityCatalog, PresentableInfo, StaticCatalog};
use tnode_core::{compile, DependencyTreeNode, Directive, EntityRef, EntityType, NodeId, UserId};
use tnode_engine::{EngineConfig, TestRuleEngine};
use tnode_store::{MemorySnapshotStore, SnapshotStore};

pub const NODE: NodeId = NodeId(1);
pub const USER: UserId = UserId(7);

pub fn resource(id: &str, name: &str, resource_type: &str, versions: &[&str]) -> CatalogEntity {
    CatalogEntity {
        id: id.into(),
        name: name.into(),
        entity_type: EntityType::Resource,
        resource_type: resource_type.into(),
        file_sha1: String::new(),
        versions: versions
            .iter()
            .map(|v| CatalogVersion {
                version: v.to_string(),
                version_id: format!("{id}@{v}"),
                file_sha1: format!("sha-{id}-{v}"),
            })
            .collect(),
    }
}

pub fn node(id: &str, name: &str) -> DependencyTreeNode {
    DependencyTreeNode::leaf(id, name, EntityType::Resource).with_version("1.0.0")
}

pub fn app_tree() -> Vec<DependencyTreeNode> {
    vec![node("app", "alice/app")
        .with_resource_type("widget")
        .with_dependencies(vec![
            node("lib-a", "alice/lib-a").with_dependencies(vec![node("lib-c", "alice/lib-c")]),
            node("lib-b", "alice/lib-b"),
        ])]
}

pub fn catalog() -> StaticCatalog {
    let catalog = StaticCatalog::new();
    catalog.insert_entity(resource("app", "alice/app", "widget", &["1.0.0"]));
    for lib in ["a", "b", "c"] {
        catalog.insert_entity(resource(&format!("lib-{lib}"), &format!("alice/lib-{lib}"), "library", &["1.0.0"]));
    }
    catalog.insert_entity(resource("lib-d", "alice/lib-d", "library", &["1.0.0", "2.0.0"]));
    catalog.insert_entity(resource("dark", "alice/dark", "theme", &["1.0.0"]));
    catalog.insert_tree("app", "1.0.0", app_tree());

    catalog.insert_presentable(
        NODE,
        PresentableInfo {
            presentable_id: "p-app".into(),
            presentable_name: "My App".into(),
            resource_id: "app".into(),
            resource_name: "alice/app".into(),
            resource_type: "widget".into(),
            version: "1.0.0".into(),
            tags: vec!["featured".into()],
            is_online: true,
        },
    );
    catalog.insert_presentable(
        NODE,
        PresentableInfo {
            presentable_id: "p-dark".into(),
            presentable_name: "Dark".into(),
            resource_id: "dark".into(),
            resource_name: "alice/dark".into(),
            resource_type: "theme".into(),
            version: "1.0.0".into(),
            tags: Vec::new(),
            is_online: false,
        },
    );
    catalog
}

pub fn res(name: &str) -> EntityRef {
    EntityRef::resource(name)
}

pub fn compiled(records: Vec<Directive>) -> Vec<Directive> {
    compile(records).unwrap()
}

pub struct Harness {
    pub catalog: Arc<StaticCatalog>,
    pub store: Arc<MemorySnapshotStore>,
    pub engine: TestRuleEngine,
}

pub fn harness() -> Harness {
    let catalog = Arc::new(catalog());
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = engine_with(catalog.clone(), store.clone());
    Harness { catalog, store, engine }
}

pub fn engine_with(catalog: Arc<dyn EntityCatalog>, store: Arc<dyn SnapshotStore>) -> TestRuleEngine {
    TestRuleEngine::new(catalog, store, EngineConfig::default())
}

/// Strip flatten-assigned node ids so trees compare by content.
pub fn without_nids(mut nodes: Vec<DependencyTreeNode>) -> Vec<DependencyTreeNode> {
    for node in &mut nodes {
        node.nid = None;
        node.dependencies = without_nids(std::mem::take(&mut node.dependencies));
    }
    nodes
}

pub fn names(nodes: &[DependencyTreeNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}
