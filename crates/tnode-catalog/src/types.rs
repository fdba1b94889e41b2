//! Catalog entity types and version selection.

use semver::Version;
use serde::{Deserialize, Serialize};
use tnode_core::{AssociatedPresentable, DependencyTreeNode, EntityType, VersionRange};

/// One published version of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVersion {
    pub version: String,
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub file_sha1: String,
}

/// A catalog entity with every version it has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub resource_type: String,
    /// Content hash for objects; resources carry it per version.
    #[serde(default)]
    pub file_sha1: String,
    #[serde(default)]
    pub versions: Vec<CatalogVersion>,
}

/// An entity pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub resource_type: String,
    /// Empty for objects.
    pub version: String,
    pub version_id: String,
    pub file_sha1: String,
}

impl ResolvedEntity {
    /// The entity as a tree node without dependencies.
    pub fn to_tree_node(&self) -> DependencyTreeNode {
        DependencyTreeNode {
            nid: None,
            id: self.id.clone(),
            name: self.name.clone(),
            entity_type: self.entity_type,
            version: self.version.clone(),
            version_id: self.version_id.clone(),
            resource_type: self.resource_type.clone(),
            file_sha1: self.file_sha1.clone(),
            replaced: None,
            dependencies: Vec::new(),
        }
    }
}

/// Outcome of resolving a reference against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedEntity),
    NotFound,
    /// The entity exists but no version satisfies the range.
    VersionUnsatisfied { available: Vec<String> },
}

impl CatalogEntity {
    /// Pick the version `range` resolves to: the highest satisfying one.
    pub fn select(&self, range: Option<&VersionRange>) -> Resolution {
        if !self.entity_type.is_versioned() {
            return Resolution::Resolved(ResolvedEntity {
                id: self.id.clone(),
                name: self.name.clone(),
                entity_type: self.entity_type,
                resource_type: self.resource_type.clone(),
                version: String::new(),
                version_id: String::new(),
                file_sha1: self.file_sha1.clone(),
            });
        }

        let any = VersionRange::any();
        let range = range.unwrap_or(&any);
        let best = self
            .versions
            .iter()
            .filter(|v| range.matches(&v.version))
            .max_by(|a, b| parse_version(&a.version).cmp(&parse_version(&b.version)));

        match best {
            Some(v) => Resolution::Resolved(ResolvedEntity {
                id: self.id.clone(),
                name: self.name.clone(),
                entity_type: self.entity_type,
                resource_type: self.resource_type.clone(),
                version: v.version.clone(),
                version_id: v.version_id.clone(),
                file_sha1: v.file_sha1.clone(),
            }),
            None => Resolution::VersionUnsatisfied {
                available: self.versions.iter().map(|v| v.version.clone()).collect(),
            },
        }
    }
}

fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim().trim_start_matches('v')).ok()
}

/// A presentable published on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentableInfo {
    pub presentable_id: String,
    pub presentable_name: String,
    pub resource_id: String,
    pub resource_name: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_online: bool,
}

impl PresentableInfo {
    pub fn association(&self) -> AssociatedPresentable {
        AssociatedPresentable {
            presentable_id: self.presentable_id.clone(),
            presentable_name: self.presentable_name.clone(),
            tags: self.tags.clone(),
            is_online: self.is_online,
        }
    }
}
