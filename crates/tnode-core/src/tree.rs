//! # Dependency Trees
//!
//! Nested dependency trees come from the catalog and are rewritten by
//! replace directives. For storage they are flattened into a pre-order list
//! of [`FlattenedDependencyRecord`]s that carry their depth and a pointer to
//! their parent. Reads rebuild the nested form from that list.
//!
//! Every walk over flattened records is bounded by [`MAX_TREE_DEPTH`]; the
//! flattened form is plain data and may be malformed or cyclic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, VersionRange};
use crate::identity::short_hash;

/// Upper bound on the depth of any tree walk.
pub const MAX_TREE_DEPTH: usize = 100;

/// The entity a substituted node stood in for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacedInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTreeNode {
    /// Path-unique id, present only on trees rebuilt from storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<String>,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub file_sha1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced: Option<ReplacedInfo>,
    #[serde(default)]
    pub dependencies: Vec<DependencyTreeNode>,
}

impl DependencyTreeNode {
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            nid: None,
            id: id.into(),
            name: name.into(),
            entity_type,
            version: String::new(),
            version_id: String::new(),
            resource_type: String::new(),
            file_sha1: String::new(),
            replaced: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyTreeNode>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Same catalog entity: id and type equal.
    pub fn same_entity(&self, other: &DependencyTreeNode) -> bool {
        self.id == other.id && self.entity_type == other.entity_type
    }
}

/// One node of a flattened tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedDependencyRecord {
    #[serde(default)]
    pub nid: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub file_sha1: String,
    /// 1-based depth; roots are at depth 1.
    pub deep: u32,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub parent_version: String,
    #[serde(default)]
    pub parent_nid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced: Option<ReplacedInfo>,
}

/// Pruned tree returned by [`filter_by_dependency`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredDependencyNode {
    pub nid: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub version: String,
    pub dependencies: Vec<FilteredDependencyNode>,
}

/// Keyword search result grouped by entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySearchHit {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub versions: Vec<String>,
}

fn node_nid(parent_nid: &str, index: usize, id: &str) -> String {
    short_hash(&format!("{parent_nid}/{index}/{id}"), 12)
}

/// Flatten a forest into pre-order records.
///
/// Siblings keep their order; every record knows its depth, its parent's id
/// and version, and its parent's `nid`.
pub fn flatten(roots: &[DependencyTreeNode]) -> Vec<FlattenedDependencyRecord> {
    struct Frame<'a> {
        node: &'a DependencyTreeNode,
        index: usize,
        deep: u32,
        parent: Option<(&'a DependencyTreeNode, String)>,
    }

    let mut out = Vec::new();
    let mut stack: Vec<Frame<'_>> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(index, node)| Frame {
            node,
            index,
            deep: 1,
            parent: None,
        })
        .collect();

    while let Some(frame) = stack.pop() {
        let (parent_id, parent_version, parent_nid) = match &frame.parent {
            Some((p, nid)) => (p.id.clone(), p.version.clone(), nid.clone()),
            None => (String::new(), String::new(), String::new()),
        };
        let nid = node_nid(&parent_nid, frame.index, &frame.node.id);
        let node = frame.node;

        for (index, child) in node.dependencies.iter().enumerate().rev() {
            stack.push(Frame {
                node: child,
                index,
                deep: frame.deep + 1,
                parent: Some((node, nid.clone())),
            });
        }

        out.push(FlattenedDependencyRecord {
            nid,
            id: node.id.clone(),
            name: node.name.clone(),
            entity_type: node.entity_type,
            version: node.version.clone(),
            version_id: node.version_id.clone(),
            resource_type: node.resource_type.clone(),
            file_sha1: node.file_sha1.clone(),
            deep: frame.deep,
            parent_id,
            parent_version,
            parent_nid,
            replaced: node.replaced.clone(),
        });
    }

    out
}

/// Parent-to-children index over a flattened list.
///
/// Records carrying nids are linked by `parent_nid` only. Records from
/// before nids existed are linked by parent id, version and depth.
struct ChildIndex<'a> {
    records: &'a [FlattenedDependencyRecord],
    linked_by_nid: bool,
    by_parent_nid: HashMap<&'a str, Vec<usize>>,
    by_parent: HashMap<(&'a str, &'a str, u32), Vec<usize>>,
}

impl<'a> ChildIndex<'a> {
    fn new(records: &'a [FlattenedDependencyRecord]) -> Self {
        let linked_by_nid = records.iter().any(|r| !r.nid.is_empty());
        let mut by_parent_nid: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_parent: HashMap<(&str, &str, u32), Vec<usize>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            if r.deep <= 1 {
                continue;
            }
            if linked_by_nid {
                if !r.parent_nid.is_empty() {
                    by_parent_nid.entry(r.parent_nid.as_str()).or_default().push(i);
                }
            } else {
                by_parent
                    .entry((r.parent_id.as_str(), r.parent_version.as_str(), r.deep))
                    .or_default()
                    .push(i);
            }
        }
        Self {
            records,
            linked_by_nid,
            by_parent_nid,
            by_parent,
        }
    }

    fn children(&self, parent: &'a FlattenedDependencyRecord) -> &[usize] {
        let children = if self.linked_by_nid {
            if parent.nid.is_empty() {
                None
            } else {
                self.by_parent_nid.get(parent.nid.as_str())
            }
        } else {
            self.by_parent
                .get(&(parent.id.as_str(), parent.version.as_str(), parent.deep + 1))
        };
        children.map(Vec::as_slice).unwrap_or(&[])
    }

    fn start(&self, nid: Option<&str>) -> Option<usize> {
        match nid {
            Some(nid) => self.records.iter().position(|r| r.nid == nid),
            None => self.records.iter().position(|r| r.deep == 1),
        }
    }
}

/// Walk state shared by rebuild and filter. Each record is emitted at most
/// once, so malformed input (shared nids, parent cycles) stays bounded by
/// the number of records.
struct Walk<'i, 'a> {
    index: &'i ChildIndex<'a>,
    emitted: Vec<bool>,
}

impl<'i, 'a> Walk<'i, 'a> {
    fn new(index: &'i ChildIndex<'a>) -> Self {
        Self {
            index,
            emitted: vec![false; index.records.len()],
        }
    }

    /// Marks `i` emitted; `false` when it already was.
    fn claim(&mut self, i: usize) -> bool {
        !std::mem::replace(&mut self.emitted[i], true)
    }

    fn record(&self, i: usize) -> &'a FlattenedDependencyRecord {
        let records: &'a [FlattenedDependencyRecord] = self.index.records;
        &records[i]
    }

    fn children(&self, i: usize) -> &'i [usize] {
        let index: &'i ChildIndex<'a> = self.index;
        index.children(self.record(i))
    }
}

fn to_tree_node(record: &FlattenedDependencyRecord) -> DependencyTreeNode {
    DependencyTreeNode {
        nid: (!record.nid.is_empty()).then(|| record.nid.clone()),
        id: record.id.clone(),
        name: record.name.clone(),
        entity_type: record.entity_type,
        version: record.version.clone(),
        version_id: record.version_id.clone(),
        resource_type: record.resource_type.clone(),
        file_sha1: record.file_sha1.clone(),
        replaced: record.replaced.clone(),
        dependencies: Vec::new(),
    }
}

/// Rebuild a nested tree from flattened records.
///
/// Starts at the record with `nid`, or at the first root when `nid` is
/// `None`. Returns at most `max_deep` levels (capped at [`MAX_TREE_DEPTH`]);
/// the first level is the start node itself when `include_root` is set and
/// its children otherwise. Unknown `nid` yields an empty forest.
pub fn rebuild(
    records: &[FlattenedDependencyRecord],
    nid: Option<&str>,
    max_deep: usize,
    include_root: bool,
) -> Vec<DependencyTreeNode> {
    let index = ChildIndex::new(records);
    let Some(start) = index.start(nid) else {
        return Vec::new();
    };
    let max_deep = max_deep.min(MAX_TREE_DEPTH);
    let mut walk = Walk::new(&index);
    let level: Vec<usize> = if include_root {
        vec![start]
    } else {
        walk.claim(start);
        walk.children(start).to_vec()
    };
    build_level(&mut walk, &level, 1, max_deep)
}

fn build_level(
    walk: &mut Walk<'_, '_>,
    level: &[usize],
    deep: usize,
    max_deep: usize,
) -> Vec<DependencyTreeNode> {
    if deep > max_deep {
        return Vec::new();
    }
    let mut nodes = Vec::with_capacity(level.len());
    for &i in level {
        if !walk.claim(i) {
            continue;
        }
        let mut node = to_tree_node(walk.record(i));
        let children = walk.children(i);
        node.dependencies = build_level(walk, children, deep + 1, max_deep);
        nodes.push(node);
    }
    nodes
}

/// Prune a flattened tree down to the paths leading to a dependency.
///
/// A node is kept when it is the target (same id and type, and for
/// resources a version inside `range`) or when any descendant is kept.
pub fn filter_by_dependency(
    records: &[FlattenedDependencyRecord],
    entity_id: &str,
    entity_type: EntityType,
    range: Option<&VersionRange>,
) -> Vec<FilteredDependencyNode> {
    let index = ChildIndex::new(records);
    let is_target = |r: &FlattenedDependencyRecord| {
        r.id == entity_id
            && r.entity_type == entity_type
            && (!entity_type.is_versioned() || range.map_or(true, |range| range.matches(&r.version)))
    };
    let roots: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.deep == 1)
        .map(|(i, _)| i)
        .collect();
    filter_level(&mut Walk::new(&index), &roots, 1, &is_target)
}

fn filter_level(
    walk: &mut Walk<'_, '_>,
    level: &[usize],
    deep: usize,
    is_target: &dyn Fn(&FlattenedDependencyRecord) -> bool,
) -> Vec<FilteredDependencyNode> {
    if deep > MAX_TREE_DEPTH {
        return Vec::new();
    }
    let mut nodes = Vec::new();
    for &i in level {
        if !walk.claim(i) {
            continue;
        }
        let children = walk.children(i);
        let dependencies = filter_level(walk, children, deep + 1, is_target);
        let record = walk.record(i);
        if dependencies.is_empty() && !is_target(record) {
            continue;
        }
        nodes.push(FilteredDependencyNode {
            nid: record.nid.clone(),
            id: record.id.clone(),
            name: record.name.clone(),
            entity_type: record.entity_type,
            version: record.version.clone(),
            dependencies,
        });
    }
    nodes
}

/// Whether any record is `entity_id`, optionally inside `range`.
pub fn contains_dependency(
    records: &[FlattenedDependencyRecord],
    entity_id: &str,
    range: Option<&VersionRange>,
) -> bool {
    records.iter().any(|r| {
        r.id == entity_id
            && (!r.entity_type.is_versioned() || range.map_or(true, |range| range.matches(&r.version)))
    })
}

/// Case-insensitive substring search over entity names, grouped by entity id
/// in first-seen order.
pub fn search_by_keyword<'a>(
    records: impl IntoIterator<Item = &'a FlattenedDependencyRecord>,
    keyword: &str,
) -> Vec<DependencySearchHit> {
    let needle = keyword.to_lowercase();
    let mut hits: Vec<DependencySearchHit> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        if !record.name.to_lowercase().contains(&needle) {
            continue;
        }
        let slot = *positions.entry(record.id.clone()).or_insert_with(|| {
            hits.push(DependencySearchHit {
                id: record.id.clone(),
                name: record.name.clone(),
                entity_type: record.entity_type,
                versions: Vec::new(),
            });
            hits.len() - 1
        });
        let versions = &mut hits[slot].versions;
        if !record.version.is_empty() && !versions.contains(&record.version) {
            versions.push(record.version.clone());
        }
    }

    hits
}
