//! # Resolution Records
//!
//! The in-memory working record a run builds per test resource, the
//! per-directive outcome ([`TestRuleMatchInfo`]), and the three record
//! shapes persisted per node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directive::{Directive, Operation};
use crate::entity::EntityType;
use crate::error::ResolutionError;
use crate::identity::{test_resource_id, NodeId, UserId};
use crate::tree::{flatten, DependencyTreeNode, FlattenedDependencyRecord};

/// Provenance value for fields no directive has written.
pub const DEFAULT_SOURCE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsInfo {
    pub tags: Vec<String>,
    pub source: String,
}

impl Default for TagsInfo {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineInfo {
    pub is_online: bool,
    pub source: String,
}

impl Default for OnlineInfo {
    fn default() -> Self {
        Self {
            is_online: false,
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

/// A directive that touched a test resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: String,
    pub operation: Operation,
}

/// The published presentable a test resource was seeded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedPresentable {
    pub presentable_id: String,
    pub presentable_name: String,
    pub tags: Vec<String>,
    pub is_online: bool,
}

/// A test resource as it is being built during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingEntityRecord {
    pub test_resource_id: String,
    pub test_resource_name: String,
    pub entity_id: String,
    pub entity_name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub version: String,
    pub resource_type: String,
    pub dependency_tree: Vec<DependencyTreeNode>,
    pub tags_info: TagsInfo,
    pub online_info: OnlineInfo,
    pub rules: Vec<RuleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_presentable: Option<AssociatedPresentable>,
}

impl WorkingEntityRecord {
    /// A fresh record whose identity is the root of `dependency_tree`.
    pub fn new(
        node_id: NodeId,
        test_resource_name: impl Into<String>,
        dependency_tree: Vec<DependencyTreeNode>,
    ) -> Self {
        let test_resource_name = test_resource_name.into();
        let mut record = Self {
            test_resource_id: test_resource_id(node_id, &test_resource_name),
            test_resource_name,
            entity_id: String::new(),
            entity_name: String::new(),
            entity_type: EntityType::Resource,
            version: String::new(),
            resource_type: String::new(),
            dependency_tree,
            tags_info: TagsInfo::default(),
            online_info: OnlineInfo::default(),
            rules: Vec::new(),
            associated_presentable: None,
        };
        record.sync_identity_with_root();
        record
    }

    /// Copy entity identity from the tree root. Returns `true` when the
    /// identity changed.
    pub fn sync_identity_with_root(&mut self) -> bool {
        let Some(root) = self.dependency_tree.first() else {
            return false;
        };
        let changed = root.id != self.entity_id || root.entity_type != self.entity_type;
        self.entity_id = root.id.clone();
        self.entity_name = root.name.clone();
        self.entity_type = root.entity_type;
        self.version = root.version.clone();
        self.resource_type = root.resource_type.clone();
        changed
    }

    /// Record that `directive` touched this resource. Re-applying the same
    /// directive does not add a second reference.
    pub fn touch(&mut self, directive: &Directive) {
        if !self.rules.iter().any(|r| r.id == directive.id) {
            self.rules.push(RuleRef {
                id: directive.id.clone(),
                operation: directive.operation(),
            });
        }
    }

    /// Split into the persisted test resource record and its flattened tree.
    pub fn into_records(
        self,
        node_id: NodeId,
        user_id: UserId,
    ) -> (TestResourceRecord, TestResourceTreeRecord) {
        let tree = TestResourceTreeRecord {
            test_resource_id: self.test_resource_id.clone(),
            node_id,
            test_resource_name: self.test_resource_name.clone(),
            dependency_tree: flatten(&self.dependency_tree),
        };
        let resource = TestResourceRecord {
            test_resource_id: self.test_resource_id,
            test_resource_name: self.test_resource_name,
            node_id,
            user_id,
            resource_type: self.resource_type.clone(),
            origin_info: OriginInfo {
                id: self.entity_id,
                name: self.entity_name,
                entity_type: self.entity_type,
                version: self.version,
                resource_type: self.resource_type,
            },
            state_info: StateInfo {
                online_status_info: OnlineStatusState {
                    is_online: self.online_info.is_online,
                    rule_id: rule_id_of(&self.online_info.source),
                },
                tags_info: TagsState {
                    tags: self.tags_info.tags,
                    rule_id: rule_id_of(&self.tags_info.source),
                },
            },
            rules: self.rules,
            associated_presentable_id: self.associated_presentable.map(|p| p.presentable_id),
        };
        (resource, tree)
    }
}

fn rule_id_of(source: &str) -> String {
    if source == DEFAULT_SOURCE {
        String::new()
    } else {
        source.to_string()
    }
}

/// Kind of effect a directive produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EfficientKind {
    Add,
    Alter,
    Replace,
    SetTags,
    SetOnlineStatus,
    ActivateTheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfficientInfo {
    #[serde(rename = "type")]
    pub kind: EfficientKind,
    pub count: u32,
}

/// Outcome of applying one directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRuleMatchInfo {
    pub id: String,
    pub is_valid: bool,
    pub match_errors: Vec<String>,
    pub rule_info: Directive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentable_info: Option<AssociatedPresentable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_dependency_tree: Option<Vec<DependencyTreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_status: Option<OnlineInfo>,
    pub efficient_infos: Vec<EfficientInfo>,
}

impl TestRuleMatchInfo {
    pub fn new(directive: &Directive) -> Self {
        Self {
            id: directive.id.clone(),
            is_valid: true,
            match_errors: Vec::new(),
            rule_info: directive.clone(),
            presentable_info: None,
            entity_dependency_tree: None,
            tags: None,
            online_status: None,
            efficient_infos: Vec::new(),
        }
    }

    /// Mark the directive invalid and keep the error message.
    pub fn fail(&mut self, error: ResolutionError) {
        self.is_valid = false;
        self.match_errors.push(error.to_string());
    }

    /// Add `count` effects of `kind`. Zero counts are recorded too so the
    /// outcome shows which effects were attempted.
    pub fn count(&mut self, kind: EfficientKind, count: u32) {
        match self.efficient_infos.iter_mut().find(|e| e.kind == kind) {
            Some(info) => info.count += count,
            None => self.efficient_infos.push(EfficientInfo { kind, count }),
        }
    }

    pub fn efficient_count(&self, kind: EfficientKind) -> u32 {
        self.efficient_infos
            .iter()
            .find(|e| e.kind == kind)
            .map_or(0, |e| e.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSnapshotStatus {
    /// Every directive applied.
    Completed,
    /// At least one directive is invalid.
    CompletedWithErrors,
}

/// The rule record persisted per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTestRuleSnapshot {
    pub node_id: NodeId,
    pub user_id: UserId,
    pub rule_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<String>,
    pub test_rules: Vec<TestRuleMatchInfo>,
    pub status: RuleSnapshotStatus,
    pub matched_at: DateTime<Utc>,
}

impl NodeTestRuleSnapshot {
    /// The directive list this snapshot was produced from.
    pub fn directives(&self) -> Vec<Directive> {
        self.test_rules.iter().map(|r| r.rule_info.clone()).collect()
    }

    pub fn invalid_rules(&self) -> impl Iterator<Item = &TestRuleMatchInfo> {
        self.test_rules.iter().filter(|r| !r.is_valid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub version: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatusState {
    pub is_online: bool,
    /// Id of the directive that set the status; empty for the default.
    pub rule_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsState {
    pub tags: Vec<String>,
    pub rule_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInfo {
    pub online_status_info: OnlineStatusState,
    pub tags_info: TagsState,
}

/// A persisted test resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResourceRecord {
    pub test_resource_id: String,
    pub test_resource_name: String,
    pub node_id: NodeId,
    pub user_id: UserId,
    pub resource_type: String,
    pub origin_info: OriginInfo,
    pub state_info: StateInfo,
    pub rules: Vec<RuleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_presentable_id: Option<String>,
}

/// The flattened dependency tree of a persisted test resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResourceTreeRecord {
    pub test_resource_id: String,
    pub node_id: NodeId,
    pub test_resource_name: String,
    pub dependency_tree: Vec<FlattenedDependencyRecord>,
}
