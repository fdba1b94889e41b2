//! # tnode-core — Test Node Rule Primitives
//!
//! Defines the data model shared by every other `tnode-*` crate: compiled
//! directives, entity references with version ranges, catalog dependency
//! trees, and the records a resolution run persists per node.
//!
//! ## Key Design Principles
//!
//! 1. **Directives are a closed enum.** `DirectiveKind` carries exactly the
//!    fields each operation needs. Adding an operation forces every resolver
//!    to handle it.
//!
//! 2. **Identity is `(name, type)` plus a version range.** `EntityRef`
//!    matching is the single place where range satisfaction is decided.
//!
//! 3. **Trees are walked with bounded depth.** Every walk over flattened
//!    records is capped at [`MAX_TREE_DEPTH`] so malformed or cyclic input
//!    terminates.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tnode-*` crates (this is the leaf of the DAG).
//! - No I/O. Catalog and storage access live in `tnode-catalog` and
//!   `tnode-store`.
//! - No `.unwrap()` outside tests.

pub mod directive;
pub mod entity;
pub mod error;
pub mod identity;
pub mod record;
pub mod tree;

pub use directive::{compile, compile_json, Directive, DirectiveKind, Operation, ReplaceSpec};
pub use entity::{EntityRef, EntityType, VersionRange};
pub use error::{CompilationError, ResolutionError};
pub use identity::{short_hash, test_resource_id, NodeId, UserId};
pub use record::{
    AssociatedPresentable, EfficientInfo, EfficientKind, NodeTestRuleSnapshot, OnlineInfo,
    RuleRef, RuleSnapshotStatus, TagsInfo, TestResourceRecord, TestResourceTreeRecord,
    TestRuleMatchInfo, WorkingEntityRecord, DEFAULT_SOURCE,
};
pub use tree::{
    DependencySearchHit, DependencyTreeNode, FilteredDependencyNode, FlattenedDependencyRecord,
    ReplacedInfo, MAX_TREE_DEPTH,
};
