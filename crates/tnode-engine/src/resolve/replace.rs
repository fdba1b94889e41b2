//! # Dependency Replacement
//!
//! Walks a test resource's dependency tree depth-first and substitutes every
//! dependency matched by the directive's replace specs.
//!
//! For each node `N` on the path `ancestors`:
//!
//! 1. Specs are tried in order. A spec applies when its scope matches the
//!    ancestor path and its `replaced` reference matches the current
//!    candidate. The candidate starts as `N` and becomes each applied
//!    spec's replacer, so specs chain: `A→B`, `B→C` turns `A` into `C`.
//! 2. The final replacer's tree is spliced in place of `N` unless that
//!    would duplicate a sibling or create a cycle with the ancestors.
//! 3. A spliced replacement is not walked again. An untouched `N` is
//!    walked into.
//!
//! The substituted root keeps `replaced` pointing at `N`, the first hop of
//! the chain.

use tnode_catalog::ResolvedEntity;
use tnode_core::{
    DependencyTreeNode, Directive, EfficientKind, EntityRef, EntityType, ReplaceSpec, ReplacedInfo,
    ResolutionError, TestRuleMatchInfo,
};

use super::{target, ResolveContext};
use crate::cache::RunCatalog;

/// Identity of a node on the walk's current path.
#[derive(Debug, Clone)]
struct PathEntry {
    id: String,
    name: String,
    entity_type: EntityType,
    version: String,
}

impl PathEntry {
    fn of(node: &DependencyTreeNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            entity_type: node.entity_type,
            version: node.version.clone(),
        }
    }

    fn is(&self, node: &DependencyTreeNode) -> bool {
        self.id == node.id && self.entity_type == node.entity_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpliceViolation {
    Duplicate,
    Cycle,
    TooDeep,
}

/// `replace` directive: one named test resource, or every working one.
pub(super) async fn apply_directive(
    ctx: &mut ResolveContext<'_>,
    directive: &Directive,
    target: Option<&str>,
    info: &mut TestRuleMatchInfo,
) {
    let keys = match target {
        Some(name) => match target::resolve_target(ctx, name, info).await {
            Ok(key) => vec![key],
            Err(e) => {
                info.fail(e);
                return;
            }
        },
        None => ctx.working_set.keys(),
    };

    let mut total = 0;
    for key in keys {
        let (count, _) = replace_in_record(ctx, &key, directive, info).await;
        total += count;
    }
    info.count(EfficientKind::Replace, total);
}

/// Apply `directive.replaces` to the working record at `key`.
///
/// Returns the substitution count and the record's key, which changes when
/// the tree root itself was replaced.
pub(super) async fn replace_in_record(
    ctx: &mut ResolveContext<'_>,
    key: &str,
    directive: &Directive,
    info: &mut TestRuleMatchInfo,
) -> (u32, String) {
    let catalog = ctx.catalog;
    let max_depth = ctx.config.max_tree_depth;
    let Some(record) = ctx.working_set.get_mut(key) else {
        return (0, key.to_string());
    };

    let owner = record.test_resource_name.clone();
    let count = replace_in_tree(
        catalog,
        &directive.replaces,
        &mut record.dependency_tree,
        &owner,
        info,
        max_depth,
    )
    .await;
    if count == 0 {
        return (0, key.to_string());
    }

    record.touch(directive);
    if record.sync_identity_with_root() {
        tracing::debug!(node_id = %ctx.node_id, test_resource = %owner, "test resource root replaced");
        return (count, ctx.working_set.rekey(key));
    }
    (count, key.to_string())
}

struct Frame {
    /// Child indices from the forest down to the sibling list being walked.
    path: Vec<usize>,
    ancestors: Vec<PathEntry>,
    next: usize,
}

fn siblings<'t>(roots: &'t [DependencyTreeNode], path: &[usize]) -> Option<&'t [DependencyTreeNode]> {
    let mut list = roots;
    for &i in path {
        list = &list.get(i)?.dependencies;
    }
    Some(list)
}

fn siblings_mut<'t>(
    roots: &'t mut Vec<DependencyTreeNode>,
    path: &[usize],
) -> Option<&'t mut Vec<DependencyTreeNode>> {
    let mut list = roots;
    for &i in path {
        list = &mut list.get_mut(i)?.dependencies;
    }
    Some(list)
}

/// Walk `roots` and splice replacements. Returns how many nodes were
/// substituted; problems are recorded on `info`.
async fn replace_in_tree(
    catalog: &RunCatalog<'_>,
    specs: &[ReplaceSpec],
    roots: &mut Vec<DependencyTreeNode>,
    owner: &str,
    info: &mut TestRuleMatchInfo,
    max_depth: usize,
) -> u32 {
    if specs.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut stack = vec![Frame {
        path: Vec::new(),
        ancestors: Vec::new(),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let index = frame.next;
        let Some(node) = siblings(roots.as_slice(), &frame.path).and_then(|list| list.get(index)) else {
            stack.pop();
            continue;
        };
        frame.next += 1;
        let entry = PathEntry::of(node);
        let path = frame.path.clone();
        let ancestors = frame.ancestors.clone();

        if ancestors.len() >= max_depth {
            info.fail(ResolutionError::DepthExceeded {
                owner: owner.to_string(),
                max_depth,
            });
            break;
        }

        let replacement = match match_replacer(catalog, specs, &entry, &ancestors).await {
            Ok(Some(replacement)) => replacement,
            Ok(None) => {
                stack.push(descend(path, index, ancestors, entry));
                continue;
            }
            Err(e) => {
                info.fail(e);
                stack.push(descend(path, index, ancestors, entry));
                continue;
            }
        };

        let Some(list) = siblings_mut(roots, &path) else {
            continue;
        };
        match check_splice(list, index, &replacement, &ancestors, max_depth) {
            Ok(()) => {
                tracing::debug!(
                    test_resource = owner,
                    replaced = %entry.name,
                    replacer = %replacement.name,
                    depth = ancestors.len() + 1,
                    "dependency replaced"
                );
                list[index] = replacement;
                count += 1;
            }
            Err(violation) => {
                let (replaced, replacer) = (entry.name, replacement.name);
                let owner = owner.to_string();
                info.fail(match violation {
                    SpliceViolation::Duplicate => ResolutionError::DuplicateDependency {
                        owner,
                        replaced,
                        replacer,
                    },
                    SpliceViolation::Cycle => ResolutionError::CycleDependency {
                        owner,
                        replaced,
                        replacer,
                    },
                    SpliceViolation::TooDeep => ResolutionError::DepthExceeded { owner, max_depth },
                });
            }
        }
    }

    count
}

fn descend(mut path: Vec<usize>, index: usize, mut ancestors: Vec<PathEntry>, entry: PathEntry) -> Frame {
    path.push(index);
    ancestors.push(entry);
    Frame {
        path,
        ancestors,
        next: 0,
    }
}

/// Chain the specs over `node` and fetch the final replacer's tree.
async fn match_replacer(
    catalog: &RunCatalog<'_>,
    specs: &[ReplaceSpec],
    node: &PathEntry,
    ancestors: &[PathEntry],
) -> Result<Option<DependencyTreeNode>, ResolutionError> {
    let mut replacer: Option<ResolvedEntity> = None;
    for spec in specs {
        let applies = {
            let (name, entity_type, version) = match &replacer {
                Some(r) => (r.name.as_str(), r.entity_type, r.version.as_str()),
                None => (node.name.as_str(), node.entity_type, node.version.as_str()),
            };
            spec.replaced.matches(name, entity_type, version) && scope_matches(&spec.scopes, ancestors)
        };
        if applies {
            replacer = Some(catalog.resolve(&spec.replacer).await?);
        }
    }

    let Some(replacer) = replacer else {
        return Ok(None);
    };
    let tree = catalog.tree(&replacer).await?;
    let mut root = tree.into_iter().next().ok_or_else(|| ResolutionError::TreeUnavailable {
        name: replacer.name.clone(),
        entity_type: replacer.entity_type,
    })?;
    root.replaced = Some(ReplacedInfo {
        id: node.id.clone(),
        name: node.name.clone(),
        entity_type: node.entity_type,
    });
    Ok(Some(root))
}

/// Any scope is a prefix of the ancestor path. No scopes match everywhere.
fn scope_matches(scopes: &[Vec<EntityRef>], ancestors: &[PathEntry]) -> bool {
    scopes.is_empty()
        || scopes.iter().any(|scope| {
            scope.len() <= ancestors.len()
                && scope
                    .iter()
                    .zip(ancestors)
                    .all(|(s, a)| s.matches(&a.name, a.entity_type, &a.version))
        })
}

/// Whether `replacement` may take the place of `siblings[index]`.
///
/// Rejected when a sibling already is that entity, or when the replacement
/// or anything below it is one of the ancestors or the replacement itself.
/// The subtree is searched breadth-first up to `max_depth` levels; a deeper
/// subtree is rejected.
fn check_splice(
    siblings: &[DependencyTreeNode],
    index: usize,
    replacement: &DependencyTreeNode,
    ancestors: &[PathEntry],
    max_depth: usize,
) -> Result<(), SpliceViolation> {
    if siblings
        .iter()
        .enumerate()
        .any(|(i, s)| i != index && s.same_entity(replacement))
    {
        return Err(SpliceViolation::Duplicate);
    }

    let on_path = |node: &DependencyTreeNode| ancestors.iter().any(|a| a.is(node));
    if on_path(replacement) {
        return Err(SpliceViolation::Cycle);
    }

    let mut level: Vec<&DependencyTreeNode> = replacement.dependencies.iter().collect();
    let mut depth = 0;
    while !level.is_empty() {
        depth += 1;
        if depth > max_depth {
            return Err(SpliceViolation::TooDeep);
        }
        if level.iter().any(|n| n.same_entity(replacement) || on_path(n)) {
            return Err(SpliceViolation::Cycle);
        }
        level = level.iter().flat_map(|n| n.dependencies.iter()).collect();
    }
    Ok(())
}
