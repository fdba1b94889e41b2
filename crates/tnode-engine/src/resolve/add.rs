//! `add`: bring a catalog entity onto the node as a test resource.

use tnode_core::{Directive, EfficientKind, EntityRef, TestRuleMatchInfo, WorkingEntityRecord};

use super::{replace, tags, ResolveContext};

pub(super) async fn apply(
    ctx: &mut ResolveContext<'_>,
    directive: &Directive,
    name: &str,
    candidate: &EntityRef,
    info: &mut TestRuleMatchInfo,
) {
    let resolved = match ctx.catalog.resolve(candidate).await {
        Ok(resolved) => resolved,
        Err(e) => {
            info.fail(e);
            return;
        }
    };
    let tree = match ctx.catalog.tree(&resolved).await {
        Ok(tree) => tree,
        Err(e) => {
            info.fail(e);
            return;
        }
    };

    let mut key = ctx
        .working_set
        .insert(WorkingEntityRecord::new(ctx.node_id, name, tree));
    info.count(EfficientKind::Add, 1);

    if !directive.replaces.is_empty() {
        let (count, rekeyed) = replace::replace_in_record(ctx, &key, directive, info).await;
        info.count(EfficientKind::Replace, count);
        key = rekeyed;
    }

    let Some(record) = ctx.working_set.get_mut(&key) else {
        return;
    };
    tags::apply(record, directive, info);
    record.touch(directive);
    info.entity_dependency_tree = Some(record.dependency_tree.clone());
}
