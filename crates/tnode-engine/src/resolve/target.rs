//! Locating the test resource a directive acts on.

use tnode_core::{
    EntityRef, OnlineInfo, ResolutionError, TagsInfo, TestRuleMatchInfo, VersionRange, WorkingEntityRecord,
    DEFAULT_SOURCE,
};

use super::ResolveContext;

/// Working-set key of the test resource called `name`.
///
/// When no working record has that name, the node's presentable of that
/// name is seeded into the working set: its resource tree, with the
/// presentable's tags and online status as defaults.
pub(super) async fn resolve_target(
    ctx: &mut ResolveContext<'_>,
    name: &str,
    info: &mut TestRuleMatchInfo,
) -> Result<String, ResolutionError> {
    if let Some(key) = ctx.working_set.find_key(name) {
        if let Some(p) = ctx.working_set.get(&key).and_then(|r| r.associated_presentable.clone()) {
            info.presentable_info = Some(p);
        }
        return Ok(key);
    }

    let Some(presentable) = ctx.catalog.presentable(name).await? else {
        return Err(ResolutionError::TargetNotFound {
            name: name.to_string(),
        });
    };

    let mut resource = EntityRef::resource(presentable.resource_id.clone());
    if !presentable.version.is_empty() {
        let exact = VersionRange::parse(&format!("={}", presentable.version)).map_err(|e| {
            ResolutionError::CatalogUnavailable {
                name: presentable.resource_name.clone(),
                reason: format!("presentable version '{}' is not semver: {e}", presentable.version),
            }
        })?;
        resource = resource.with_range(exact);
    }
    let resolved = ctx.catalog.resolve(&resource).await?;
    let tree = ctx.catalog.tree(&resolved).await?;

    let mut record = WorkingEntityRecord::new(ctx.node_id, presentable.presentable_name.clone(), tree);
    record.tags_info = TagsInfo {
        tags: presentable.tags.clone(),
        source: DEFAULT_SOURCE.to_string(),
    };
    record.online_info = OnlineInfo {
        is_online: presentable.is_online,
        source: DEFAULT_SOURCE.to_string(),
    };
    let association = presentable.association();
    record.associated_presentable = Some(association.clone());
    info.presentable_info = Some(association);

    tracing::debug!(
        node_id = %ctx.node_id,
        presentable = %presentable.presentable_name,
        "seeded test resource from presentable"
    );
    Ok(ctx.working_set.insert(record))
}
