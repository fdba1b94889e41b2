//! Directive resolvers.
//!
//! [`apply_directive`] dispatches one compiled directive against the run's
//! working set and returns its outcome. Resolvers never fail the run: every
//! problem is recorded on the directive's [`TestRuleMatchInfo`].

mod add;
mod replace;
mod tags;
mod target;
mod theme;

use tnode_core::{Directive, DirectiveKind, EfficientKind, NodeId, TestRuleMatchInfo};

use crate::cache::RunCatalog;
use crate::config::EngineConfig;
use crate::working_set::WorkingSet;

pub(crate) struct ResolveContext<'a> {
    pub node_id: NodeId,
    pub catalog: &'a RunCatalog<'a>,
    pub config: &'a EngineConfig,
    pub working_set: WorkingSet,
    pub theme_id: Option<String>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(node_id: NodeId, catalog: &'a RunCatalog<'a>, config: &'a EngineConfig) -> Self {
        Self {
            node_id,
            catalog,
            config,
            working_set: WorkingSet::new(node_id),
            theme_id: None,
        }
    }
}

pub(crate) async fn apply_directive(ctx: &mut ResolveContext<'_>, directive: &Directive) -> TestRuleMatchInfo {
    let mut info = TestRuleMatchInfo::new(directive);

    match &directive.kind {
        DirectiveKind::Add { name, candidate } => {
            add::apply(ctx, directive, name, candidate, &mut info).await;
        }
        DirectiveKind::Alter { name } => {
            alter(ctx, directive, name, &mut info).await;
        }
        DirectiveKind::Replace { target } => {
            replace::apply_directive(ctx, directive, target.as_deref(), &mut info).await;
        }
        DirectiveKind::Retag { target } | DirectiveKind::Restatus { target } => {
            restate(ctx, directive, target, &mut info).await;
        }
        DirectiveKind::ActivateTheme { theme } => {
            theme::apply(ctx, directive, theme, &mut info).await;
        }
    }

    if info.is_valid {
        tracing::debug!(
            node_id = %ctx.node_id,
            directive_id = %directive.id,
            operation = %directive.operation(),
            "directive applied"
        );
    } else {
        tracing::warn!(
            node_id = %ctx.node_id,
            directive_id = %directive.id,
            operation = %directive.operation(),
            errors = ?info.match_errors,
            "directive invalid"
        );
    }
    info
}

/// Modify an existing test resource, seeding it from a presentable if needed.
async fn alter(ctx: &mut ResolveContext<'_>, directive: &Directive, name: &str, info: &mut TestRuleMatchInfo) {
    let key = match target::resolve_target(ctx, name, info).await {
        Ok(key) => key,
        Err(e) => {
            info.fail(e);
            return;
        }
    };

    let key = if directive.replaces.is_empty() {
        key
    } else {
        let (count, key) = replace::replace_in_record(ctx, &key, directive, info).await;
        info.count(EfficientKind::Replace, count);
        key
    };

    let Some(record) = ctx.working_set.get_mut(&key) else {
        return;
    };
    tags::apply(record, directive, info);
    record.touch(directive);
    info.count(EfficientKind::Alter, 1);
    info.entity_dependency_tree = Some(record.dependency_tree.clone());
}

/// Apply a retag or restatus to an existing test resource.
async fn restate(ctx: &mut ResolveContext<'_>, directive: &Directive, name: &str, info: &mut TestRuleMatchInfo) {
    let key = match target::resolve_target(ctx, name, info).await {
        Ok(key) => key,
        Err(e) => {
            info.fail(e);
            return;
        }
    };
    let Some(record) = ctx.working_set.get_mut(&key) else {
        return;
    };
    tags::apply(record, directive, info);
    record.touch(directive);
}
