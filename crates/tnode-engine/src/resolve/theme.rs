//! `activate_theme`: mark a theme test resource as the node's theme.

use tnode_core::{Directive, EfficientKind, ResolutionError, TestRuleMatchInfo};

use super::{target, ResolveContext};

const THEME_RESOURCE_TYPE: &str = "theme";

pub(super) async fn apply(
    ctx: &mut ResolveContext<'_>,
    directive: &Directive,
    theme: &str,
    info: &mut TestRuleMatchInfo,
) {
    let key = match target::resolve_target(ctx, theme, info).await {
        Ok(key) => key,
        Err(e) => {
            info.fail(e);
            return;
        }
    };
    let Some(record) = ctx.working_set.get_mut(&key) else {
        return;
    };

    if record.resource_type != THEME_RESOURCE_TYPE {
        info.fail(ResolutionError::NotATheme {
            name: theme.to_string(),
            resource_type: record.resource_type.clone(),
        });
        return;
    }

    record.touch(directive);
    ctx.theme_id = Some(record.test_resource_id.clone());
    info.count(EfficientKind::ActivateTheme, 1);
}
