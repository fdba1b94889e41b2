//! Tag and online-status writes.

use tnode_core::{
    Directive, EfficientKind, OnlineInfo, Operation, TagsInfo, TestRuleMatchInfo, WorkingEntityRecord,
};

/// Write the directive's tags and online flag onto `record`.
///
/// - `tags: Some` replaces the tags.
/// - `tags: None` on an add or alter of a presentable-backed resource
///   re-applies the presentable's tags.
/// - `online: Some` sets the status; `None` leaves it.
///
/// Every write records the directive id as its source.
pub(super) fn apply(record: &mut WorkingEntityRecord, directive: &Directive, info: &mut TestRuleMatchInfo) {
    let inherits = matches!(directive.operation(), Operation::Add | Operation::Alter);

    let tags = match (&directive.tags, &record.associated_presentable) {
        (Some(tags), _) => Some(tags.clone()),
        (None, Some(presentable)) if inherits => Some(presentable.tags.clone()),
        _ => None,
    };
    if let Some(tags) = tags {
        record.tags_info = TagsInfo {
            tags,
            source: directive.id.clone(),
        };
        info.count(EfficientKind::SetTags, 1);
    }

    if let Some(is_online) = directive.online {
        record.online_info = OnlineInfo {
            is_online,
            source: directive.id.clone(),
        };
        info.count(EfficientKind::SetOnlineStatus, 1);
    }

    info.tags = Some(record.tags_info.clone());
    info.online_status = Some(record.online_info.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnode_core::{
        AssociatedPresentable, DependencyTreeNode, EntityRef, EntityType, NodeId, DEFAULT_SOURCE,
    };

    fn record() -> WorkingEntityRecord {
        WorkingEntityRecord::new(
            NodeId(1),
            "novel",
            vec![DependencyTreeNode::leaf("r1", "alice/novel", EntityType::Resource)],
        )
    }

    fn compiled(mut directive: Directive) -> Directive {
        directive.id = "d1".into();
        directive
    }

    #[test]
    fn explicit_tags_replace_and_record_source() {
        let mut r = record();
        let d = compiled(Directive::add("novel", EntityRef::resource("alice/novel")).with_tags(vec!["x".into()]));
        let mut info = TestRuleMatchInfo::new(&d);
        apply(&mut r, &d, &mut info);
        assert_eq!(r.tags_info.tags, ["x"]);
        assert_eq!(r.tags_info.source, "d1");
        assert_eq!(r.online_info.source, DEFAULT_SOURCE);
        assert_eq!(info.efficient_count(EfficientKind::SetTags), 1);
    }

    #[test]
    fn empty_tags_clear() {
        let mut r = record();
        r.tags_info.tags = vec!["old".into()];
        let d = compiled(Directive::retag("novel", vec![]));
        let mut info = TestRuleMatchInfo::new(&d);
        apply(&mut r, &d, &mut info);
        assert!(r.tags_info.tags.is_empty());
        assert_eq!(r.tags_info.source, "d1");
    }

    #[test]
    fn absent_tags_leave_plain_resources_alone() {
        let mut r = record();
        let d = compiled(Directive::add("novel", EntityRef::resource("alice/novel")));
        let mut info = TestRuleMatchInfo::new(&d);
        apply(&mut r, &d, &mut info);
        assert_eq!(r.tags_info.source, DEFAULT_SOURCE);
        assert_eq!(info.efficient_count(EfficientKind::SetTags), 0);
    }

    #[test]
    fn absent_tags_inherit_presentable_tags_on_alter() {
        let mut r = record();
        r.associated_presentable = Some(AssociatedPresentable {
            presentable_id: "p1".into(),
            presentable_name: "Novel".into(),
            tags: vec!["published".into()],
            is_online: true,
        });
        let d = compiled(Directive::alter("Novel"));
        let mut info = TestRuleMatchInfo::new(&d);
        apply(&mut r, &d, &mut info);
        assert_eq!(r.tags_info.tags, ["published"]);
        assert_eq!(r.tags_info.source, "d1");
    }

    #[test]
    fn online_flag_is_written_with_source() {
        let mut r = record();
        let d = compiled(Directive::restatus("novel", true));
        let mut info = TestRuleMatchInfo::new(&d);
        apply(&mut r, &d, &mut info);
        assert!(r.online_info.is_online);
        assert_eq!(r.online_info.source, "d1");
        assert_eq!(r.tags_info.source, DEFAULT_SOURCE);
        assert_eq!(info.online_status.as_ref().map(|o| o.is_online), Some(true));
    }
}
