//! Read operations over a stored snapshot.

mod common;

use common::*;
use tnode_core::{test_resource_id, Directive, EntityType, ReplaceSpec, VersionRange};
use tnode_engine::{EngineConfig, TestNodeQueries};
use tnode_store::TestResourceFilter;

async fn stored() -> (Harness, TestNodeQueries) {
    let h = harness();
    h.engine
        .match_and_save(
            NODE,
            USER,
            "",
            vec![
                Directive::add("My App", res("alice/app")).with_tags(vec!["featured".into()]),
                Directive::add("Lib D", res("alice/lib-d")).with_online(true),
            ],
        )
        .await
        .unwrap();
    let queries = TestNodeQueries::new(h.store.clone(), EngineConfig::default());
    (h, queries)
}

#[tokio::test]
async fn dependency_tree_rebuilds_the_stored_tree() {
    let (_h, q) = stored().await;
    let id = test_resource_id(NODE, "My App");

    let tree = q.get_dependency_tree(&id, None, None, true).await.unwrap().unwrap();
    assert_eq!(without_nids(tree), app_tree());

    let children = q.get_dependency_tree(&id, None, Some(1), false).await.unwrap().unwrap();
    assert_eq!(names(&children), ["alice/lib-a", "alice/lib-b"]);
    assert!(children[0].dependencies.is_empty());

    assert!(q.get_dependency_tree("nope", None, None, true).await.unwrap().is_none());
}

#[tokio::test]
async fn dependency_tree_can_start_at_a_nid() {
    let (_h, q) = stored().await;
    let id = test_resource_id(NODE, "My App");
    let full = q.get_dependency_tree(&id, None, None, true).await.unwrap().unwrap();
    let lib_a_nid = full[0].dependencies[0].nid.clone().unwrap();

    let sub = q.get_dependency_tree(&id, Some(&lib_a_nid), None, true).await.unwrap().unwrap();
    assert_eq!(names(&sub), ["alice/lib-a"]);
    assert_eq!(names(&sub[0].dependencies), ["alice/lib-c"]);
}

#[tokio::test]
async fn filter_keeps_only_paths_to_the_dependency() {
    let (_h, q) = stored().await;
    let id = test_resource_id(NODE, "My App");

    let filtered = q
        .filter_dependency_tree(&id, "lib-c", EntityType::Resource, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name, "alice/app");
    assert_eq!(filtered[0].dependencies.len(), 1);
    assert_eq!(filtered[0].dependencies[0].name, "alice/lib-a");
    assert_eq!(filtered[0].dependencies[0].dependencies[0].name, "alice/lib-c");

    let range = VersionRange::parse("^2").unwrap();
    let none = q
        .filter_dependency_tree(&id, "lib-c", EntityType::Resource, Some(&range))
        .await
        .unwrap()
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn search_by_dependency_finds_owning_test_resources() {
    let (_h, q) = stored().await;

    let hits = q.search_by_dependency(NODE, "lib-c", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].test_resource_name, "My App");

    let hits = q.search_by_dependency(NODE, "lib-d", None).await.unwrap();
    assert_eq!(hits[0].test_resource_name, "Lib D");

    let range = VersionRange::parse("^1").unwrap();
    assert!(q.search_by_dependency(NODE, "lib-d", Some(&range)).await.unwrap().is_empty());
}

#[tokio::test]
async fn keyword_search_groups_versions_by_entity() {
    let h = harness();
    h.engine
        .match_and_save(
            NODE,
            USER,
            "",
            vec![
                Directive::add("My App", res("alice/app")),
                Directive::add("Old D", res("alice/lib-d").with_range(VersionRange::parse("^1").unwrap()))
                    .with_replace(ReplaceSpec::new(res("alice/lib-d"), res("alice/lib-c"))),
                Directive::add("New D", res("alice/lib-b"))
                    .with_replace(ReplaceSpec::new(res("alice/lib-b"), res("alice/lib-d"))),
            ],
        )
        .await
        .unwrap();
    let q = TestNodeQueries::new(h.store.clone(), EngineConfig::default());

    let hits = q.search_by_keyword(NODE, "LIB-").await.unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["lib-a", "lib-c", "lib-b", "lib-d"]);
    assert_eq!(hits[3].versions, ["2.0.0"]);
    assert!(q.search_by_keyword(NODE, "zzz").await.unwrap().is_empty());
}

#[tokio::test]
async fn find_test_resources_applies_filters() {
    let (_h, q) = stored().await;

    let filter = TestResourceFilter {
        tags: vec!["featured".into()],
        ..TestResourceFilter::for_node(NODE)
    };
    let found = q.find_test_resources(&filter).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].test_resource_name, "My App");

    let filter = TestResourceFilter {
        is_online: Some(true),
        ..TestResourceFilter::for_node(NODE)
    };
    assert_eq!(q.find_test_resources(&filter).await.unwrap()[0].test_resource_name, "Lib D");

    let filter = TestResourceFilter {
        omit_resource_type: Some("widget".into()),
        ..TestResourceFilter::for_node(NODE)
    };
    assert_eq!(q.find_test_resources(&filter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rule_snapshot_is_readable() {
    let (_h, q) = stored().await;
    let rule = q.rule_snapshot(NODE).await.unwrap().unwrap();
    assert_eq!(rule.test_rules.len(), 2);
    assert!(q.rule_snapshot(tnode_core::NodeId(99)).await.unwrap().is_none());
}
