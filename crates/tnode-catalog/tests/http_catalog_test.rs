//! Contract tests for HttpCatalog against a wiremock catalog.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET | `/v2/resources/{nameOrId}` | `lookup_resource_*`, `resolve_*` |
//! | GET | `/v2/storages/objects/{nameOrId}` | `lookup_object_*` |
//! | GET | `/v2/resources/{id}/dependencyTree` | `fetch_tree_*` |
//! | GET | `/v2/presentables/detail` | `find_presentable_*` |

use std::time::Duration;

use tnode_catalog::{CatalogConfig, CatalogError, EntityCatalog, HttpCatalog, Resolution, RetryPolicy};
use tnode_core::{EntityType, NodeId, VersionRange};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(mock_server: &MockServer) -> HttpCatalog {
    let config = CatalogConfig::local(&mock_server.uri())
        .unwrap()
        .with_token("test-token");
    HttpCatalog::new(config).unwrap()
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "ret": 0,
        "errcode": 0,
        "msg": "success",
        "data": data
    }))
}

fn novel_body() -> serde_json::Value {
    serde_json::json!({
        "resourceId": "r1",
        "resourceName": "alice/novel",
        "resourceType": "novel",
        "resourceVersions": [
            {"version": "1.0.0", "versionId": "v1", "fileSha1": "s1"},
            {"version": "1.2.0", "versionId": "v2", "fileSha1": "s2"},
            {"version": "2.0.0", "versionId": "v3", "fileSha1": "s3"}
        ]
    })
}

// ── GET /v2/resources/{nameOrId} ─────────────────────────────────────

#[tokio::test]
async fn lookup_resource_encodes_name_and_sends_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/alice%2Fnovel"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ok(novel_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let entity = client
        .lookup_entity("alice/novel", EntityType::Resource)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.id, "r1");
    assert_eq!(entity.versions.len(), 3);
}

#[tokio::test]
async fn resolve_selects_highest_version_in_range() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/r1"))
        .respond_with(ok(novel_body()))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let range = VersionRange::parse("^1").unwrap();
    match client
        .resolve_entity("r1", EntityType::Resource, Some(&range))
        .await
        .unwrap()
    {
        Resolution::Resolved(r) => {
            assert_eq!(r.version, "1.2.0");
            assert_eq!(r.version_id, "v2");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn lookup_resource_null_data_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/r404"))
        .respond_with(ok(serde_json::Value::Null))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(
        client
            .resolve_entity("r404", EntityType::Resource, None)
            .await
            .unwrap(),
        Resolution::NotFound
    );
}

#[tokio::test]
async fn lookup_resource_http_404_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(client
        .lookup_entity("gone", EntityType::Resource)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn lookup_resource_server_error_is_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/r1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    match client.lookup_entity("r1", EntityType::Resource).await {
        Err(CatalogError::Api { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn lookup_resource_retries_an_overloaded_catalog() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/r1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/resources/r1"))
        .respond_with(ok(novel_body()))
        .mount(&mock_server)
        .await;

    let config = CatalogConfig::local(&mock_server.uri()).unwrap().with_retry(RetryPolicy {
        max_retries: 1,
        base_delay: Duration::ZERO,
    });
    let client = HttpCatalog::new(config).unwrap();
    let entity = client
        .lookup_entity("r1", EntityType::Resource)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.name, "alice/novel");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn lookup_resource_envelope_error_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ret": 0, "errcode": 30, "msg": "auth failed", "data": null
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    match client.lookup_entity("r1", EntityType::Resource).await {
        Err(CatalogError::Rejected { errcode, msg, .. }) => {
            assert_eq!(errcode, 30);
            assert_eq!(msg, "auth failed");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

// ── GET /v2/storages/objects/{nameOrId} ──────────────────────────────

#[tokio::test]
async fn lookup_object_maps_sha1() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/storages/objects/cover.png"))
        .respond_with(ok(serde_json::json!({
            "objectId": "o1",
            "objectName": "cover.png",
            "resourceType": "image",
            "sha1": "abc"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let entity = client
        .lookup_entity("cover.png", EntityType::Object)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entity.entity_type, EntityType::Object);
    assert_eq!(entity.file_sha1, "abc");
}

// ── GET /v2/resources/{id}/dependencyTree ────────────────────────────

#[tokio::test]
async fn fetch_tree_passes_version_and_parses_nodes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/resources/r1/dependencyTree"))
        .and(query_param("version", "1.2.0"))
        .respond_with(ok(serde_json::json!([{
            "id": "r1",
            "name": "alice/novel",
            "type": "resource",
            "version": "1.2.0",
            "versionId": "v2",
            "resourceType": "novel",
            "fileSha1": "s2",
            "dependencies": [
                {"id": "o1", "name": "cover.png", "type": "object", "dependencies": []}
            ]
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let tree = client
        .fetch_dependency_tree("r1", EntityType::Resource, Some("1.2.0"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].dependencies[0].entity_type, EntityType::Object);
}

// ── GET /v2/presentables/detail ──────────────────────────────────────

#[tokio::test]
async fn find_presentable_maps_online_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/presentables/detail"))
        .and(query_param("nodeId", "42"))
        .and(query_param("presentableName", "My Novel"))
        .respond_with(ok(serde_json::json!({
            "presentableId": "p1",
            "presentableName": "My Novel",
            "resourceInfo": {"resourceId": "r1", "resourceName": "alice/novel", "resourceType": "novel"},
            "version": "1.0.0",
            "tags": ["fiction"],
            "onlineStatus": 1
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let presentable = client
        .find_presentable(NodeId(42), "My Novel")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(presentable.resource_id, "r1");
    assert!(presentable.is_online);
    assert_eq!(presentable.tags, ["fiction"]);
}
