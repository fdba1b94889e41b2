//! Typed client for the catalog HTTP API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/v2/resources/{nameOrId}` | Resource with versions |
//! | GET | `/v2/resources/{id}/dependencyTree?version=` | Resource dependency tree |
//! | GET | `/v2/storages/objects/{nameOrId}` | Storage object |
//! | GET | `/v2/storages/objects/{id}/dependencyTree` | Object dependency tree |
//! | GET | `/v2/presentables/detail?nodeId=&presentableName=` | Node presentable |

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tnode_core::{DependencyTreeNode, EntityType, NodeId};
use url::Url;

use crate::config::{CatalogConfig, ConfigError};
use crate::error::CatalogError;
use crate::retry::RetryPolicy;
use crate::types::{CatalogEntity, CatalogVersion, PresentableInfo};
use crate::EntityCatalog;

/// Response envelope shared by every catalog endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    ret: i64,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceWire {
    resource_id: String,
    resource_name: String,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    resource_versions: Vec<CatalogVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectWire {
    object_id: String,
    object_name: String,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    sha1: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresentableResourceWire {
    resource_id: String,
    resource_name: String,
    #[serde(default)]
    resource_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresentableWire {
    presentable_id: String,
    presentable_name: String,
    resource_info: PresentableResourceWire,
    #[serde(default)]
    version: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    online_status: i64,
}

impl From<ResourceWire> for CatalogEntity {
    fn from(w: ResourceWire) -> Self {
        Self {
            id: w.resource_id,
            name: w.resource_name,
            entity_type: EntityType::Resource,
            resource_type: w.resource_type,
            file_sha1: String::new(),
            versions: w.resource_versions,
        }
    }
}

impl From<ObjectWire> for CatalogEntity {
    fn from(w: ObjectWire) -> Self {
        Self {
            id: w.object_id,
            name: w.object_name,
            entity_type: EntityType::Object,
            resource_type: w.resource_type,
            file_sha1: w.sha1,
            versions: Vec::new(),
        }
    }
}

impl From<PresentableWire> for PresentableInfo {
    fn from(w: PresentableWire) -> Self {
        Self {
            presentable_id: w.presentable_id,
            presentable_name: w.presentable_name,
            resource_id: w.resource_info.resource_id,
            resource_name: w.resource_info.resource_name,
            resource_type: w.resource_info.resource_type,
            version: w.version,
            tags: w.tags,
            is_online: w.online_status == 1,
        }
    }
}

/// Client for the catalog HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                    .map_err(|_| CatalogError::Config(ConfigError::InvalidToken))?,
            );
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CatalogError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: config.base_url,
            retry: config.retry,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CatalogError::Config(ConfigError::InvalidUrl(
                    self.base_url.to_string(),
                    "URL cannot be a base".into(),
                ))
            })?
            .pop_if_empty()
            .push("v2")
            .extend(segments);
        Ok(url)
    }

    /// GET `url` and unwrap the envelope. 404 and `data: null` are `None`.
    async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: Url,
    ) -> Result<Option<T>, CatalogError> {
        let resp = self
            .retry
            .send(endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|e| CatalogError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        let envelope: Envelope<T> =
            resp.json()
                .await
                .map_err(|e| CatalogError::Deserialization {
                    endpoint: endpoint.to_string(),
                    source: e,
                })?;
        if envelope.ret != 0 || envelope.errcode != 0 {
            return Err(CatalogError::Rejected {
                endpoint: endpoint.to_string(),
                errcode: if envelope.errcode != 0 {
                    envelope.errcode
                } else {
                    envelope.ret
                },
                msg: envelope.msg,
            });
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl EntityCatalog for HttpCatalog {
    async fn lookup_entity(
        &self,
        name_or_id: &str,
        entity_type: EntityType,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        match entity_type {
            EntityType::Resource => {
                let endpoint = format!("GET /resources/{name_or_id}");
                let url = self.url(&["resources", name_or_id])?;
                let data: Option<ResourceWire> = self.get_data(&endpoint, url).await?;
                Ok(data.map(CatalogEntity::from))
            }
            EntityType::Object => {
                let endpoint = format!("GET /storages/objects/{name_or_id}");
                let url = self.url(&["storages", "objects", name_or_id])?;
                let data: Option<ObjectWire> = self.get_data(&endpoint, url).await?;
                Ok(data.map(CatalogEntity::from))
            }
        }
    }

    async fn fetch_dependency_tree(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        version: Option<&str>,
    ) -> Result<Option<Vec<DependencyTreeNode>>, CatalogError> {
        let (endpoint, mut url) = match entity_type {
            EntityType::Resource => (
                format!("GET /resources/{entity_id}/dependencyTree"),
                self.url(&["resources", entity_id, "dependencyTree"])?,
            ),
            EntityType::Object => (
                format!("GET /storages/objects/{entity_id}/dependencyTree"),
                self.url(&["storages", "objects", entity_id, "dependencyTree"])?,
            ),
        };
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            url.query_pairs_mut().append_pair("version", version);
        }
        self.get_data(&endpoint, url).await
    }

    async fn find_presentable(
        &self,
        node_id: NodeId,
        presentable_name: &str,
    ) -> Result<Option<PresentableInfo>, CatalogError> {
        let endpoint = "GET /presentables/detail";
        let mut url = self.url(&["presentables", "detail"])?;
        url.query_pairs_mut()
            .append_pair("nodeId", &node_id.to_string())
            .append_pair("presentableName", presentable_name);
        let data: Option<PresentableWire> = self.get_data(endpoint, url).await?;
        Ok(data.map(PresentableInfo::from))
    }
}
