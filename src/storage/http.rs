use std::collections::BTreeMap;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use crate::core::config::EngineConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{BulkResponse, DocumentFailure};
use crate::storage::engine::{BulkItem, StorageEngine};

/// Elasticsearch REST client.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    base_url: String,
    client: Client,
    legacy_mapping_types: bool,
}

#[derive(Debug, Deserialize)]
struct BulkApiResponse {
    #[serde(default)]
    items: Vec<BTreeMap<String, BulkApiItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkApiItem {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    status: u16,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ReindexApiResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    failures: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CountApiResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

#[derive(Debug, Deserialize)]
struct GetApiResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
    error: Option<Value>,
}

impl HttpEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(HttpEngine {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            legacy_mapping_types: config.legacy_mapping_types,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Turns a non-success response into a typed error.
    async fn error_from(response: Response, what: &str) -> Error {
        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        let parsed = serde_json::from_slice::<Value>(&body).ok();
        let error_type = parsed
            .as_ref()
            .and_then(|v| v.pointer("/error/type"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let reason = parsed
            .as_ref()
            .and_then(|v| v.pointer("/error/reason"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        match (status, error_type.as_str()) {
            (_, "resource_already_exists_exception") | (_, "index_already_exists_exception") => {
                Error::new(ErrorKind::AlreadyExists, format!("{}: {}", what, reason))
            }
            (StatusCode::NOT_FOUND, _) => Error::not_found(format!("{}: {}", what, reason)),
            _ => Error::backend(format!("{} failed ({}): {}", what, status, reason)),
        }
    }

    async fn expect_success(response: Response, what: &str) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response, what).await)
        }
    }

    /// Template body in the shape the backend expects. Typeless backends take
    /// the family mapping directly under `mappings`.
    fn template_body(&self, family: &str, body: &Value) -> Result<Value> {
        if self.legacy_mapping_types {
            return Ok(body.clone());
        }
        let mut body = body.clone();
        let mapping = body
            .get_mut("mappings")
            .and_then(|m| m.get_mut(family))
            .map(Value::take)
            .ok_or_else(|| {
                Error::new(ErrorKind::Parse, format!("template has no mapping for family {}", family))
            })?;
        body["mappings"] = mapping;
        Ok(body)
    }

    fn bulk_body(&self, items: &[BulkItem]) -> Result<BytesMut> {
        let mut body = BytesMut::new();
        for item in items {
            let mut meta = json!({ "_index": item.index, "_id": item.id });
            if self.legacy_mapping_types {
                meta["_type"] = Value::String(item.family.clone());
            }
            body.put_slice(&serde_json::to_vec(&json!({ "index": meta }))?);
            body.put_u8(b'\n');
            body.put_slice(&serde_json::to_vec(&item.body)?);
            body.put_u8(b'\n');
        }
        Ok(body)
    }
}

#[async_trait]
impl StorageEngine for HttpEngine {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self.client.head(self.url(name)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::error_from(response, &format!("index exists [{}]", name)).await),
        }
    }

    async fn create_index(&self, name: &str) -> Result<()> {
        let response = self.client.put(self.url(name)).json(&json!({})).send().await?;
        Self::expect_success(response, &format!("create index [{}]", name)).await?;
        Ok(())
    }

    async fn put_mapping(&self, name: &str, family: &str, mapping: &Value) -> Result<()> {
        let path = if self.legacy_mapping_types {
            format!("{}/_mapping/{}", name, family)
        } else {
            format!("{}/_mapping", name)
        };
        let response = self.client.put(self.url(&path)).json(mapping).send().await?;
        Self::expect_success(response, &format!("put mapping [{}]", name)).await?;
        Ok(())
    }

    async fn bulk_write(&self, items: &[BulkItem]) -> Result<BulkResponse> {
        if items.is_empty() {
            return Ok(BulkResponse::default());
        }
        let body = self.bulk_body(items)?;
        debug!(documents = items.len(), bytes = body.len(), "sending bulk request");

        let response = self
            .client
            .post(self.url("_bulk"))
            .header("Content-Type", "application/x-ndjson")
            .body(body.freeze())
            .send()
            .await?;
        let response = Self::expect_success(response, "bulk").await?;
        let parsed: BulkApiResponse = response.json().await?;

        let mut result = BulkResponse::default();
        for item in parsed.items.into_iter().flat_map(|entry| entry.into_values()) {
            if item.status >= 300 || item.error.is_some() {
                let reason = item
                    .error
                    .as_ref()
                    .and_then(|e| e.get("reason"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("status {}", item.status));
                result.failures.push(DocumentFailure {
                    index: item.index,
                    id: item.id,
                    reason,
                });
            } else {
                result.indexed += 1;
            }
        }
        Ok(result)
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<u64> {
        let response = self
            .client
            .post(self.url("_reindex?refresh=true&wait_for_completion=true"))
            .json(&json!({ "source": { "index": source }, "dest": { "index": dest } }))
            .send()
            .await?;
        let what = format!("reindex [{}] -> [{}]", source, dest);
        let response = Self::expect_success(response, &what).await?;
        let parsed: ReindexApiResponse = response.json().await?;
        if !parsed.failures.is_empty() {
            return Err(Error::backend(format!(
                "{}: {} documents failed, first: {}",
                what,
                parsed.failures.len(),
                parsed.failures[0]
            )));
        }
        Ok(parsed.total)
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self.client.delete(self.url(name)).send().await?;
        Self::expect_success(response, &format!("delete index [{}]", name)).await?;
        Ok(())
    }

    async fn put_alias(&self, alias: &str, target: &str) -> Result<()> {
        let mut actions = Vec::new();
        if let Some(previous) = self.resolve_alias(alias).await? {
            if previous != target {
                actions.push(json!({ "remove": { "index": previous, "alias": alias } }));
            }
        }
        actions.push(json!({ "add": { "index": target, "alias": alias } }));

        let response = self
            .client
            .post(self.url("_aliases"))
            .json(&json!({ "actions": actions }))
            .send()
            .await?;
        Self::expect_success(response, &format!("alias [{}] -> [{}]", alias, target)).await?;
        Ok(())
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url(&format!("_alias/{}", alias)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(response, &format!("get alias [{}]", alias)).await?;
        let parsed: BTreeMap<String, Value> = response.json().await?;
        Ok(parsed.into_keys().next())
    }

    async fn list_indices(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("_cat/indices?format=json&h=index"))
            .send()
            .await?;
        let response = Self::expect_success(response, "list indices").await?;
        let parsed: Vec<CatIndex> = response.json().await?;
        Ok(parsed.into_iter().map(|c| c.index).collect())
    }

    async fn put_index_template(&self, name: &str, family: &str, body: &Value) -> Result<()> {
        let body = self.template_body(family, body)?;
        let response = self
            .client
            .put(self.url(&format!("_template/{}", name)))
            .json(&body)
            .send()
            .await?;
        Self::expect_success(response, &format!("put template [{}]", name)).await?;
        Ok(())
    }

    async fn search(&self, indexes: &[String], query: &Value) -> Result<Value> {
        let path = format!("{}/_search", indexes.join(","));
        let response = self.client.post(self.url(&path)).json(query).send().await?;
        let response = Self::expect_success(response, &format!("search [{}]", indexes.join(","))).await?;
        Ok(response.json().await?)
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let response = self
            .client
            .get(self.url(&format!("{}/_count", index)))
            .send()
            .await?;
        let response = Self::expect_success(response, &format!("count [{}]", index)).await?;
        let parsed: CountApiResponse = response.json().await?;
        Ok(parsed.count)
    }

    async fn get_document(&self, index: &str, family: &str, id: &str) -> Result<Option<Value>> {
        let doc_type = if self.legacy_mapping_types { family } else { "_doc" };
        let response = self
            .client
            .get(self.url(&format!("{}/{}/{}", index, doc_type, id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            let body = response.bytes().await?;
            // A missing document answers `found: false`, a missing index an error object.
            return match serde_json::from_slice::<GetApiResponse>(&body) {
                Ok(parsed) if parsed.error.is_none() && !parsed.found => Ok(None),
                _ => Err(Error::not_found(format!("no such index [{}]", index))),
            };
        }
        let response = Self::expect_success(response, &format!("get [{}/{}]", index, id)).await?;
        let parsed: GetApiResponse = response.json().await?;
        Ok(parsed.source.filter(|_| parsed.found))
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("{}/_refresh", index)))
            .send()
            .await?;
        Self::expect_success(response, &format!("refresh [{}]", index)).await?;
        Ok(())
    }
}
