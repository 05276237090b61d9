use std::fmt;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use crate::core::error::Result;
use crate::core::types::BulkResponse;

/// One document of a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItem {
    pub index: String,
    pub family: String,
    pub id: String,
    pub body: Value,
}

/// Search-indexing backend holding every tenant's documents.
///
/// Index arguments may name an alias wherever the backend accepts one
/// (reads, writes, reindex source). `create_index` fails with `AlreadyExists`
/// and `delete_index` with `NotFound` so callers can tell those apart from
/// transport failures.
#[async_trait]
pub trait StorageEngine: Send + Sync + fmt::Debug {
    async fn index_exists(&self, name: &str) -> Result<bool>;

    async fn create_index(&self, name: &str) -> Result<()>;

    async fn put_mapping(&self, name: &str, family: &str, mapping: &Value) -> Result<()>;

    /// Upserts every item by `(index, id)`. Item-level rejections are returned
    /// in the response, only transport failures are errors.
    async fn bulk_write(&self, items: &[BulkItem]) -> Result<BulkResponse>;

    /// Copies all documents from `source` into `dest`, returning how many were copied.
    async fn reindex(&self, source: &str, dest: &str) -> Result<u64>;

    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Points `alias` at `target`, replacing any previous target.
    async fn put_alias(&self, alias: &str, target: &str) -> Result<()>;

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>>;

    /// Physical index names, aliases excluded.
    async fn list_indices(&self) -> Result<Vec<String>>;

    /// Installs a template. `body` keeps the mapping under `mappings.<family>`;
    /// engines without mapping types unwrap that level before installing it.
    async fn put_index_template(&self, name: &str, family: &str, body: &Value) -> Result<()>;

    async fn search(&self, indexes: &[String], query: &Value) -> Result<Value>;

    async fn count(&self, index: &str) -> Result<u64>;

    async fn get_document(&self, index: &str, family: &str, id: &str) -> Result<Option<Value>>;

    /// Makes every acknowledged write to `index` visible to reads.
    async fn refresh(&self, index: &str) -> Result<()>;
}
