use std::collections::HashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use crate::access::resolver::ResolvedAccounts;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::engine::StorageEngine;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default)]
    pub took: u64,
    pub hits: Hits<T>,
    #[serde(default)]
    pub aggregations: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hits<T> {
    #[serde(deserialize_with = "total_hits", default)]
    pub total: u64,
    pub hits: Vec<Hit<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit<T> {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TermsAggregation {
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub key: Value,
    pub doc_count: u64,
}

/// `hits.total` is a plain number on 6.x and `{value, relation}` from 7.x on.
fn total_hits<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Count(u64),
        Object { value: u64 },
    }

    Ok(match Total::deserialize(deserializer)? {
        Total::Count(n) => n,
        Total::Object { value } => value,
    })
}

impl<T> SearchResponse<T> {
    pub fn sources(self) -> Vec<T> {
        self.hits.hits.into_iter().map(|h| h.source).collect()
    }

    pub fn terms(&self, name: &str) -> Result<TermsAggregation> {
        let raw = self.aggregations.get(name).ok_or_else(|| {
            Error::new(ErrorKind::Parse, format!("response has no aggregation {}", name))
        })?;
        Ok(TermsAggregation::deserialize(raw)?)
    }
}

/// Runs `query` over `indexes` and decodes the response. A missing index
/// means nothing was ingested yet and gives `None`.
pub async fn search_typed<T: DeserializeOwned>(
    engine: &dyn StorageEngine,
    indexes: &[String],
    query: &Value,
) -> Result<Option<SearchResponse<T>>> {
    match engine.search(indexes, query).await {
        Ok(raw) => Ok(Some(serde_json::from_value(raw)?)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// `search_typed` over the indices a principal was resolved to.
pub async fn search_resolved<T: DeserializeOwned>(
    engine: &dyn StorageEngine,
    resolved: &ResolvedAccounts,
    query: &Value,
) -> Result<Option<SearchResponse<T>>> {
    search_typed(engine, &resolved.indexes, query).await
}

pub async fn get_typed<T: DeserializeOwned>(
    engine: &dyn StorageEngine,
    index: &str,
    family: &str,
    id: &str,
) -> Result<Option<T>> {
    match engine.get_document(index, family, id).await {
        Ok(Some(raw)) => Ok(Some(serde_json::from_value(raw)?)),
        Ok(None) => Ok(None),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
