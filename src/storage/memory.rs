use std::collections::BTreeMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{BulkResponse, DocumentFailure};
use crate::storage::engine::{BulkItem, StorageEngine};
use crate::storage::naming::glob_matches;

/// In-process storage engine with Elasticsearch semantics for templates,
/// aliases and upserts. Writes are visible immediately.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: RwLock<EngineState>,
}

#[derive(Debug, Default)]
struct EngineState {
    indices: BTreeMap<String, MemoryIndex>,
    aliases: BTreeMap<String, String>,
    templates: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Clone)]
struct MemoryIndex {
    mappings: BTreeMap<String, Value>,
    docs: BTreeMap<String, Value>,
}

impl EngineState {
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    fn index(&self, name: &str) -> Result<&MemoryIndex> {
        let physical = self.resolve(name);
        self.indices
            .get(physical)
            .ok_or_else(|| Error::not_found(format!("no such index [{}]", name)))
    }

    fn name_taken(&self, name: &str) -> bool {
        self.indices.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Mappings of every template whose pattern matches `name`.
    fn template_mappings(&self, name: &str) -> BTreeMap<String, Value> {
        let mut mappings = BTreeMap::new();
        for template in self.templates.values() {
            let matches = template
                .get("index_patterns")
                .and_then(Value::as_array)
                .map(|patterns| {
                    patterns
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|p| glob_matches(p, name))
                })
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(Value::Object(families)) = template.get("mappings") {
                for (family, mapping) in families {
                    mappings.insert(family.clone(), mapping.clone());
                }
            }
        }
        mappings
    }

    /// Resolves a write target, creating the index from templates if needed.
    fn write_target(&mut self, name: &str) -> &mut MemoryIndex {
        let physical = self.resolve(name).to_string();
        let mappings = if self.indices.contains_key(&physical) {
            BTreeMap::new()
        } else {
            self.template_mappings(&physical)
        };
        self.indices.entry(physical).or_insert_with(|| MemoryIndex {
            mappings,
            docs: BTreeMap::new(),
        })
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping stored for `family` on `index`, if any.
    pub fn mapping(&self, index: &str, family: &str) -> Option<Value> {
        let state = self.state.read();
        state
            .index(index)
            .ok()
            .and_then(|idx| idx.mappings.get(family).cloned())
    }
}

/// Evaluates the supported query subset: `match_all` and single-level `term`.
fn query_matches(query: &Value, source: &Value) -> Result<bool> {
    if query.get("match_all").is_some() {
        return Ok(true);
    }
    if let Some(term) = query.get("term").and_then(Value::as_object) {
        return Ok(term.iter().all(|(field, expected)| {
            let expected = expected.get("value").unwrap_or(expected);
            source.get(field) == Some(expected)
        }));
    }
    Err(Error::new(
        ErrorKind::InvalidArgument,
        format!("memory engine does not support query {}", query),
    ))
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.read();
        Ok(state.indices.contains_key(state.resolve(name)))
    }

    async fn create_index(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.name_taken(name) {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("index [{}] already exists", name),
            ));
        }
        let mappings = state.template_mappings(name);
        state.indices.insert(
            name.to_string(),
            MemoryIndex {
                mappings,
                docs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put_mapping(&self, name: &str, family: &str, mapping: &Value) -> Result<()> {
        let mut state = self.state.write();
        let physical = state.resolve(name).to_string();
        let index = state
            .indices
            .get_mut(&physical)
            .ok_or_else(|| Error::not_found(format!("no such index [{}]", name)))?;
        index.mappings.insert(family.to_string(), mapping.clone());
        Ok(())
    }

    async fn bulk_write(&self, items: &[BulkItem]) -> Result<BulkResponse> {
        let mut state = self.state.write();
        let mut response = BulkResponse::default();

        for item in items {
            if !item.body.is_object() {
                response.failures.push(DocumentFailure {
                    index: item.index.clone(),
                    id: item.id.clone(),
                    reason: "document body must be an object".to_string(),
                });
                continue;
            }
            let index = state.write_target(&item.index);
            index.docs.insert(item.id.clone(), item.body.clone());
            response.indexed += 1;
        }

        Ok(response)
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<u64> {
        let mut state = self.state.write();
        let docs = state.index(source)?.docs.clone();
        let copied = docs.len() as u64;
        let target = state.write_target(dest);
        target.docs.extend(docs);
        Ok(copied)
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.aliases.contains_key(name) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("[{}] is an alias, delete its index instead", name),
            ));
        }
        if state.indices.remove(name).is_none() {
            return Err(Error::not_found(format!("no such index [{}]", name)));
        }
        // Aliases die with their index.
        state.aliases.retain(|_, target| target.as_str() != name);
        Ok(())
    }

    async fn put_alias(&self, alias: &str, target: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.indices.contains_key(target) {
            return Err(Error::not_found(format!("no such index [{}]", target)));
        }
        if state.indices.contains_key(alias) {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("an index named [{}] exists, cannot create alias", alias),
            ));
        }
        state.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>> {
        Ok(self.state.read().aliases.get(alias).cloned())
    }

    async fn list_indices(&self) -> Result<Vec<String>> {
        Ok(self.state.read().indices.keys().cloned().collect())
    }

    async fn put_index_template(&self, name: &str, _family: &str, body: &Value) -> Result<()> {
        self.state
            .write()
            .templates
            .insert(name.to_string(), body.clone());
        Ok(())
    }

    async fn search(&self, indexes: &[String], query: &Value) -> Result<Value> {
        let state = self.state.read();
        let size = query.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let filter = query.get("query").cloned().unwrap_or_else(|| json!({"match_all": {}}));

        let mut total = 0u64;
        let mut hits = Vec::new();
        for name in indexes.iter().flat_map(|n| n.split(',')) {
            let physical = state.resolve(name).to_string();
            let index = state.index(name)?;
            for (id, source) in &index.docs {
                if !query_matches(&filter, source)? {
                    continue;
                }
                total += 1;
                if hits.len() < size {
                    let mut hit = Map::new();
                    hit.insert("_index".to_string(), Value::String(physical.clone()));
                    hit.insert("_id".to_string(), Value::String(id.clone()));
                    hit.insert("_source".to_string(), source.clone());
                    hits.push(Value::Object(hit));
                }
            }
        }

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": hits,
            }
        }))
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let state = self.state.read();
        Ok(state.index(index)?.docs.len() as u64)
    }

    async fn get_document(&self, index: &str, _family: &str, id: &str) -> Result<Option<Value>> {
        let state = self.state.read();
        Ok(state.index(index)?.docs.get(id).cloned())
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.state.read().index(index).map(|_| ())
    }
}
