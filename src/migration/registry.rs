use std::sync::Arc;
use tracing::{debug, info};
use crate::core::error::Result;
use crate::migration::store::{IndexVersioning, VersionStore};
use crate::schema::version::TemplateCatalog;
use crate::storage::engine::StorageEngine;

/// Which template version each tenant index is on.
#[derive(Clone)]
pub struct IndexVersionRegistry {
    store: Arc<dyn VersionStore>,
}

/// Outcome of `discover`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Discovery {
    pub registered: Vec<IndexVersioning>,
    pub already_known: usize,
    pub unrelated: usize,
}

impl IndexVersionRegistry {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        IndexVersionRegistry { store }
    }

    pub async fn get(&self, index_name: &str) -> Result<Option<IndexVersioning>> {
        self.store.select_by_index_name(index_name).await
    }

    pub async fn list(&self, template_name: &str) -> Result<Vec<IndexVersioning>> {
        self.store.select_by_template(template_name).await
    }

    pub async fn outdated(&self, template_name: &str, current_version: u32) -> Result<Vec<IndexVersioning>> {
        self.store.select_outdated(template_name, current_version).await
    }

    pub async fn insert(&self, record: &IndexVersioning) -> Result<()> {
        self.store.insert(record).await
    }

    pub async fn update(&self, record: &IndexVersioning) -> Result<()> {
        self.store.update(record).await
    }

    /// Registers every tenant index on the engine that has no row yet.
    ///
    /// A newly seen index is assumed to have been created from the template
    /// this process carries, so it is recorded at that template's version.
    /// Templates whose version could not be extracted are ignored.
    pub async fn discover(&self, engine: &dyn StorageEngine, catalog: &TemplateCatalog) -> Result<Discovery> {
        let mut discovery = Discovery::default();

        for name in engine.list_indices().await? {
            let Some(entry) = catalog.template_for_index(&name) else {
                discovery.unrelated += 1;
                continue;
            };
            let Some(version) = entry.version else {
                discovery.unrelated += 1;
                continue;
            };
            if self.get(&name).await?.is_some() {
                discovery.already_known += 1;
                continue;
            }

            let record = IndexVersioning::new(name.as_str(), entry.template.name.as_str(), version);
            match self.insert(&record).await {
                Ok(()) => {
                    debug!(index = %name, template = %entry.template.name, version, "registered index");
                    discovery.registered.push(record);
                }
                // Another process registered it in between.
                Err(e) if e.is_already_exists() => discovery.already_known += 1,
                Err(e) => return Err(e),
            }
        }

        info!(
            registered = discovery.registered.len(),
            known = discovery.already_known,
            "index discovery done"
        );
        Ok(discovery)
    }
}
