use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};
use crate::access::directory::AccountDirectory;
use crate::access::resolver::{AccountIndexResolver, ResolvedAccounts};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::stats::{DatabaseStats, HealthCheck, HealthCheckResult, HealthStatus};
use crate::core::types::UsageRecord;
use crate::migration::orchestrator::{MigrationOrchestrator, SweepReport};
use crate::migration::registry::{Discovery, IndexVersionRegistry};
use crate::migration::store::{FileVersionStore, MemoryVersionStore, VersionStore};
use crate::parallel::cancel::CancelToken;
use crate::parallel::fan_in::PartitionSink;
use crate::reader::search::{search_resolved, SearchResponse};
use crate::schema::template::IndexTemplate;
use crate::schema::version::TemplateCatalog;
use crate::storage::connect;
use crate::storage::engine::StorageEngine;
use crate::writer::bulk::BulkWriter;
use crate::writer::ingest::{ingest, IngestReport};

/// Handle on the storage layer. Built once by `bootstrap` and passed to
/// whoever needs it; cloning shares the same engine and registry.
#[derive(Clone)]
pub struct Database {
    config: Config,

    engine: Arc<dyn StorageEngine>,
    catalog: Arc<TemplateCatalog>,
    registry: IndexVersionRegistry,

    start_time: SystemTime,
    started: Instant,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.engine)
            .field("templates", &self.catalog.iter().count())
            .finish()
    }
}

impl Database {
    /// Connects the engine and the version store named by `config`, then
    /// prepares them with the compiled-in templates.
    pub async fn bootstrap(config: Config) -> Result<Self> {
        config.validate()?;
        let engine = connect(&config.engine)?;
        let store: Arc<dyn VersionStore> = match &config.registry_path {
            Some(path) => Arc::new(FileVersionStore::open(path)?),
            None => Arc::new(MemoryVersionStore::new()),
        };
        Self::bootstrap_with(config, engine, store, TemplateCatalog::builtin()).await
    }

    /// Installs every template on the engine, registers tenant indices seen
    /// for the first time and, when enabled, migrates outdated ones.
    pub async fn bootstrap_with(
        config: Config,
        engine: Arc<dyn StorageEngine>,
        store: Arc<dyn VersionStore>,
        catalog: TemplateCatalog,
    ) -> Result<Self> {
        for entry in catalog.iter() {
            let template = &entry.template;
            engine
                .put_index_template(&template.name, &template.family, &template.body()?)
                .await?;
        }

        let db = Database {
            config,
            engine,
            catalog: Arc::new(catalog),
            registry: IndexVersionRegistry::new(store),
            start_time: SystemTime::now(),
            started: Instant::now(),
        };

        db.discover().await?;
        if db.config.migrate_on_startup {
            let report = db.migrate().await?;
            if !report.is_clean() {
                warn!(failed = report.failed().count(), "some indices stay outdated until the next sweep");
            }
        }

        info!(templates = db.catalog.iter().count(), "storage layer ready");
        Ok(db)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> Arc<dyn StorageEngine> {
        self.engine.clone()
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &IndexVersionRegistry {
        &self.registry
    }

    pub fn template(&self, name: &str) -> Result<&IndexTemplate> {
        self.catalog
            .get(name)
            .map(|e| &e.template)
            .ok_or_else(|| Error::not_found(format!("no template named {}", name)))
    }

    pub fn bulk_writer(&self) -> Result<BulkWriter> {
        BulkWriter::acquire(self.engine.clone(), &self.config.bulk)
    }

    pub fn resolver(&self, directory: Arc<dyn AccountDirectory>, template_name: &str) -> Result<AccountIndexResolver> {
        let template = self.template(template_name)?;
        Ok(AccountIndexResolver::new(directory, template.prefix.clone()))
    }

    pub async fn discover(&self) -> Result<Discovery> {
        self.registry.discover(self.engine.as_ref(), &self.catalog).await
    }

    pub async fn migrate(&self) -> Result<SweepReport> {
        MigrationOrchestrator::new(self.engine.clone(), self.registry.clone())
            .sweep(&self.catalog)
            .await
    }

    /// One collection run for tenant `user_id` into the family of `template_name`.
    pub async fn ingest<Part, P, F, Fut>(
        &self,
        user_id: u64,
        template_name: &str,
        partitions: Vec<Part>,
        producer: F,
        cancel: CancelToken,
    ) -> Result<IngestReport>
    where
        Part: fmt::Display,
        P: Serialize + Send + 'static,
        F: Fn(Part, PartitionSink<UsageRecord<P>>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let template = self.template(template_name)?;
        ingest(
            self.engine.clone(),
            user_id,
            template,
            partitions,
            producer,
            cancel,
            &self.config,
        )
        .await
    }

    pub async fn search<T: DeserializeOwned>(
        &self,
        resolved: &ResolvedAccounts,
        query: &Value,
    ) -> Result<Option<SearchResponse<T>>> {
        search_resolved(self.engine.as_ref(), resolved, query).await
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let mut registered = 0;
        let mut outdated = 0;
        for entry in self.catalog.iter() {
            registered += self.registry.list(&entry.template.name).await?.len();
            if let Some(version) = entry.version {
                outdated += self.registry.outdated(&entry.template.name, version).await?.len();
            }
        }

        Ok(DatabaseStats {
            uptime_secs: self.started.elapsed().as_secs(),
            start_time: self.start_time,
            templates: self.catalog.iter().count(),
            unversioned_templates: self.catalog.iter().filter(|e| e.version.is_none()).count(),
            registered_indices: registered,
            outdated_indices: outdated,
        })
    }

    pub async fn health(&self) -> HealthCheckResult {
        let mut checks = Vec::new();

        let started = Instant::now();
        let engine_status = match self.engine.list_indices().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };
        checks.push(HealthCheck {
            name: "engine".to_string(),
            status: engine_status,
            message: None,
            latency_ms: started.elapsed().as_millis() as u64,
        });

        let unversioned: Vec<&str> = self
            .catalog
            .iter()
            .filter(|e| e.version.is_none())
            .map(|e| e.template.name.as_str())
            .collect();
        checks.push(HealthCheck {
            name: "templates".to_string(),
            status: if unversioned.is_empty() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded(format!("{} template(s) without version", unversioned.len()))
            },
            message: (!unversioned.is_empty()).then(|| unversioned.join(", ")),
            latency_ms: 0,
        });

        let started = Instant::now();
        let registry_status = match self.stats().await {
            Ok(stats) if stats.outdated_indices == 0 => HealthStatus::Healthy,
            Ok(stats) => HealthStatus::Degraded(format!("{} outdated indices", stats.outdated_indices)),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        };
        checks.push(HealthCheck {
            name: "registry".to_string(),
            status: registry_status,
            message: None,
            latency_ms: started.elapsed().as_millis() as u64,
        });

        HealthCheckResult::from_checks(checks)
    }
}
