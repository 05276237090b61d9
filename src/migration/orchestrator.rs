use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, Instrument};
use crate::core::error::{Error, Result};
use crate::core::observability::migration_span;
use crate::migration::registry::IndexVersionRegistry;
use crate::migration::store::IndexVersioning;
use crate::schema::template::IndexTemplate;
use crate::schema::version::TemplateCatalog;
use crate::storage::engine::StorageEngine;
use crate::storage::naming::versioned_index_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Current,
    Outdated,
    Migrating,
    Failed,
}

impl MigrationState {
    pub fn of(record: &IndexVersioning, current_version: u32) -> Self {
        if record.version >= current_version {
            MigrationState::Current
        } else {
            MigrationState::Outdated
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            MigrationState::Current => "current",
            MigrationState::Outdated => "outdated",
            MigrationState::Migrating => "migrating",
            MigrationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happened to one index during a sweep.
#[derive(Debug)]
pub struct IndexMigration {
    pub index: String,
    pub template: String,
    pub from: u32,
    pub to: u32,
    pub state: MigrationState,
    pub copied: u64,
    pub error: Option<Error>,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub migrations: Vec<IndexMigration>,
}

impl SweepReport {
    pub fn migrated(&self) -> impl Iterator<Item = &IndexMigration> {
        self.migrations.iter().filter(|m| m.state == MigrationState::Current)
    }

    pub fn failed(&self) -> impl Iterator<Item = &IndexMigration> {
        self.migrations.iter().filter(|m| m.state == MigrationState::Failed)
    }

    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Moves outdated indices onto the current template version.
///
/// Per index: create `{name}-v{to}`, install the mapping, reindex from the
/// physical index currently behind `name`, delete that index, point alias
/// `name` at the new one, record the version. Every step can be repeated, so
/// an index left half way by a crash is finished by the next sweep. Nothing
/// is rolled back.
pub struct MigrationOrchestrator {
    engine: Arc<dyn StorageEngine>,
    registry: IndexVersionRegistry,
}

impl MigrationOrchestrator {
    pub fn new(engine: Arc<dyn StorageEngine>, registry: IndexVersionRegistry) -> Self {
        MigrationOrchestrator { engine, registry }
    }

    /// Migrates every outdated index of every versioned template. A failing
    /// index is logged and reported, the others carry on.
    pub async fn sweep(&self, catalog: &TemplateCatalog) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for (template, version) in catalog.versioned() {
            for record in self.registry.outdated(&template.name, version).await? {
                let span = migration_span(&record.index_name, &template.name, record.version, version);
                let outcome = self
                    .migrate_index(&record, template, version)
                    .instrument(span)
                    .await;

                let mut migration = IndexMigration {
                    index: record.index_name.clone(),
                    template: template.name.clone(),
                    from: record.version,
                    to: version,
                    state: MigrationState::Current,
                    copied: 0,
                    error: None,
                };
                match outcome {
                    Ok(copied) => migration.copied = copied,
                    Err(e) => {
                        error!(
                            index = %record.index_name,
                            template = %template.name,
                            from = record.version,
                            to = version,
                            error = %e,
                            "index migration failed"
                        );
                        migration.state = MigrationState::Failed;
                        migration.error = Some(e);
                    }
                }
                report.migrations.push(migration);
            }
        }

        info!(
            migrated = report.migrated().count(),
            failed = report.failed().count(),
            "migration sweep done"
        );
        Ok(report)
    }

    /// Runs the migration of one index to version `to`, returning how many
    /// documents were copied.
    pub async fn migrate_index(&self, record: &IndexVersioning, template: &IndexTemplate, to: u32) -> Result<u64> {
        if MigrationState::of(record, to) == MigrationState::Current {
            return Ok(0);
        }
        info!(state = %MigrationState::Migrating, "migrating index");

        let name = record.index_name.as_str();
        let target = versioned_index_name(name, to);
        let source = self
            .engine
            .resolve_alias(name)
            .await?
            .unwrap_or_else(|| name.to_string());

        match self.engine.create_index(&target).await {
            Ok(()) => debug!(index = %target, "created target index"),
            Err(e) if e.is_already_exists() => debug!(index = %target, "target index already exists"),
            Err(e) => return Err(e),
        }

        self.engine
            .put_mapping(&target, &template.family, &template.mapping()?)
            .await?;

        let mut copied = 0;
        if source != target && self.engine.index_exists(&source).await? {
            self.engine.refresh(&source).await?;
            copied = self.engine.reindex(&source, &target).await?;
            debug!(source = %source, target = %target, copied, "reindexed");

            match self.engine.delete_index(&source).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!(index = %source, "source already deleted"),
                Err(e) => return Err(e),
            }
        } else {
            debug!(source = %source, "nothing to copy");
        }

        self.engine.put_alias(name, &target).await?;

        let mut updated = record.clone();
        updated.version = to;
        self.registry.update(&updated).await?;

        info!(state = %MigrationState::Current, copied, "index migrated");
        Ok(copied)
    }
}
