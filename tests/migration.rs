mod common;

use std::sync::Arc;
use serde_json::json;
use tallydex::core::types::UsageRecord;
use tallydex::core::reports::Ec2InstanceReport;
use tallydex::migration::{
    FileVersionStore, IndexVersionRegistry, IndexVersioning, MemoryVersionStore, MigrationOrchestrator,
    MigrationState,
};
use tallydex::reader::search::{search_typed, SearchResponse};
use tallydex::schema::{IndexTemplate, TemplateCatalog};
use tallydex::storage::engine::StorageEngine;
use tallydex::writer::bulk::BulkWriter;
use tallydex::writer::identity::record_identity;
use tallydex::core::config::BulkConfig;
use tallydex::core::error::ErrorKind;

use common::{ec2_report, Calls, RecordingEngine};

/// Tenant 42 holds `docs` EC2 reports in an index registered at version 3.
async fn index_at_v3(engine: &Arc<RecordingEngine>, registry: &IndexVersionRegistry, docs: usize) {
    let mut writer = BulkWriter::acquire(engine.clone(), &BulkConfig { max_batch_docs: 100 }).unwrap();
    for i in 0..docs {
        let record = ec2_report("123456789012", &format!("i-{:04}", i), i as f64);
        let id = record_identity(&record).unwrap();
        writer.add(&record, "ec2-report", "000042-ec2-reports", &id);
    }
    writer.flush().await.unwrap();
    writer.close().await.unwrap();

    registry
        .insert(&IndexVersioning::new("000042-ec2-reports", "ec2-reports", 3))
        .await
        .unwrap();
}

async fn ids_through_alias(engine: &RecordingEngine) -> Vec<String> {
    let response: SearchResponse<UsageRecord<Ec2InstanceReport>> = search_typed(
        engine,
        &["000042-ec2-reports".to_string()],
        &json!({"query": {"match_all": {}}, "size": 1000}),
    )
    .await
    .unwrap()
    .unwrap();
    let mut ids: Vec<String> = response.hits.hits.into_iter().map(|h| h.id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn v3_index_moves_to_v5_without_losing_documents() {
    let engine = RecordingEngine::new();
    let registry = IndexVersionRegistry::new(Arc::new(MemoryVersionStore::new()));
    index_at_v3(&engine, &registry, 25).await;

    let before_count = engine.count("000042-ec2-reports").await.unwrap();
    let before_ids = ids_through_alias(&engine).await;

    let orchestrator = MigrationOrchestrator::new(engine.clone(), registry.clone());
    let report = orchestrator.sweep(&TemplateCatalog::builtin()).await.unwrap();

    assert!(report.is_clean());
    let migration = &report.migrations[0];
    assert_eq!((migration.from, migration.to), (3, 5));
    assert_eq!(migration.copied, 25);

    assert_eq!(registry.get("000042-ec2-reports").await.unwrap().unwrap().version, 5);
    assert_eq!(
        engine.resolve_alias("000042-ec2-reports").await.unwrap().as_deref(),
        Some("000042-ec2-reports-v5")
    );
    assert_eq!(engine.count("000042-ec2-reports").await.unwrap(), before_count);
    assert_eq!(ids_through_alias(&engine).await, before_ids);
}

#[tokio::test]
async fn current_index_is_left_alone() {
    let engine = RecordingEngine::new();
    let registry = IndexVersionRegistry::new(Arc::new(MemoryVersionStore::new()));
    index_at_v3(&engine, &registry, 3).await;

    let orchestrator = MigrationOrchestrator::new(engine.clone(), registry.clone());
    orchestrator.sweep(&TemplateCatalog::builtin()).await.unwrap();
    let after_first = engine.calls.structural();

    let second = orchestrator.sweep(&TemplateCatalog::builtin()).await.unwrap();
    assert!(second.migrations.is_empty());
    assert_eq!(engine.calls.structural(), after_first);

    let row = registry.get("000042-ec2-reports").await.unwrap().unwrap();
    assert_eq!(MigrationState::of(&row, 5), MigrationState::Current);
    let copied = orchestrator
        .migrate_index(&row, &TemplateCatalog::builtin().get("ec2-reports").unwrap().template, 5)
        .await
        .unwrap();
    assert_eq!(copied, 0);
    assert_eq!(engine.calls.structural(), after_first);
}

#[tokio::test]
async fn migrated_index_migrates_again_from_its_alias_target() {
    let engine = RecordingEngine::new();
    let registry = IndexVersionRegistry::new(Arc::new(MemoryVersionStore::new()));
    index_at_v3(&engine, &registry, 4).await;

    let orchestrator = MigrationOrchestrator::new(engine.clone(), registry.clone());
    orchestrator.sweep(&TemplateCatalog::builtin()).await.unwrap();

    let builtin = TemplateCatalog::builtin();
    let ec2 = &builtin.get("ec2-reports").unwrap().template;
    let bumped = ec2.definition.replace(r#""version": 5"#, r#""version": 6"#);
    let v6 = TemplateCatalog::compile(vec![IndexTemplate::new("ec2-reports", "ec2-reports", "ec2-report", bumped)]);

    let report = orchestrator.sweep(&v6).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.migrations[0].from, 5);

    assert_eq!(
        engine.resolve_alias("000042-ec2-reports").await.unwrap().as_deref(),
        Some("000042-ec2-reports-v6")
    );
    assert!(!engine.index_exists("000042-ec2-reports-v5").await.unwrap());
    assert_eq!(engine.count("000042-ec2-reports").await.unwrap(), 4);
}

#[tokio::test]
async fn one_failing_index_does_not_block_the_others() {
    let engine = RecordingEngine::new();
    let registry = IndexVersionRegistry::new(Arc::new(MemoryVersionStore::new()));
    index_at_v3(&engine, &registry, 2).await;

    let record = ec2_report("999999999999", "i-broken", 1.0);
    let mut writer = BulkWriter::acquire(engine.clone(), &BulkConfig::default()).unwrap();
    writer.add(&record, "ec2-report", "000097-ec2-reports", &record_identity(&record).unwrap());
    writer.flush().await.unwrap();
    writer.close().await.unwrap();
    registry
        .insert(&IndexVersioning::new("000097-ec2-reports", "ec2-reports", 3))
        .await
        .unwrap();
    engine.fail_reindex_from(Some("000097-ec2-reports"));

    let orchestrator = MigrationOrchestrator::new(engine.clone(), registry.clone());
    let report = orchestrator.sweep(&TemplateCatalog::builtin()).await.unwrap();

    assert_eq!(report.migrated().count(), 1);
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, "000097-ec2-reports");
    assert_eq!(failed[0].error.as_ref().unwrap().kind, ErrorKind::Backend);

    // The failed index is untouched and still on its old version.
    assert_eq!(registry.get("000097-ec2-reports").await.unwrap().unwrap().version, 3);
    assert_eq!(engine.count("000097-ec2-reports").await.unwrap(), 1);
    assert_eq!(registry.get("000042-ec2-reports").await.unwrap().unwrap().version, 5);

    // Next sweep picks it up, reusing the target created by the failed run.
    engine.fail_reindex_from(None);
    let retry = orchestrator.sweep(&TemplateCatalog::builtin()).await.unwrap();
    assert!(retry.is_clean());
    assert_eq!(retry.migrations.len(), 1);
    assert_eq!(registry.get("000097-ec2-reports").await.unwrap().unwrap().version, 5);
    assert_eq!(engine.count("000097-ec2-reports").await.unwrap(), 1);
}

#[tokio::test]
async fn registry_in_file_survives_restart_between_sweeps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index_versions.bin");
    let engine = RecordingEngine::new();

    {
        let registry = IndexVersionRegistry::new(Arc::new(FileVersionStore::open(&path).unwrap()));
        index_at_v3(&engine, &registry, 5).await;
        MigrationOrchestrator::new(engine.clone(), registry)
            .sweep(&TemplateCatalog::builtin())
            .await
            .unwrap();
    }

    let creates_before = Calls::get(&engine.calls.create_index);
    let registry = IndexVersionRegistry::new(Arc::new(FileVersionStore::open(&path).unwrap()));
    let report = MigrationOrchestrator::new(engine.clone(), registry)
        .sweep(&TemplateCatalog::builtin())
        .await
        .unwrap();

    assert!(report.migrations.is_empty());
    assert_eq!(Calls::get(&engine.calls.create_index), creates_before);
}
