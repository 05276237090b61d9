#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::Value;
use tallydex::core::error::{Error, Result};
use tallydex::core::reports::Ec2InstanceReport;
use tallydex::core::types::{BulkResponse, ReportKind, Tag, UsageRecord};
use tallydex::storage::engine::{BulkItem, StorageEngine};
use tallydex::storage::memory::MemoryEngine;

/// Calls of interest made against a `RecordingEngine`.
#[derive(Debug, Default)]
pub struct Calls {
    pub create_index: AtomicUsize,
    pub put_mapping: AtomicUsize,
    pub reindex: AtomicUsize,
    pub delete_index: AtomicUsize,
    pub put_alias: AtomicUsize,
    pub bulk_write: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn structural(&self) -> usize {
        Self::get(&self.create_index) + Self::get(&self.reindex) + Self::get(&self.delete_index)
    }
}

/// Memory engine that counts the calls made through it.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub inner: MemoryEngine,
    pub calls: Calls,
    failing_reindex_source: Mutex<Option<String>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every reindex out of `source` fail until cleared with `None`.
    pub fn fail_reindex_from(&self, source: Option<&str>) {
        *self.failing_reindex_source.lock() = source.map(str::to_string);
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[async_trait]
impl StorageEngine for RecordingEngine {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        self.inner.index_exists(name).await
    }

    async fn create_index(&self, name: &str) -> Result<()> {
        bump(&self.calls.create_index);
        self.inner.create_index(name).await
    }

    async fn put_mapping(&self, name: &str, family: &str, mapping: &Value) -> Result<()> {
        bump(&self.calls.put_mapping);
        self.inner.put_mapping(name, family, mapping).await
    }

    async fn bulk_write(&self, items: &[BulkItem]) -> Result<BulkResponse> {
        bump(&self.calls.bulk_write);
        self.inner.bulk_write(items).await
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<u64> {
        bump(&self.calls.reindex);
        let failing = self.failing_reindex_source.lock().clone();
        if failing.as_deref() == Some(source) {
            return Err(Error::backend(format!("reindex from [{}] rejected", source)));
        }
        self.inner.reindex(source, dest).await
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        bump(&self.calls.delete_index);
        self.inner.delete_index(name).await
    }

    async fn put_alias(&self, alias: &str, target: &str) -> Result<()> {
        bump(&self.calls.put_alias);
        self.inner.put_alias(alias, target).await
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>> {
        self.inner.resolve_alias(alias).await
    }

    async fn list_indices(&self) -> Result<Vec<String>> {
        self.inner.list_indices().await
    }

    async fn put_index_template(&self, name: &str, family: &str, body: &Value) -> Result<()> {
        self.inner.put_index_template(name, family, body).await
    }

    async fn search(&self, indexes: &[String], query: &Value) -> Result<Value> {
        self.inner.search(indexes, query).await
    }

    async fn count(&self, index: &str) -> Result<u64> {
        self.inner.count(index).await
    }

    async fn get_document(&self, index: &str, family: &str, id: &str) -> Result<Option<Value>> {
        self.inner.get_document(index, family, id).await
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.inner.refresh(index).await
    }
}

pub fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

pub fn ec2_report(account: &str, instance: &str, cost: f64) -> UsageRecord<Ec2InstanceReport> {
    UsageRecord::new(
        account,
        report_date(),
        ReportKind::Daily,
        instance,
        Ec2InstanceReport {
            region: "us-east-1".to_string(),
            instance_type: "t3.medium".to_string(),
            state: "running".to_string(),
            cpu_average: 12.5,
            cpu_peak: 80.0,
            network_in: 1024,
            network_out: 2048,
            cost,
            tags: vec![Tag::new("team", "billing"), Tag::new("team", "platform")],
        },
    )
}
