use std::fmt;
use std::future::Future;
use std::sync::Arc;
use serde::Serialize;
use tracing::{info, warn, Instrument};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::observability::ingest_span;
use crate::core::types::{DocumentFailure, UsageRecord};
use crate::parallel::cancel::CancelToken;
use crate::parallel::fan_in::{Combined, FanIn, Fanned, PartitionFailure, PartitionSink};
use crate::schema::template::IndexTemplate;
use crate::storage::engine::StorageEngine;
use crate::writer::bulk::{BulkSummary, BulkWriter};
use crate::writer::identity::record_identity;

/// Result of one collection run for one tenant and family.
#[derive(Debug)]
pub struct IngestReport {
    pub run_id: String,
    pub index: String,
    pub received: usize,
    pub written: BulkSummary,
    pub partition_failures: Vec<PartitionFailure>,
}

impl IngestReport {
    /// Every partition finished and every record was indexed.
    pub fn is_complete(&self) -> bool {
        self.partition_failures.is_empty() && self.written.is_clean()
    }
}

/// Collects records from every partition and writes them into the tenant's
/// index for `template`.
///
/// The combined output is drained by this task alone, through one
/// `BulkWriter` that is flushed and closed on every path. A failing partition
/// is reported and does not stop the others. After cancellation whatever
/// arrived is still flushed, then `Cancelled` is returned.
pub async fn ingest<Part, P, F, Fut>(
    engine: Arc<dyn StorageEngine>,
    user_id: u64,
    template: &IndexTemplate,
    partitions: Vec<Part>,
    producer: F,
    cancel: CancelToken,
    config: &Config,
) -> Result<IngestReport>
where
    Part: fmt::Display,
    P: Serialize + Send + 'static,
    F: Fn(Part, PartitionSink<UsageRecord<P>>) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let fan_in = FanIn::new(&config.fan_in)?;
    let run_id = fan_in.run_id().to_string();
    let span = ingest_span(&run_id, user_id, &template.family);

    async move {
        let mut report = IngestReport {
            run_id,
            index: template.index_name(user_id),
            received: 0,
            written: BulkSummary::default(),
            partition_failures: Vec::new(),
        };

        let mut writer = BulkWriter::acquire(engine, &config.bulk)?;
        let mut combined = fan_in.collect(partitions, producer, cancel);

        let drained = drain_into(&mut combined, &mut writer, template, &mut report, config.bulk.max_batch_docs).await;
        let flushed = match drained {
            Ok(cancelled) => writer.flush().await.map(|s| {
                report.written.absorb(s);
                cancelled
            }),
            Err(e) => Err(e),
        };
        let closed = writer.close().await;

        let cancelled = flushed?;
        closed?;

        for failure in &report.written.failures {
            warn!(index = %failure.index, id = %failure.id, reason = %failure.reason, "record not indexed");
        }
        info!(
            index = %report.index,
            received = report.received,
            indexed = report.written.indexed,
            failed_partitions = report.partition_failures.len(),
            "ingest run finished"
        );

        if cancelled {
            return Err(Error::cancelled(format!(
                "ingest into {} cancelled after {} records",
                report.index, report.received
            )));
        }
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Feeds the combined output into `writer`. Returns whether the run was cancelled.
async fn drain_into<P: Serialize>(
    combined: &mut Combined<UsageRecord<P>>,
    writer: &mut BulkWriter,
    template: &IndexTemplate,
    report: &mut IngestReport,
    max_batch_docs: usize,
) -> Result<bool> {
    let mut cancelled = false;
    while let Some(item) = combined.next().await {
        match item {
            Fanned::Record(record) => {
                report.received += 1;
                match record_identity(&record) {
                    Ok(id) => writer.add(&record, &template.family, &report.index, &id),
                    Err(e) => report.written.failures.push(DocumentFailure {
                        index: report.index.clone(),
                        id: record.resource_id.clone(),
                        reason: format!("identity failed: {}", e),
                    }),
                }
                if writer.pending() >= max_batch_docs {
                    let summary = writer.flush().await?;
                    report.written.absorb(summary);
                }
            }
            Fanned::Failed(failure) => report.partition_failures.push(failure),
            Fanned::Cancelled => cancelled = true,
        }
    }
    Ok(cancelled)
}
