use std::sync::Arc;
use serde::Serialize;
use tracing::{debug, warn};
use crate::core::config::BulkConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocumentFailure, StoredDocument};
use crate::storage::engine::{BulkItem, StorageEngine};

/// Scoped batching writer for bulk operations.
///
/// `add` only buffers. Nothing reaches the engine before `flush`, and `close`
/// refuses to discard documents that were never flushed. Exclusive borrows
/// keep a writer owned by a single task.
pub struct BulkWriter {
    engine: Arc<dyn StorageEngine>,
    buffer: Vec<BulkItem>,
    rejected: Vec<DocumentFailure>,  // Serialization failures, reported by the next flush
    max_batch_docs: usize,
    closed: bool,
}

/// What one `flush` achieved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    pub indexed: usize,
    pub requests: usize,
    pub failures: Vec<DocumentFailure>,
}

impl BulkSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn absorb(&mut self, other: BulkSummary) {
        self.indexed += other.indexed;
        self.requests += other.requests;
        self.failures.extend(other.failures);
    }
}

impl BulkWriter {
    pub fn acquire(engine: Arc<dyn StorageEngine>, config: &BulkConfig) -> Result<Self> {
        if config.max_batch_docs == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "bulk writer needs a batch size of at least 1".to_string(),
            ));
        }
        Ok(BulkWriter {
            engine,
            buffer: Vec::with_capacity(config.max_batch_docs),
            rejected: Vec::new(),
            max_batch_docs: config.max_batch_docs,
            closed: false,
        })
    }

    /// Buffers `document` for `index` under `id`.
    pub fn add<D: Serialize + ?Sized>(&mut self, document: &D, family: &str, index: &str, id: &str) {
        match serde_json::to_value(document) {
            Ok(body) => self.buffer.push(BulkItem {
                index: index.to_string(),
                family: family.to_string(),
                id: id.to_string(),
                body,
            }),
            Err(e) => self.rejected.push(DocumentFailure {
                index: index.to_string(),
                id: id.to_string(),
                reason: format!("serialization failed: {}", e),
            }),
        }
    }

    pub fn add_document<B: Serialize>(&mut self, document: &StoredDocument<B>) {
        self.add(&document.body, &document.family, &document.index, &document.id);
    }

    /// Documents buffered and not yet sent.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Serialization failures not yet returned by a successful flush.
    pub fn unreported_failures(&self) -> usize {
        self.rejected.len()
    }

    /// Sends every buffered document, in requests of at most `max_batch_docs`.
    ///
    /// A transport failure stops the flush and leaves the unsent documents
    /// and the serialization failures with the writer. Per-document
    /// rejections do not stop it and are listed in the summary.
    pub async fn flush(&mut self) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();

        while !self.buffer.is_empty() {
            let n = self.buffer.len().min(self.max_batch_docs);
            let response = self.engine.bulk_write(&self.buffer[..n]).await?;
            self.buffer.drain(..n);

            summary.requests += 1;
            summary.indexed += response.indexed;
            summary.failures.extend(response.failures);
        }
        summary.failures.append(&mut self.rejected);

        debug!(
            indexed = summary.indexed,
            requests = summary.requests,
            failed = summary.failures.len(),
            "bulk flush done"
        );
        Ok(summary)
    }

    /// Releases the writer. Fails when documents are still buffered, since
    /// they would otherwise be lost silently.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let unsent = self.buffer.len();
        let unreported = self.rejected.len();
        if unsent + unreported > 0 {
            self.buffer.clear();
            let ids: Vec<String> = self.rejected.drain(..).map(|f| f.id).collect();
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!(
                    "bulk writer closed with {} unflushed documents and {} unreported serialization failures {:?}",
                    unsent, unreported, ids
                ),
            ));
        }
        Ok(())
    }
}

impl Drop for BulkWriter {
    fn drop(&mut self) {
        if !self.closed && !self.buffer.is_empty() {
            warn!(documents = self.buffer.len(), "bulk writer dropped without flush, documents lost");
        }
    }
}
