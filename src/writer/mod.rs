pub mod bulk;
pub mod identity;
pub mod ingest;

pub use bulk::{BulkSummary, BulkWriter};
pub use identity::{identity, record_identity};
pub use ingest::{ingest, IngestReport};
