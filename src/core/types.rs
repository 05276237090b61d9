use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use chrono::NaiveDate;
use crate::core::error::{Error, ErrorKind, Result};

/// Granularity of a usage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Daily,
    Monthly,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Daily => "daily",
            ReportKind::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(ReportKind::Daily),
            "monthly" => Ok(ReportKind::Monthly),
            other => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("unknown report kind '{}'", other),
            )),
        }
    }
}

/// Resource tag. Kept as an ordered key/value list at the storage boundary,
/// duplicates included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag { key: key.into(), value: value.into() }
    }
}

/// Tenant-scoped fact emitted by a collector. The payload is flattened into
/// the stored document body next to the identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord<P> {
    #[serde(rename = "account")]
    pub tenant_account_id: String,
    #[serde(rename = "reportDate")]
    pub report_date: NaiveDate,
    #[serde(rename = "reportType")]
    pub report_kind: ReportKind,
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> UsageRecord<P> {
    pub fn new(
        tenant_account_id: impl Into<String>,
        report_date: NaiveDate,
        report_kind: ReportKind,
        resource_id: impl Into<String>,
        payload: P,
    ) -> Self {
        UsageRecord {
            tenant_account_id: tenant_account_id.into(),
            report_date,
            report_kind,
            resource_id: resource_id.into(),
            payload,
        }
    }
}

/// A record addressed for the storage engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument<B> {
    pub id: String,
    pub index: String,
    pub family: String,
    pub body: B,
}

/// Outcome of one bulk request, as reported by the storage engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub indexed: usize,
    pub failures: Vec<DocumentFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    pub index: String,
    pub id: String,
    pub reason: String,
}
