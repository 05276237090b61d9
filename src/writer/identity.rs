use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::NaiveDate;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;
use crate::core::error::Result;
use crate::core::types::{ReportKind, UsageRecord};

/// The only fields that take part in a document id, in their canonical order.
#[derive(Serialize)]
struct IdentityKey<'a> {
    account: &'a str,
    #[serde(rename = "reportDate")]
    report_date: String,
    id: &'a str,
    #[serde(rename = "reportType")]
    report_type: ReportKind,
}

/// Deterministic document id for a report entry.
///
/// The same four inputs give the same 22-character URL-safe id in every
/// process; volatile payload fields never take part.
pub fn identity(
    tenant_account_id: &str,
    report_date: NaiveDate,
    resource_id: &str,
    report_kind: ReportKind,
) -> Result<String> {
    let key = IdentityKey {
        account: tenant_account_id,
        report_date: report_date.format("%Y-%m-%d").to_string(),
        id: resource_id,
        report_type: report_kind,
    };
    let canonical = serde_json::to_vec(&key)?;
    let digest = xxh3_128(&canonical);
    Ok(URL_SAFE_NO_PAD.encode(digest.to_be_bytes()))
}

pub fn record_identity<P>(record: &UsageRecord<P>) -> Result<String> {
    identity(
        &record.tenant_account_id,
        record.report_date,
        &record.resource_id,
        record.report_kind,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn identity_is_stable() {
        let a = identity("42", date("2024-03-01"), "i-0abc", ReportKind::Daily).unwrap();
        let b = identity("42", date("2024-03-01"), "i-0abc", ReportKind::Daily).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 22);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn every_field_changes_the_id() {
        let base = identity("42", date("2024-03-01"), "i-0abc", ReportKind::Daily).unwrap();
        let variants = [
            identity("43", date("2024-03-01"), "i-0abc", ReportKind::Daily).unwrap(),
            identity("42", date("2024-03-02"), "i-0abc", ReportKind::Daily).unwrap(),
            identity("42", date("2024-03-01"), "i-0abd", ReportKind::Daily).unwrap(),
            identity("42", date("2024-03-01"), "i-0abc", ReportKind::Monthly).unwrap(),
        ];
        for variant in variants {
            assert_ne!(base, variant);
        }
    }

    #[test]
    fn field_boundaries_are_not_ambiguous() {
        let a = identity("4", date("2024-03-01"), "2i-0abc", ReportKind::Daily).unwrap();
        let b = identity("42", date("2024-03-01"), "i-0abc", ReportKind::Daily).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn no_collisions_in_sample() {
        let mut seen = HashSet::new();
        let start = date("2024-01-01");
        for tenant in 0..20 {
            for day in 0..30 {
                for resource in 0..10 {
                    let id = identity(
                        &format!("{:012}", tenant),
                        start + chrono::Days::new(day),
                        &format!("i-{:08x}", resource),
                        ReportKind::Daily,
                    )
                    .unwrap();
                    assert!(seen.insert(id));
                }
            }
        }
        assert_eq!(seen.len(), 20 * 30 * 10);
    }

    #[test]
    fn payload_does_not_affect_record_identity() {
        let first = UsageRecord::new("42", date("2024-03-01"), ReportKind::Daily, "i-0abc", 10.0);
        let second = UsageRecord::new("42", date("2024-03-01"), ReportKind::Daily, "i-0abc", 99.0);
        assert_eq!(record_identity(&first).unwrap(), record_identity(&second).unwrap());
    }
}
