use serde::{Serialize, Deserialize};
use crate::core::types::Tag;

/// EC2 instance usage for one report period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ec2InstanceReport {
    pub region: String,
    pub instance_type: String,
    pub state: String,
    pub cpu_average: f64,
    pub cpu_peak: f64,
    pub network_in: u64,
    pub network_out: u64,
    pub cost: f64,
    pub tags: Vec<Tag>,
}

/// RDS instance usage for one report period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdsInstanceReport {
    pub region: String,
    pub db_instance_class: String,
    pub engine: String,
    pub multi_az: bool,
    pub allocated_storage: u64,
    pub cpu_average: f64,
    pub cpu_peak: f64,
    pub free_space_minimum: f64,
    pub cost: f64,
    pub tags: Vec<Tag>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ReportKind, UsageRecord};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn payload_is_flattened_next_to_identity_fields() {
        let record = UsageRecord::new(
            "123456789012",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ReportKind::Monthly,
            "db-primary",
            RdsInstanceReport {
                region: "eu-west-1".to_string(),
                db_instance_class: "db.r5.large".to_string(),
                engine: "postgres".to_string(),
                multi_az: true,
                allocated_storage: 500,
                cpu_average: 31.0,
                cpu_peak: 92.5,
                free_space_minimum: 120.0,
                cost: 410.75,
                tags: vec![Tag::new("env", "prod"), Tag::new("env", "dr")],
            },
        );

        let body = serde_json::to_value(&record).unwrap();
        assert_eq!(body["account"], json!("123456789012"));
        assert_eq!(body["reportDate"], json!("2024-03-01"));
        assert_eq!(body["reportType"], json!("monthly"));
        assert_eq!(body["dbInstanceClass"], json!("db.r5.large"));
        assert_eq!(body["multiAz"], json!(true));
        // Duplicate keys keep their order.
        assert_eq!(
            body["tags"],
            json!([{"key": "env", "value": "prod"}, {"key": "env", "value": "dr"}])
        );

        let back: UsageRecord<RdsInstanceReport> = serde_json::from_value(body).unwrap();
        assert_eq!(back, record);
    }
}
