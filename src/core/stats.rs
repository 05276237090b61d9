use std::time::SystemTime;
use serde::{Serialize, Deserialize};

/// Snapshot of what the storage layer knows about its indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub uptime_secs: u64,
    pub start_time: SystemTime,

    // Templates
    pub templates: usize,
    pub unversioned_templates: usize,  // Version could not be extracted, excluded from migration

    // Registry
    pub registered_indices: usize,
    pub outdated_indices: usize,
}

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: SystemTime,
}

impl HealthCheckResult {
    /// Overall status is the worst of the individual checks.
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|c| &c.status)
            .find(|s| matches!(s, HealthStatus::Unhealthy(_)))
            .or_else(|| checks.iter().map(|c| &c.status).find(|s| !s.is_healthy()))
            .cloned()
            .unwrap_or(HealthStatus::Healthy);

        HealthCheckResult {
            status,
            checks,
            timestamp: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub latency_ms: u64,
}
