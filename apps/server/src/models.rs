use chrono::{DateTime, Utc};
use homewatch_service::config::ServiceConfig;
use homewatch_service::monitoring::{DowntimeIncident, Observation, ServiceSnapshot};
use homewatch_service::probes::ServiceKind;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services_tracked: usize,
    pub sweep_running: bool,
}

/// One configured instance as shown on the dashboard: the latest engine
/// state, if any, merged with its config metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    /// `up`/`down` once checked, otherwise `unknown` or `redirect`
    pub status: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub response_time: Option<u64>,
    pub last_check: Option<DateTime<Utc>>,
    pub consecutive_failures: Option<u32>,
    pub status_since: Option<DateTime<Utc>>,
    pub category: String,
    pub public_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub host: Option<String>,
    pub ping_url: Option<String>,
    pub icon_url: Option<String>,
}

impl ServiceEntry {
    pub fn new(instance: &ServiceConfig, snapshot: Option<&ServiceSnapshot>) -> Self {
        let status = match snapshot {
            Some(snapshot) => snapshot.status.to_string(),
            None if instance.kind == ServiceKind::Redirect => "redirect".into(),
            None => "unknown".into(),
        };

        Self {
            name: instance.name.clone(),
            status,
            timestamp: snapshot.map(|s| s.timestamp),
            response_time: snapshot.and_then(|s| s.response_time_ms),
            last_check: snapshot.map(|s| s.last_check),
            consecutive_failures: snapshot.map(|s| s.consecutive_failures),
            status_since: snapshot.map(|s| s.status_since),
            category: instance.category.clone(),
            public_url: instance.public_url.clone(),
            kind: instance.kind,
            host: instance.host.clone(),
            ping_url: instance.target.clone(),
            icon_url: instance.icon_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceEntry>,
    pub downtime_events: Vec<DowntimeIncident>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub name: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub response_time: Option<u64>,
}

impl From<Observation> for HistoryEntry {
    fn from(observation: Observation) -> Self {
        Self {
            status: observation.status().to_string(),
            name: observation.service_name,
            timestamp: observation.timestamp,
            response_time: observation.avg_response_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
    pub downtime_events: Vec<DowntimeIncident>,
}
