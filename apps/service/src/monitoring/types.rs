use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a monitored service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
}

impl ServiceStatus {
    pub fn from_alive(alive: bool) -> Self {
        if alive { ServiceStatus::Up } else { ServiceStatus::Down }
    }

    pub fn is_up(self) -> bool {
        self == ServiceStatus::Up
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Up => write!(f, "up"),
            ServiceStatus::Down => write!(f, "down"),
        }
    }
}

/// Result of one retried check, as produced by the check runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub alive: bool,
    /// Mean latency over every attempt made, `None` if no attempt completed
    pub avg_response_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub attempts: u32,
}

impl CheckOutcome {
    pub fn up(avg_response_ms: u64, attempts: u32) -> Self {
        Self { alive: true, avg_response_ms: Some(avg_response_ms), consecutive_failures: 0, attempts }
    }

    pub fn down(avg_response_ms: Option<u64>, consecutive_failures: u32, attempts: u32) -> Self {
        Self { alive: false, avg_response_ms, consecutive_failures, attempts }
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::from_alive(self.alive)
    }
}

/// One recorded check of one service. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub service_name: String,
    pub alive: bool,
    pub timestamp: DateTime<Utc>,
    pub avg_response_ms: Option<u64>,
    pub consecutive_failures: u32,
}

impl Observation {
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::from_alive(self.alive)
    }
}

/// A down period of one service, open until the service is seen up again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeIncident {
    pub id: Uuid,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub resolved: bool,
}

impl DowntimeIncident {
    pub fn open(service_name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_name: service_name.into(),
            start_time,
            end_time: None,
            duration_minutes: None,
            resolved: false,
        }
    }

    /// Close the incident; duration is whole minutes, rounded down
    pub fn resolve(&mut self, end_time: DateTime<Utc>) {
        let elapsed_secs = (end_time - self.start_time).num_seconds().max(0);
        self.end_time = Some(end_time);
        self.duration_minutes = Some(elapsed_secs / 60);
        self.resolved = true;
    }
}

/// Incident state change caused by recording an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The service went down; carries the new incident
    Opened(DowntimeIncident),
    /// The service came back; carries the closed incident, if one was still tracked
    Resolved(Option<DowntimeIncident>),
}

/// Point-in-time view of one service for the query API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub status: ServiceStatus,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: Option<u64>,
    pub last_check: DateTime<Utc>,
    pub consecutive_failures: u32,
    /// Start of the current unbroken run of `status`, bounded by the window
    pub status_since: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ServiceStatus::Up).unwrap(), "\"up\"");
        assert_eq!(ServiceStatus::Down.to_string(), "down");
    }

    #[test]
    fn test_outcome_constructors() {
        let up = CheckOutcome::up(42, 2);
        assert_eq!(up.status(), ServiceStatus::Up);
        assert_eq!(up.consecutive_failures, 0);

        let down = CheckOutcome::down(None, 3, 3);
        assert_eq!(down.status(), ServiceStatus::Down);
        assert_eq!(down.avg_response_ms, None);
    }

    #[test]
    fn test_incident_duration_rounds_down() {
        let start = Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap();
        let mut incident = DowntimeIncident::open("plex", start);
        assert!(!incident.resolved);

        incident.resolve(start + Duration::seconds(185));

        assert!(incident.resolved);
        assert_eq!(incident.duration_minutes, Some(3));
        assert_eq!(incident.end_time, Some(start + Duration::seconds(185)));
    }

    #[test]
    fn test_incident_duration_never_negative() {
        let start = Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap();
        let mut incident = DowntimeIncident::open("plex", start);

        incident.resolve(start - Duration::seconds(30));

        assert_eq!(incident.duration_minutes, Some(0));
    }
}
