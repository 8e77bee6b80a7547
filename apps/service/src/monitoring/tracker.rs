//! Downtime incident tracking.
//!
//! Per service the tracker is a two-state machine, `no-incident` and `open`,
//! driven by comparing the previous observation with the current one:
//!
//! | previous | current | effect                                  |
//! |----------|---------|-----------------------------------------|
//! | up       | down    | open a new incident                     |
//! | down     | up      | resolve the newest open incident        |
//! | none     | any     | nothing, a first check is no transition |
//! | same     | same    | nothing                                 |
//!
//! Incidents of all services share one bounded list; the oldest entry is
//! evicted first whether or not it was resolved.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{info, warn};

use super::types::{DowntimeIncident, Transition};

/// Incidents retained across all services
pub const INCIDENT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct DowntimeTracker {
    incidents: VecDeque<DowntimeIncident>,
    capacity: usize,
}

impl Default for DowntimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DowntimeTracker {
    pub fn new() -> Self {
        Self::with_capacity(INCIDENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { incidents: VecDeque::with_capacity(capacity.max(1)), capacity: capacity.max(1) }
    }

    /// Feed one check result; `previous_alive` is the alive flag of the
    /// service's previous observation, if there was one
    pub fn observe(
        &mut self,
        service_name: &str,
        previous_alive: Option<bool>,
        alive: bool,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        match (previous_alive, alive) {
            (Some(true), false) => {
                let incident = self.open(service_name, now);
                warn!("{} went DOWN at {}", service_name, now);
                Some(Transition::Opened(incident))
            }
            (Some(false), true) => {
                let resolved = self.resolve(service_name, now);
                match &resolved {
                    Some(incident) => info!(
                        "{} came back UP at {} after {} minute(s)",
                        service_name,
                        now,
                        incident.duration_minutes.unwrap_or_default()
                    ),
                    None => warn!(
                        "{} came back UP at {} but its incident is no longer tracked",
                        service_name, now
                    ),
                }
                Some(Transition::Resolved(resolved))
            }
            _ => None,
        }
    }

    fn open(&mut self, service_name: &str, now: DateTime<Utc>) -> DowntimeIncident {
        let incident = DowntimeIncident::open(service_name, now);
        self.incidents.push_back(incident.clone());
        while self.incidents.len() > self.capacity {
            self.incidents.pop_front();
        }
        incident
    }

    /// Close the most recently opened unresolved incident of `service_name`.
    /// Older unresolved ones for the same service, which should not exist,
    /// are left untouched.
    fn resolve(&mut self, service_name: &str, now: DateTime<Utc>) -> Option<DowntimeIncident> {
        let incident = self
            .incidents
            .iter_mut()
            .rev()
            .find(|incident| incident.service_name == service_name && !incident.resolved)?;
        incident.resolve(now);
        Some(incident.clone())
    }

    /// The unresolved incident of a service, if it is currently down
    pub fn open_incident(&self, service_name: &str) -> Option<&DowntimeIncident> {
        self.incidents
            .iter()
            .rev()
            .find(|incident| incident.service_name == service_name && !incident.resolved)
    }

    /// Incidents that started at or after `cutoff`, newest first
    pub fn recent_since(&self, cutoff: DateTime<Utc>) -> Vec<DowntimeIncident> {
        let mut recent: Vec<DowntimeIncident> = self
            .incidents
            .iter()
            .filter(|incident| incident.start_time >= cutoff)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        recent
    }

    /// Every retained incident, oldest first
    pub fn incidents(&self) -> Vec<DowntimeIncident> {
        self.incidents.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_up_down_down_up_yields_one_resolved_incident() {
        let mut tracker = DowntimeTracker::new();
        let down_at = t0() + Duration::seconds(60);
        let up_at = down_at + Duration::seconds(185);

        assert_eq!(tracker.observe("plex", None, true, t0()), None);
        assert!(matches!(tracker.observe("plex", Some(true), false, down_at), Some(Transition::Opened(_))));
        assert_eq!(tracker.observe("plex", Some(false), false, down_at + Duration::seconds(60)), None);
        let resolved = tracker.observe("plex", Some(false), true, up_at);

        let incidents = tracker.incidents();
        assert_eq!(incidents.len(), 1);
        let incident = &incidents[0];
        assert!(incident.resolved);
        assert_eq!(incident.start_time, down_at);
        assert_eq!(incident.end_time, Some(up_at));
        assert_eq!(incident.duration_minutes, Some(3));
        assert_eq!(resolved, Some(Transition::Resolved(Some(incident.clone()))));
    }

    #[test]
    fn test_first_check_is_never_a_transition() {
        let mut tracker = DowntimeTracker::new();

        assert_eq!(tracker.observe("nas", None, false, t0()), None);
        assert_eq!(tracker.observe("nas", Some(false), false, t0() + Duration::minutes(1)), None);

        assert!(tracker.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest_regardless_of_state() {
        let mut tracker = DowntimeTracker::new();
        for i in 0..INCIDENT_CAPACITY as i64 {
            let name = format!("svc-{i}");
            tracker.observe(&name, Some(true), false, t0() + Duration::minutes(i));
        }
        tracker.observe("svc-1", Some(false), true, t0() + Duration::hours(5));
        assert_eq!(tracker.len(), INCIDENT_CAPACITY);

        tracker.observe("late", Some(true), false, t0() + Duration::hours(6));

        let incidents = tracker.incidents();
        assert_eq!(incidents.len(), INCIDENT_CAPACITY);
        assert_eq!(incidents[0].service_name, "svc-1", "svc-0 was evicted while still open");
        assert!(incidents[0].resolved);
        assert_eq!(incidents.last().unwrap().service_name, "late");
    }

    #[test]
    fn test_resolution_is_scoped_to_the_service() {
        let mut tracker = DowntimeTracker::new();
        tracker.observe("a", Some(true), false, t0());
        tracker.observe("b", Some(true), false, t0() + Duration::minutes(1));

        tracker.observe("a", Some(false), true, t0() + Duration::minutes(10));

        assert!(tracker.open_incident("a").is_none());
        let b = tracker.open_incident("b").unwrap();
        assert!(!b.resolved);
        assert_eq!(b.start_time, t0() + Duration::minutes(1));
    }

    #[test]
    fn test_duplicate_open_incidents_close_newest_only() {
        let mut tracker = DowntimeTracker::new();
        tracker.observe("a", Some(true), false, t0());
        tracker.observe("a", Some(true), false, t0() + Duration::minutes(5));

        tracker.observe("a", Some(false), true, t0() + Duration::minutes(7));

        let incidents = tracker.incidents();
        assert!(!incidents[0].resolved);
        assert!(incidents[1].resolved);
        assert_eq!(incidents[1].duration_minutes, Some(2));
    }

    #[test]
    fn test_recovery_without_tracked_incident() {
        let mut tracker = DowntimeTracker::new();
        assert_eq!(tracker.observe("a", Some(false), true, t0()), Some(Transition::Resolved(None)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_recent_since_filters_and_orders() {
        let mut tracker = DowntimeTracker::new();
        tracker.observe("a", Some(true), false, t0());
        tracker.observe("b", Some(true), false, t0() + Duration::hours(2));
        tracker.observe("c", Some(true), false, t0() + Duration::hours(3));

        let recent: Vec<_> = tracker
            .recent_since(t0() + Duration::hours(1))
            .into_iter()
            .map(|incident| incident.service_name)
            .collect();

        assert_eq!(recent, vec!["c", "b"]);
    }
}
