use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::store::{ObservationStore, WINDOW_CAPACITY};
use super::tracker::{DowntimeTracker, INCIDENT_CAPACITY};
use super::types::{CheckOutcome, DowntimeIncident, Observation, ServiceSnapshot, Transition};

/// State mutated together; kept behind one lock so readers never see an
/// observation without its incident transition
#[derive(Debug)]
struct EngineState {
    observations: ObservationStore,
    downtime: DowntimeTracker,
}

/// What recording one check produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheck {
    pub observation: Observation,
    pub transition: Option<Transition>,
}

/// Held for the duration of a sweep; dropping it (also while unwinding)
/// lets the next sweep start
#[derive(Debug)]
pub struct SweepPermit<'a> {
    running: &'a AtomicBool,
}

impl Drop for SweepPermit<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// All in-memory monitoring state of the process.
///
/// Written only by the scheduler's active sweep, read by the query API
/// through cloned snapshots. Nothing survives a restart.
#[derive(Debug)]
pub struct MonitoringEngine {
    state: RwLock<EngineState>,
    sweep_running: AtomicBool,
}

impl Default for MonitoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringEngine {
    pub fn new() -> Self {
        Self::with_capacities(WINDOW_CAPACITY, INCIDENT_CAPACITY)
    }

    pub fn with_capacities(window_capacity: usize, incident_capacity: usize) -> Self {
        Self {
            state: RwLock::new(EngineState {
                observations: ObservationStore::with_capacity(window_capacity),
                downtime: DowntimeTracker::with_capacity(incident_capacity),
            }),
            sweep_running: AtomicBool::new(false),
        }
    }

    /// Claim the single sweep slot, `None` while another sweep holds it
    pub fn try_begin_sweep(&self) -> Option<SweepPermit<'_>> {
        self.sweep_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepPermit { running: &self.sweep_running })
    }

    pub fn is_sweep_running(&self) -> bool {
        self.sweep_running.load(Ordering::Acquire)
    }

    /// Append the observation for `service_name` and apply the incident
    /// transition against the service's previous observation, atomically
    pub async fn record_outcome(
        &self,
        service_name: &str,
        outcome: &CheckOutcome,
        now: DateTime<Utc>,
    ) -> RecordedCheck {
        let mut state = self.state.write().await;

        let previous_alive = state.observations.latest(service_name).map(|previous| previous.alive);
        let observation = state.observations.record(
            service_name,
            outcome.alive,
            outcome.avg_response_ms,
            outcome.consecutive_failures,
            now,
        );
        let transition = state.downtime.observe(service_name, previous_alive, outcome.alive, now);

        RecordedCheck { observation, transition }
    }

    /// Latest state of every service checked at least once, ordered by name
    pub async fn service_snapshots(&self) -> Vec<ServiceSnapshot> {
        let state = self.state.read().await;
        state
            .observations
            .service_names()
            .filter_map(|name| snapshot_of(&state.observations, name))
            .collect()
    }

    pub async fn snapshot(&self, service_name: &str) -> Option<ServiceSnapshot> {
        let state = self.state.read().await;
        snapshot_of(&state.observations, service_name)
    }

    /// Incidents started within the last `window_hours`, newest first
    pub async fn recent_downtime_events(&self, window_hours: u32) -> Vec<DowntimeIncident> {
        self.recent_downtime_events_at(Utc::now(), window_hours).await
    }

    pub async fn recent_downtime_events_at(
        &self,
        now: DateTime<Utc>,
        window_hours: u32,
    ) -> Vec<DowntimeIncident> {
        let cutoff = now - Duration::hours(i64::from(window_hours));
        self.state.read().await.downtime.recent_since(cutoff)
    }

    /// Observations of all services within the last `window_hours`, newest first
    pub async fn history(&self, window_hours: u32) -> Vec<Observation> {
        self.history_at(Utc::now(), window_hours).await
    }

    pub async fn history_at(&self, now: DateTime<Utc>, window_hours: u32) -> Vec<Observation> {
        let cutoff = now - Duration::hours(i64::from(window_hours));
        self.state.read().await.observations.history_since(cutoff)
    }

    /// Copy of every observation window
    pub async fn observation_windows(&self) -> BTreeMap<String, Vec<Observation>> {
        self.state.read().await.observations.all()
    }

    pub async fn latest(&self, service_name: &str) -> Option<Observation> {
        self.state.read().await.observations.latest(service_name).cloned()
    }

    pub async fn open_incident(&self, service_name: &str) -> Option<DowntimeIncident> {
        self.state.read().await.downtime.open_incident(service_name).cloned()
    }

    /// Number of services with at least one observation
    pub async fn tracked_services(&self) -> usize {
        self.state.read().await.observations.len()
    }
}

fn snapshot_of(observations: &ObservationStore, service_name: &str) -> Option<ServiceSnapshot> {
    let latest = observations.latest(service_name)?;
    let status = latest.status();
    let status_since = observations.status_since(service_name, status).unwrap_or(latest.timestamp);

    Some(ServiceSnapshot {
        name: latest.service_name.clone(),
        status,
        timestamp: latest.timestamp,
        response_time_ms: latest.avg_response_ms,
        last_check: latest.timestamp,
        consecutive_failures: latest.consecutive_failures,
        status_since,
    })
}
