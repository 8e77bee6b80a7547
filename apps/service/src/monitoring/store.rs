//! Rolling per-service window of recent observations.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};

use super::types::{Observation, ServiceStatus};

/// Observations retained per service
pub const WINDOW_CAPACITY: usize = 50;

/// Fixed-capacity FIFO window per service, newest observation last
#[derive(Debug, Clone)]
pub struct ObservationStore {
    windows: BTreeMap<String, VecDeque<Observation>>,
    capacity: usize,
}

impl Default for ObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { windows: BTreeMap::new(), capacity: capacity.max(1) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an observation, evicting the oldest one once the window is full
    pub fn record(
        &mut self,
        service_name: &str,
        alive: bool,
        avg_response_ms: Option<u64>,
        consecutive_failures: u32,
        timestamp: DateTime<Utc>,
    ) -> Observation {
        let observation = Observation {
            service_name: service_name.to_string(),
            alive,
            timestamp,
            avg_response_ms,
            consecutive_failures,
        };

        let window = self
            .windows
            .entry(service_name.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        while window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(observation.clone());

        observation
    }

    /// Most recent observation, `None` if the service was never checked
    pub fn latest(&self, service_name: &str) -> Option<&Observation> {
        self.windows.get(service_name).and_then(VecDeque::back)
    }

    /// Timestamp of the oldest observation in the unbroken run of `status`
    /// that ends with the newest observation.
    ///
    /// When the whole window has the same status the true start lies beyond
    /// the retention horizon and the oldest retained timestamp is returned.
    /// `None` if the newest observation does not carry `status`.
    pub fn status_since(&self, service_name: &str, status: ServiceStatus) -> Option<DateTime<Utc>> {
        self.windows
            .get(service_name)?
            .iter()
            .rev()
            .take_while(|observation| observation.status() == status)
            .last()
            .map(|observation| observation.timestamp)
    }

    pub fn window(&self, service_name: &str) -> Option<Vec<Observation>> {
        self.windows.get(service_name).map(|window| window.iter().cloned().collect())
    }

    /// Copy of every window, keyed by service name
    pub fn all(&self) -> BTreeMap<String, Vec<Observation>> {
        self.windows
            .iter()
            .map(|(name, window)| (name.clone(), window.iter().cloned().collect()))
            .collect()
    }

    /// Observations at or after `cutoff` across all services, newest first
    pub fn history_since(&self, cutoff: DateTime<Utc>) -> Vec<Observation> {
        let mut history: Vec<Observation> = self
            .windows
            .values()
            .flat_map(|window| window.iter().filter(|observation| observation.timestamp >= cutoff))
            .cloned()
            .collect();
        history.sort_by(|a, b| {
            b.timestamp.cmp(&a.timestamp).then_with(|| a.service_name.cmp(&b.service_name))
        });
        history
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 14, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn record_run(store: &mut ObservationStore, name: &str, statuses: &[bool], start_minute: i64) {
        for (offset, alive) in statuses.iter().enumerate() {
            store.record(name, *alive, Some(10), u32::from(!alive) * 3, t(start_minute + offset as i64));
        }
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut store = ObservationStore::new();
        for minute in 0..120 {
            store.record("plex", minute % 7 != 0, Some(5), 0, t(minute));
            assert!(store.window("plex").unwrap().len() <= WINDOW_CAPACITY);
        }

        let window = store.window("plex").unwrap();
        assert_eq!(window.len(), WINDOW_CAPACITY);
        let timestamps: Vec<_> = window.iter().map(|o| o.timestamp).collect();
        let expected: Vec<_> = (70..120).map(t).collect();
        assert_eq!(timestamps, expected, "exactly the 50 most recent, oldest first");
    }

    #[test]
    fn test_record_returns_observation_and_updates_latest() {
        let mut store = ObservationStore::new();
        assert!(store.latest("nas").is_none());

        let created = store.record("nas", false, None, 3, t(0));

        assert_eq!(created.service_name, "nas");
        assert_eq!(created.consecutive_failures, 3);
        assert_eq!(store.latest("nas"), Some(&created));
    }

    #[test]
    fn test_windows_are_per_service() {
        let mut store = ObservationStore::with_capacity(2);
        record_run(&mut store, "a", &[true, true, true], 0);
        record_run(&mut store, "b", &[false], 0);

        assert_eq!(store.window("a").unwrap().len(), 2);
        assert_eq!(store.window("b").unwrap().len(), 1);
        assert_eq!(store.service_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_status_since_returns_start_of_current_run() {
        let mut store = ObservationStore::new();
        record_run(&mut store, "plex", &[false, false, false, true, true, true, true, true], 0);

        assert_eq!(store.status_since("plex", ServiceStatus::Up), Some(t(3)));
    }

    #[test]
    fn test_status_since_falls_back_to_oldest_retained() {
        let mut store = ObservationStore::with_capacity(5);
        record_run(&mut store, "plex", &[true; 9], 0);

        assert_eq!(store.status_since("plex", ServiceStatus::Up), Some(t(4)));
    }

    #[test]
    fn test_status_since_with_mismatched_newest_is_none() {
        let mut store = ObservationStore::new();
        record_run(&mut store, "plex", &[true, false], 0);

        assert_eq!(store.status_since("plex", ServiceStatus::Up), None);
        assert_eq!(store.status_since("plex", ServiceStatus::Down), Some(t(1)));
        assert_eq!(store.status_since("unknown", ServiceStatus::Up), None);
    }

    #[test]
    fn test_history_since_is_newest_first_and_filtered() {
        let mut store = ObservationStore::new();
        record_run(&mut store, "a", &[true, true, true], 0);
        record_run(&mut store, "b", &[false, false], 1);

        let history = store.history_since(t(1));
        let keys: Vec<_> = history.iter().map(|o| (o.service_name.as_str(), o.timestamp)).collect();

        assert_eq!(keys, vec![("a", t(2)), ("b", t(2)), ("a", t(1)), ("b", t(1))]);
    }

    #[test]
    fn test_all_is_a_detached_copy() {
        let mut store = ObservationStore::new();
        record_run(&mut store, "a", &[true], 0);

        let snapshot = store.all();
        record_run(&mut store, "a", &[false], 1);

        assert_eq!(snapshot["a"].len(), 1);
        assert_eq!(store.window("a").unwrap().len(), 2);
    }
}
