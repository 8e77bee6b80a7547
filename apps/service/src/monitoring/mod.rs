pub mod engine;
/// Monitoring engine module - turns probe results into service state
///
/// This module is responsible for:
/// - Running retried checks through a probe
/// - Keeping a rolling window of observations per service
/// - Opening and resolving downtime incidents
/// - Scheduling sweeps, never more than one at a time
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod tracker;
pub mod types;


pub use engine::{MonitoringEngine, RecordedCheck};
pub use runner::CheckRunner;
pub use scheduler::{SweepOutcome, SweepReport, SweepScheduler};
pub use types::{CheckOutcome, DowntimeIncident, Observation, ServiceSnapshot, ServiceStatus, Transition};
