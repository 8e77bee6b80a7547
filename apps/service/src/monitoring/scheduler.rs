use anyhow::{Result, anyhow};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

use super::engine::MonitoringEngine;
use super::runner::CheckRunner;
use super::types::{CheckOutcome, Transition};
use crate::config::{Config, ServiceConfig};
use crate::probes::{Probe, ProbeRegistry, ServiceKind};

/// Pause of the timer loop after a sweep task died
const LOOP_ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Summary of one completed sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub up: usize,
    pub down: usize,
    /// Instances without a probe target, e.g. redirects
    pub unprobed: usize,
    pub incidents_opened: usize,
    pub incidents_resolved: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was still in progress
    Skipped,
}

/// Stand-in for a kind the registry has no probe for; every attempt fails
struct Unregistered(ServiceKind);

#[async_trait::async_trait]
impl Probe for Unregistered {
    async fn probe(&self, _target: &str) -> Result<bool> {
        Err(anyhow!("no probe registered for kind `{}`", self.0))
    }
}

/// Drives sweeps over the configured services, one sweep at a time
#[derive(Debug, Clone)]
pub struct SweepScheduler {
    engine: Arc<MonitoringEngine>,
    probes: Arc<ProbeRegistry>,
    runner: CheckRunner,
    services: Arc<Vec<ServiceConfig>>,
    interval: Duration,
}

impl SweepScheduler {
    pub fn new(
        engine: Arc<MonitoringEngine>,
        probes: ProbeRegistry,
        runner: CheckRunner,
        services: Vec<ServiceConfig>,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            probes: Arc::new(probes),
            runner,
            services: Arc::new(services),
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Scheduler with the standard probe set, configured instances and interval
    pub fn from_config(engine: Arc<MonitoringEngine>, config: &Config) -> Result<Self> {
        let probes = ProbeRegistry::standard(&config.probes)?;
        Ok(Self::new(
            engine,
            probes,
            CheckRunner::from_settings(&config.probes),
            config.instances.clone(),
            Duration::from_secs(config.interval_seconds),
        ))
    }

    pub fn engine(&self) -> &Arc<MonitoringEngine> {
        &self.engine
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the timer loop. The first sweep starts immediately; ticks that
    /// elapse while a sweep is still running are dropped.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_loop().await })
    }

    async fn run_loop(self) {
        self.run_loop_with(|scheduler| async move { scheduler.run_sweep().await }).await
    }

    /// Timer loop around `sweep`. Each sweep runs in its own task; if that
    /// task dies the loop logs it, pauses and carries on with the next tick.
    async fn run_loop_with<F, Fut>(self, sweep: F)
    where
        F: Fn(SweepScheduler) -> Fut,
        Fut: Future<Output = SweepOutcome> + Send + 'static,
    {
        info!(
            "Sweeping {} instance(s) every {}s",
            self.services.len(),
            self.interval.as_secs()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let task = tokio::spawn(sweep(self.clone()));

            if let Err(e) = task.await {
                error!("Sweep loop error: {}, resuming in {:?}", e, LOOP_ERROR_PAUSE);
                sleep(LOOP_ERROR_PAUSE).await;
            }
        }
    }

    /// Check every probed service once, in configuration order
    pub async fn run_sweep(&self) -> SweepOutcome {
        let Some(_permit) = self.engine.try_begin_sweep() else {
            warn!("Previous sweep still running, skipping this tick");
            return SweepOutcome::Skipped;
        };

        let started = Instant::now();
        let mut report = SweepReport::default();

        for service in self.services.iter() {
            let Some(target) = service.probe_target() else {
                report.unprobed += 1;
                continue;
            };

            let outcome = self.check_service(service, target).await;
            let recorded = self.engine.record_outcome(&service.name, &outcome, Utc::now()).await;

            report.checked += 1;
            if outcome.alive {
                report.up += 1;
                info!(
                    "{}: UP (Response: {}ms)",
                    service.name,
                    outcome.avg_response_ms.unwrap_or_default()
                );
            } else {
                report.down += 1;
                warn!("{}: DOWN after {} consecutive failures", service.name, outcome.consecutive_failures);
            }

            match recorded.transition {
                Some(Transition::Opened(_)) => report.incidents_opened += 1,
                Some(Transition::Resolved(Some(_))) => report.incidents_resolved += 1,
                Some(Transition::Resolved(None)) | None => {}
            }
        }

        report.duration = started.elapsed();
        info!(
            "Sweep finished in {:?}: {} up, {} down, {} not probed",
            report.duration, report.up, report.down, report.unprobed
        );

        SweepOutcome::Completed(report)
    }

    /// Run one service's retried check in its own task. Probe panics are
    /// already absorbed per attempt; this boundary covers the rest.
    async fn check_service(&self, service: &ServiceConfig, target: &str) -> CheckOutcome {
        let probe: Arc<dyn Probe> = match self.probes.get(service.kind) {
            Some(probe) => probe,
            None => {
                debug!("{}: no probe for kind `{}`", service.name, service.kind);
                Arc::new(Unregistered(service.kind))
            }
        };

        let failures = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&failures);
        let runner = self.runner;
        let target = target.to_string();

        let check = tokio::spawn(async move { runner.run_tracked(&*probe, &target, &counter).await });

        match check.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let failed = failures.load(Ordering::Relaxed);
                error!("{}: check aborted: {}", service.name, e);
                CheckOutcome::down(None, failed, failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    /// Probe whose answer can be flipped between sweeps
    struct SwitchProbe {
        alive: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Probe for SwitchProbe {
        async fn probe(&self, _target: &str) -> Result<bool> {
            Ok(self.alive.load(Ordering::SeqCst))
        }
    }

    /// Fails once, then panics on every call
    struct PanickingProbe {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Probe for PanickingProbe {
        async fn probe(&self, _target: &str) -> Result<bool> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(false);
            }
            panic!("probe blew up");
        }
    }

    fn service(name: &str, kind: ServiceKind, target: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            kind,
            target: target.map(Into::into),
            host: None,
            category: "Test".into(),
            public_url: None,
            icon_url: None,
        }
    }

    fn scheduler(probes: ProbeRegistry, services: Vec<ServiceConfig>) -> SweepScheduler {
        SweepScheduler::new(
            Arc::new(MonitoringEngine::new()),
            probes,
            CheckRunner::new(3, Duration::from_millis(100)),
            services,
            Duration::from_secs(60),
        )
    }

    fn completed(outcome: SweepOutcome) -> SweepReport {
        match outcome {
            SweepOutcome::Completed(report) => report,
            SweepOutcome::Skipped => panic!("sweep was skipped"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_checks_probed_services_only() {
        let probe = Arc::new(SwitchProbe { alive: AtomicBool::new(true) });
        let scheduler = scheduler(
            ProbeRegistry::empty().with(ServiceKind::Port, probe),
            vec![
                service("b", ServiceKind::Port, Some("10.0.0.2:80")),
                service("wiki", ServiceKind::Redirect, Some("https://wiki")),
                service("a", ServiceKind::Port, Some("10.0.0.1:80")),
                service("no-target", ServiceKind::Port, None),
            ],
        );

        let report = completed(scheduler.run_sweep().await);

        assert_eq!(report.checked, 2);
        assert_eq!(report.up, 2);
        assert_eq!(report.unprobed, 2);
        let names: Vec<_> =
            scheduler.engine().service_snapshots().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!scheduler.engine().is_sweep_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_is_skipped_while_another_runs() {
        let scheduler = scheduler(ProbeRegistry::empty(), vec![]);

        let _permit = scheduler.engine().try_begin_sweep().unwrap();

        assert_eq!(scheduler.run_sweep().await, SweepOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_open_and_resolve_incidents() {
        let probe = Arc::new(SwitchProbe { alive: AtomicBool::new(true) });
        let scheduler = scheduler(
            ProbeRegistry::empty().with(ServiceKind::Ssh, probe.clone()),
            vec![service("nas", ServiceKind::Ssh, Some("10.0.0.5:22"))],
        );

        let first = completed(scheduler.run_sweep().await);
        assert_eq!((first.incidents_opened, first.incidents_resolved), (0, 0));

        probe.alive.store(false, Ordering::SeqCst);
        let second = completed(scheduler.run_sweep().await);
        assert_eq!(second.down, 1);
        assert_eq!(second.incidents_opened, 1);
        assert!(scheduler.engine().open_incident("nas").await.is_some());

        probe.alive.store(true, Ordering::SeqCst);
        let third = completed(scheduler.run_sweep().await);
        assert_eq!(third.incidents_resolved, 1);
        assert!(scheduler.engine().open_incident("nas").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_probe_fails_closed() {
        let scheduler =
            scheduler(ProbeRegistry::empty(), vec![service("dns", ServiceKind::Dns, Some("10.0.0.1"))]);

        let report = completed(scheduler.run_sweep().await);

        assert_eq!(report.down, 1);
        let latest = scheduler.engine().latest("dns").await.unwrap();
        assert!(!latest.alive);
        assert_eq!(latest.consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_check_is_recorded_down_and_sweep_continues() {
        let panicking = Arc::new(PanickingProbe { calls: AtomicU32::new(0) });
        let healthy = Arc::new(SwitchProbe { alive: AtomicBool::new(true) });
        let scheduler = scheduler(
            ProbeRegistry::empty()
                .with(ServiceKind::Udp, panicking)
                .with(ServiceKind::Port, healthy),
            vec![
                service("flaky", ServiceKind::Udp, Some("10.0.0.9:9")),
                service("steady", ServiceKind::Port, Some("10.0.0.1:80")),
            ],
        );

        let report = completed(scheduler.run_sweep().await);

        assert_eq!((report.checked, report.up, report.down), (2, 1, 1));
        let flaky = scheduler.engine().latest("flaky").await.unwrap();
        assert!(!flaky.alive);
        assert_eq!(flaky.consecutive_failures, 3, "panicking attempts count as failures");
        assert!(scheduler.engine().latest("steady").await.unwrap().alive);
        assert!(!scheduler.engine().is_sweep_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_first_sweep_immediately() {
        let probe = Arc::new(SwitchProbe { alive: AtomicBool::new(true) });
        let scheduler = scheduler(
            ProbeRegistry::empty().with(ServiceKind::Port, probe),
            vec![service("a", ServiceKind::Port, Some("10.0.0.1:80"))],
        );

        let handle = scheduler.start();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.engine().observation_windows().await["a"].len(), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(scheduler.engine().observation_windows().await["a"].len(), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_a_dead_sweep_and_pauses() {
        let scheduler = SweepScheduler::new(
            Arc::new(MonitoringEngine::new()),
            ProbeRegistry::empty(),
            CheckRunner::new(1, Duration::ZERO),
            vec![],
            Duration::from_secs(2),
        );
        let started = Instant::now();
        let sweeps: Arc<std::sync::Mutex<Vec<Duration>>> = Arc::default();

        let log = Arc::clone(&sweeps);
        let handle = tokio::spawn(scheduler.clone().run_loop_with(move |scheduler| {
            let log = Arc::clone(&log);
            async move {
                let count = {
                    let mut log = log.lock().unwrap();
                    log.push(started.elapsed());
                    log.len()
                };
                if count == 1 {
                    panic!("sweep task died");
                }
                scheduler.run_sweep().await
            }
        }));

        // ticks due at 2s and 4s fall inside the 5s pause
        sleep(Duration::from_millis(4500)).await;
        assert_eq!(sweeps.lock().unwrap().len(), 1);
        assert!(!handle.is_finished());

        sleep(Duration::from_secs(1)).await;
        let seen = sweeps.lock().unwrap().clone();
        assert_eq!(seen.len(), 2, "the loop resumed after the pause");
        assert!(seen[1] >= Duration::from_secs(5), "resumed during the pause at {:?}", seen[1]);
        assert!(seen[1] < Duration::from_millis(5500));
        assert!(!scheduler.engine().is_sweep_running());

        handle.abort();
    }
}
