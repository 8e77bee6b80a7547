use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use super::types::CheckOutcome;
use crate::config::ProbeSettings;
use crate::probes::Probe;

/// Extra time granted on top of the probe's own timeout before an attempt is abandoned
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

/// Runs one probe with bounded retries and folds the attempts into a single outcome
#[derive(Debug, Clone, Copy)]
pub struct CheckRunner {
    max_attempts: u32,
    retry_delay: Duration,
    attempt_deadline: Option<Duration>,
}

impl Default for CheckRunner {
    fn default() -> Self {
        Self::from_settings(&ProbeSettings::default())
    }
}

impl CheckRunner {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self { max_attempts, retry_delay, attempt_deadline: None }
    }

    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.max_attempts, settings.retry_delay())
            .with_attempt_deadline(settings.timeout() + DEADLINE_GRACE)
    }

    /// Hard upper bound for a single probe call
    pub fn with_attempt_deadline(mut self, deadline: Duration) -> Self {
        self.attempt_deadline = Some(deadline);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check `target` with up to `max_attempts` probe calls
    pub async fn run(&self, probe: &dyn Probe, target: &str) -> CheckOutcome {
        self.run_tracked(probe, target, &AtomicU32::new(0)).await
    }

    /// Like [`run`](Self::run), publishing the failure count after every
    /// failed attempt so a supervisor can still read it if the check dies
    pub async fn run_tracked(
        &self,
        probe: &dyn Probe,
        target: &str,
        failures: &AtomicU32,
    ) -> CheckOutcome {
        let mut total_response_ms: u64 = 0;
        let mut completed: u32 = 0;

        for attempt in 1..=self.max_attempts {
            let start = Instant::now();
            // a panicking attempt is just another failed attempt
            let attempt_fut = AssertUnwindSafe(probe.probe(target)).catch_unwind().map(|caught| {
                caught.unwrap_or_else(|payload| {
                    Err(anyhow::anyhow!("attempt panicked: {}", panic_message(payload.as_ref())))
                })
            });
            let result = match self.attempt_deadline {
                Some(deadline) => timeout(deadline, attempt_fut)
                    .await
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("probe exceeded {:?}", deadline))),
                None => attempt_fut.await,
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            total_response_ms += elapsed_ms;
            completed += 1;

            match result {
                Ok(true) => return CheckOutcome::up(total_response_ms / u64::from(completed), completed),
                Ok(false) => debug!("{} reported down (attempt {}/{})", target, attempt, self.max_attempts),
                Err(e) => debug!(
                    "Error checking {} (attempt {}/{}): {:#}",
                    target, attempt, self.max_attempts, e
                ),
            }

            failures.fetch_add(1, Ordering::Relaxed);

            if attempt < self.max_attempts {
                sleep(self.retry_delay).await;
            }
        }

        let avg_response_ms = (completed > 0).then(|| total_response_ms / u64::from(completed));
        CheckOutcome::down(avg_response_ms, failures.load(Ordering::Relaxed), completed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
