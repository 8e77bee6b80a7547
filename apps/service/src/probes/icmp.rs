use anyhow::{Result, anyhow};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use super::Probe;
use super::target::host_only;

/// ICMP host probe
///
/// Raw sockets need elevated privileges, so this shells out to the system
/// `ping` with a single echo request instead. `ping` waits one second for
/// the reply; the configured timeout only bounds the process as a whole.
pub struct IcmpProbe {
    timeout_duration: Duration,
}

impl IcmpProbe {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }

    fn command(&self, host: &str) -> Command {
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            cmd.args(["-n", "1", "-w", "1000"]);
        } else {
            cmd.args(["-c", "1", "-W", "1"]);
        }
        cmd.arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl Probe for IcmpProbe {
    async fn probe(&self, target: &str) -> Result<bool> {
        let host = host_only(target)?;
        if host.starts_with('-') {
            return Err(anyhow!("Refusing to ping suspicious host: {}", host));
        }

        // configured timeout plus a second for process startup
        let deadline = self.timeout_duration.max(Duration::from_secs(1)) + Duration::from_secs(1);
        let status = timeout(deadline, self.command(&host).status())
            .await
            .map_err(|_| anyhow!("Ping timeout for {}", host))?
            .map_err(|e| anyhow!("Failed to run ping: {}", e))?;

        Ok(status.success())
    }
}
