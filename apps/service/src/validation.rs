//! Load-time validation of monitor settings and targets.
//!
//! Everything here runs once while the configuration is read, so a bad entry
//! stops startup instead of showing up as a permanently "down" service.

use anyhow::{Result, anyhow};
use url::Url;

use crate::probes::ServiceKind;
use crate::probes::target::{host_only, parse_host_port, parse_host_with_default_port};

/// Validates a probe target based on the kind that will consume it
pub fn validate_service_target(kind: ServiceKind, target: &str) -> Result<()> {
    match kind {
        ServiceKind::Http | ServiceKind::Plex => validate_http_target(target),
        ServiceKind::Port
        | ServiceKind::Ssh
        | ServiceKind::Ftp
        | ServiceKind::Wireguard
        | ServiceKind::Udp
        | ServiceKind::Syncthing => parse_host_port(target).map(|_| ()),
        ServiceKind::Dns => parse_host_with_default_port(target, 53).map(|_| ()),
        ServiceKind::Host => validate_host_target(target),
        ServiceKind::Redirect => Ok(()),
    }
}

/// Validate HTTP/HTTPS target
fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL {}: {}", target, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP monitor: {}", other)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL has no host: {}", target));
    }

    Ok(())
}

fn validate_host_target(target: &str) -> Result<()> {
    let host = host_only(target)?;
    if host.starts_with('-') || host.contains(char::is_whitespace) {
        return Err(anyhow!("Invalid host name: {}", host));
    }
    Ok(())
}

/// Validate sweep interval
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    const MIN_INTERVAL: u64 = 1;
    const MAX_INTERVAL: u64 = 86400; // 24 hours

    if interval_seconds < MIN_INTERVAL {
        return Err(anyhow!(
            "Check interval too short: {} seconds (minimum: {})",
            interval_seconds,
            MIN_INTERVAL
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Check interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate per-attempt probe timeout
pub fn validate_timeout(timeout_ms: u64) -> Result<()> {
    const MIN_TIMEOUT: u64 = 100;
    const MAX_TIMEOUT: u64 = 60_000;

    if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout_ms) {
        return Err(anyhow!(
            "Probe timeout out of range: {} ms (allowed: {}..={})",
            timeout_ms,
            MIN_TIMEOUT,
            MAX_TIMEOUT
        ));
    }

    Ok(())
}

pub fn validate_max_attempts(max_attempts: u32) -> Result<()> {
    const MAX_ATTEMPTS: u32 = 10;

    if !(1..=MAX_ATTEMPTS).contains(&max_attempts) {
        return Err(anyhow!(
            "max_attempts out of range: {} (allowed: 1..={})",
            max_attempts,
            MAX_ATTEMPTS
        ));
    }

    Ok(())
}

pub fn validate_retry_delay(retry_delay_ms: u64) -> Result<()> {
    const MAX_RETRY_DELAY: u64 = 60_000;

    if retry_delay_ms > MAX_RETRY_DELAY {
        return Err(anyhow!(
            "Retry delay too long: {} ms (maximum: {})",
            retry_delay_ms,
            MAX_RETRY_DELAY
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_target() {
        assert!(validate_service_target(ServiceKind::Http, "https://example.com").is_ok());
        assert!(validate_service_target(ServiceKind::Plex, "http://10.0.0.5:32400/identity").is_ok());

        assert!(validate_service_target(ServiceKind::Http, "ftp://example.com").is_err());
        assert!(validate_service_target(ServiceKind::Http, "example.com").is_err());
    }

    #[test]
    fn test_validate_port_targets() {
        assert!(validate_service_target(ServiceKind::Port, "example.com:80").is_ok());
        assert!(validate_service_target(ServiceKind::Ssh, "10.0.0.2:22").is_ok());
        assert!(validate_service_target(ServiceKind::Wireguard, "vpn.example.com:51820").is_ok());

        assert!(validate_service_target(ServiceKind::Ssh, "10.0.0.2").is_err());
        assert!(validate_service_target(ServiceKind::Udp, "10.0.0.2:").is_err());
    }

    #[test]
    fn test_validate_dns_and_host_targets() {
        assert!(validate_service_target(ServiceKind::Dns, "1.1.1.1").is_ok());
        assert!(validate_service_target(ServiceKind::Dns, "1.1.1.1:5353").is_ok());
        assert!(validate_service_target(ServiceKind::Host, "router.lan").is_ok());

        assert!(validate_service_target(ServiceKind::Host, "-c 100").is_err());
        assert!(validate_service_target(ServiceKind::Host, "").is_err());
    }

    #[test]
    fn test_validate_check_interval() {
        assert!(validate_check_interval(1).is_ok()); // Min
        assert!(validate_check_interval(60).is_ok()); // Normal
        assert!(validate_check_interval(86400).is_ok()); // Max

        assert!(validate_check_interval(0).is_err());
        assert!(validate_check_interval(100000).is_err());
    }

    #[test]
    fn test_validate_probe_settings() {
        assert!(validate_timeout(2000).is_ok());
        assert!(validate_timeout(50).is_err());
        assert!(validate_timeout(120_000).is_err());

        assert!(validate_max_attempts(3).is_ok());
        assert!(validate_max_attempts(0).is_err());
        assert!(validate_max_attempts(11).is_err());

        assert!(validate_retry_delay(0).is_ok());
        assert!(validate_retry_delay(60_001).is_err());
    }
}
