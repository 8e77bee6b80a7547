//! Parsing of the loosely formatted target strings found in configs.
//!
//! Targets are written by hand, so `http://nas:22`, `nas:22` and `[fd00::2]:22`
//! all need to resolve to the same host/port pair.

use anyhow::{Result, anyhow};

/// Drop a leading `http://` or `https://`
pub fn strip_scheme(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
        .unwrap_or(raw)
}

/// Parse `host:port`, tolerating a scheme prefix, a trailing path and IPv6 brackets
pub fn parse_host_port(raw: &str) -> Result<(String, u16)> {
    let authority = authority(raw);

    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Invalid target format: {raw}. Expected hostname:port or ip:port"))?;

    let host = trim_brackets(host);
    if host.is_empty() {
        return Err(anyhow!("Missing host in target: {raw}"));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| anyhow!("Invalid port number in target {raw}: {port}"))?;
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid: {raw}"));
    }

    Ok((host.to_string(), port))
}

/// Parse `host[:port]`, falling back to `default_port`
pub fn parse_host_with_default_port(raw: &str, default_port: u16) -> Result<(String, u16)> {
    let authority = authority(raw);
    if is_bare_host(authority) {
        let host = trim_brackets(authority);
        if host.is_empty() {
            return Err(anyhow!("Missing host in target: {raw}"));
        }
        return Ok((host.to_string(), default_port));
    }
    parse_host_port(raw)
}

/// Host part only, for probes that do not use a port (ping)
pub fn host_only(raw: &str) -> Result<String> {
    let authority = authority(raw);
    let host = if is_bare_host(authority) {
        trim_brackets(authority)
    } else {
        let (host, _) = authority.rsplit_once(':').unwrap_or((authority, ""));
        trim_brackets(host)
    };

    if host.is_empty() {
        return Err(anyhow!("Missing host in target: {raw}"));
    }
    Ok(host.to_string())
}

fn authority(raw: &str) -> &str {
    let rest = strip_scheme(raw);
    rest.split('/').next().unwrap_or(rest)
}

/// True when the authority carries no port: plain names, IPv4 literals,
/// bracketed IPv6 without a port and unbracketed IPv6 literals
fn is_bare_host(authority: &str) -> bool {
    if authority.starts_with('[') {
        return authority.ends_with(']');
    }
    authority.matches(':').count() != 1
}

fn trim_brackets(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}
