use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::timeout;
use tracing::debug;

use super::Probe;
use super::target::{parse_host_port, parse_host_with_default_port};

pub(crate) const DNS_QUERY_ID: u16 = 0x1234;
pub(crate) const DNS_QUERY_NAME: &str = "example.com";
const DATAGRAM_PROBE: [u8; 64] = [0u8; 64];

/// Build a recursive A/IN query for `name`
pub(crate) fn build_dns_query(id: u16, name: &str) -> Vec<u8> {
    let mut query = Vec::with_capacity(18 + name.len());
    query.extend_from_slice(&id.to_be_bytes());
    query.extend_from_slice(&0x0100u16.to_be_bytes());
    query.extend_from_slice(&1u16.to_be_bytes());
    query.extend_from_slice(&[0u8; 6]);

    for label in name.split('.').filter(|label| !label.is_empty()) {
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0);

    query.extend_from_slice(&1u16.to_be_bytes());
    query.extend_from_slice(&1u16.to_be_bytes());
    query
}

fn is_dns_response(reply: &[u8], id: u16) -> bool {
    reply.len() >= 12 && u16::from_be_bytes([reply[0], reply[1]]) == id && reply[2] & 0x80 != 0
}

/// UDP socket connected to the first resolved address of `host:port`
///
/// Connecting lets the kernel report ICMP port-unreachable back as a
/// receive error.
async fn connected_socket(host: &str, port: u16) -> Result<UdpSocket> {
    let addr = lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}:{}", host, port))?;

    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(addr).await?;
    Ok(socket)
}

/// Datagram probe for WireGuard and other UDP services
///
/// Most UDP services stay silent for junk input, so silence until the timeout
/// counts as alive. Only an explicit rejection marks the port dead.
pub struct UdpProbe {
    timeout_duration: Duration,
}

impl UdpProbe {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl Probe for UdpProbe {
    async fn probe(&self, target: &str) -> Result<bool> {
        let (host, port) = parse_host_port(target)?;
        let socket = connected_socket(&host, port).await?;

        socket
            .send(&DATAGRAM_PROBE)
            .await
            .map_err(|e| anyhow!("UDP send to {}:{} failed: {}", host, port, e))?;

        let mut buf = [0u8; 1024];
        match timeout(self.timeout_duration, socket.recv(&mut buf)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => Err(anyhow!("UDP port check to {}:{} failed: {}", host, port, e)),
            Err(_) => {
                debug!("{}:{} stayed silent, treating as listening", host, port);
                Ok(true)
            }
        }
    }
}

/// DNS resolver probe, sends one A query over UDP (port 53 unless given)
pub struct DnsProbe {
    timeout_duration: Duration,
}

impl DnsProbe {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl Probe for DnsProbe {
    async fn probe(&self, target: &str) -> Result<bool> {
        let (host, port) = parse_host_with_default_port(target, 53)?;
        let socket = connected_socket(&host, port).await?;

        let query = build_dns_query(DNS_QUERY_ID, DNS_QUERY_NAME);
        socket.send(&query).await?;

        let answer = async {
            let mut buf = [0u8; 512];
            loop {
                let read = socket.recv(&mut buf).await?;
                if is_dns_response(&buf[..read], DNS_QUERY_ID) {
                    return Ok::<_, std::io::Error>(());
                }
            }
        };

        match timeout(self.timeout_duration, answer).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(anyhow!("DNS query to {}:{} failed: {}", host, port, e)),
            Err(_) => {
                debug!("DNS server {}:{} did not answer in time", host, port);
                Ok(false)
            }
        }
    }
}
