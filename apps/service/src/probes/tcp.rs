use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::target::parse_host_port;
use super::{Probe, contains, udp};

const HEAD_REQUEST: &[u8] = b"HEAD / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
const GET_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
const NULL_PROBE: &[u8] = &[0, 0, 0, 0];
const GENERIC_REPLY_WAIT: Duration = Duration::from_secs(1);

/// What to exchange with a service once the TCP connection is up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// `HEAD /` answered with 200, 403 or 404
    Http,
    /// `GET /` answered with anything HTTP
    HttpAny,
    Ssh,
    Ftp,
    Smtp,
    Imap,
    Pop3,
    /// DNS query over TCP answered with any bytes
    Dns,
    ConnectOnly,
    /// Null probe; any reply or silence counts, EOF does not
    Generic,
}

impl Handshake {
    /// Heuristic for well-known ports
    pub fn for_port(port: u16) -> Self {
        match port {
            80 | 8080 | 3000 | 5000 | 8000 | 9000 => Handshake::Http,
            22 => Handshake::Ssh,
            21 => Handshake::Ftp,
            25 => Handshake::Smtp,
            143 => Handshake::Imap,
            110 => Handshake::Pop3,
            53 => Handshake::Dns,
            51820 => Handshake::ConnectOnly,
            22067 => Handshake::HttpAny,
            _ => Handshake::Generic,
        }
    }

    async fn verify(self, stream: &mut TcpStream, wait: Duration) -> Result<bool> {
        let alive = match self {
            Handshake::ConnectOnly => true,
            Handshake::Http => {
                stream.write_all(HEAD_REQUEST).await?;
                let reply = read_reply(stream, wait).await;
                contains(&reply, b"HTTP/")
                    && [b"200", b"404", b"403"].iter().any(|code| contains(&reply, *code))
            }
            Handshake::HttpAny => {
                stream.write_all(GET_REQUEST).await?;
                contains(&read_reply(stream, wait).await, b"HTTP/")
            }
            Handshake::Ssh => contains(&read_reply(stream, wait).await, b"SSH"),
            Handshake::Ftp => {
                let banner = read_reply(stream, wait).await;
                contains(&banner, b"220") && contains(&banner, b"FTP")
            }
            Handshake::Smtp => {
                let banner = read_reply(stream, wait).await;
                contains(&banner, b"220") && contains(&banner, b"SMTP")
            }
            Handshake::Imap => {
                let banner = read_reply(stream, wait).await;
                contains(&banner, b"* OK") || contains(&banner, b"* PREAUTH")
            }
            Handshake::Pop3 => contains(&read_reply(stream, wait).await, b"+OK"),
            Handshake::Dns => {
                let query = udp::build_dns_query(udp::DNS_QUERY_ID, udp::DNS_QUERY_NAME);
                let mut framed = (query.len() as u16).to_be_bytes().to_vec();
                framed.extend_from_slice(&query);
                stream.write_all(&framed).await?;
                !read_reply(stream, wait).await.is_empty()
            }
            Handshake::Generic => {
                if let Err(e) = stream.write_all(NULL_PROBE).await {
                    debug!("Generic probe write failed: {}", e);
                    return Ok(false);
                }
                let mut buf = [0u8; 1024];
                match timeout(wait.min(GENERIC_REPLY_WAIT), stream.read(&mut buf)).await {
                    // silent services (game servers, custom protocols) are still listening
                    Err(_) => true,
                    Ok(Ok(read)) => read > 0,
                    Ok(Err(e)) => {
                        debug!("Generic probe read failed: {}", e);
                        false
                    }
                }
            }
        };
        Ok(alive)
    }
}

/// Read whatever the peer sends first; empty on timeout, EOF or error
async fn read_reply(stream: &mut TcpStream, wait: Duration) -> Vec<u8> {
    let mut buf = vec![0u8; 1024];
    match timeout(wait, stream.read(&mut buf)).await {
        Ok(Ok(read)) => {
            buf.truncate(read);
            buf
        }
        Ok(Err(e)) => {
            debug!("Reading service reply failed: {}", e);
            Vec::new()
        }
        Err(_) => Vec::new(),
    }
}

/// TCP port probe
///
/// Connects to `host:port` and then runs a [`Handshake`], either a fixed one
/// or the heuristic for the target's port.
pub struct TcpProbe {
    timeout_duration: Duration,
    handshake: Option<Handshake>,
}

impl TcpProbe {
    /// Handshake picked from the target's port
    pub fn port(timeout_duration: Duration) -> Self {
        Self { timeout_duration, handshake: None }
    }

    pub fn with_handshake(timeout_duration: Duration, handshake: Handshake) -> Self {
        Self { timeout_duration, handshake: Some(handshake) }
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, target: &str) -> Result<bool> {
        let (host, port) = parse_host_port(target)?;

        let mut stream = timeout(self.timeout_duration, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| anyhow!("TCP connection timeout"))?
            .map_err(|e| anyhow!("TCP connection to {}:{} failed: {}", host, port, e))?;

        let handshake = self.handshake.unwrap_or_else(|| Handshake::for_port(port));
        handshake.verify(&mut stream, self.timeout_duration).await
    }
}
