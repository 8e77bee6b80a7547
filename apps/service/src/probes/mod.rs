/// Protocol-specific liveness probes
///
/// Every probe answers one question for a target string: is the service alive?
/// The engine drives them uniformly through the [`Probe`] trait and never
/// inspects which protocol sits behind it.
pub mod http;
pub mod icmp;
pub mod registry;
pub mod target;
pub mod tcp;
pub mod udp;

pub use registry::ProbeRegistry;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Kind of service, selects which probe is invoked for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceKind {
    Http,
    Plex,
    Port,
    Ssh,
    Ftp,
    Dns,
    Wireguard,
    Udp,
    Syncthing,
    Host,
    /// Link-only entry, never probed
    Redirect,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 11] = [
        ServiceKind::Http,
        ServiceKind::Plex,
        ServiceKind::Port,
        ServiceKind::Ssh,
        ServiceKind::Ftp,
        ServiceKind::Dns,
        ServiceKind::Wireguard,
        ServiceKind::Udp,
        ServiceKind::Syncthing,
        ServiceKind::Host,
        ServiceKind::Redirect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Http => "http",
            ServiceKind::Plex => "plex",
            ServiceKind::Port => "port",
            ServiceKind::Ssh => "ssh",
            ServiceKind::Ftp => "ftp",
            ServiceKind::Dns => "dns",
            ServiceKind::Wireguard => "wireguard",
            ServiceKind::Udp => "udp",
            ServiceKind::Syncthing => "syncthing",
            ServiceKind::Host => "host",
            ServiceKind::Redirect => "redirect",
        }
    }

    /// Whether instances of this kind are checked by the scheduler at all
    pub fn is_probed(self) -> bool {
        !matches!(self, ServiceKind::Redirect)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a configured kind is not part of the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service kind `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for ServiceKind {
    type Err = UnknownKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let kind = match raw.trim().to_ascii_lowercase().as_str() {
            "http" | "https" | "autobrr" | "flaresolverr" | "nginx" | "overseerr"
            | "prowlarr" | "qbit" | "radarr" | "sonarr" | "tautulli" => ServiceKind::Http,
            "plex" => ServiceKind::Plex,
            "port" | "tcp" => ServiceKind::Port,
            "ssh" => ServiceKind::Ssh,
            "ftp" => ServiceKind::Ftp,
            "dns" => ServiceKind::Dns,
            "wireguard" => ServiceKind::Wireguard,
            "udp" => ServiceKind::Udp,
            "syncthing" => ServiceKind::Syncthing,
            "host" | "icmp" | "ping" => ServiceKind::Host,
            "redirect" => ServiceKind::Redirect,
            _ => return Err(UnknownKind(raw.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ServiceKind {
    type Error = UnknownKind;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<ServiceKind> for String {
    fn from(kind: ServiceKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Liveness check for one protocol family
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Probe `target` once.
    ///
    /// `Ok(true)` means alive, `Ok(false)` means reachable but not healthy.
    /// An `Err` is an attempt that could not complete; callers treat both
    /// `Ok(false)` and `Err` as one failed attempt.
    async fn probe(&self, target: &str) -> Result<bool>;
}

/// Substring search on raw protocol bytes
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
