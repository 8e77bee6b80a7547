use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

use super::http::HttpProbe;
use super::icmp::IcmpProbe;
use super::tcp::{Handshake, TcpProbe};
use super::udp::{DnsProbe, UdpProbe};
use super::{Probe, ServiceKind};
use crate::config::ProbeSettings;

/// Static mapping from service kind to probe implementation
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: HashMap<ServiceKind, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// Registry with nothing registered; every lookup fails closed
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry covering every probed kind
    pub fn standard(settings: &ProbeSettings) -> Result<Self> {
        let timeout = settings.timeout();
        let mut registry = Self::empty();

        registry
            .register(ServiceKind::Http, Arc::new(HttpProbe::new(timeout)?))
            .register(ServiceKind::Plex, Arc::new(HttpProbe::plex(timeout)?))
            .register(ServiceKind::Port, Arc::new(TcpProbe::port(timeout)))
            .register(ServiceKind::Ssh, Arc::new(TcpProbe::with_handshake(timeout, Handshake::Ssh)))
            .register(ServiceKind::Ftp, Arc::new(TcpProbe::with_handshake(timeout, Handshake::Ftp)))
            .register(
                ServiceKind::Syncthing,
                Arc::new(TcpProbe::with_handshake(timeout, Handshake::ConnectOnly)),
            )
            .register(ServiceKind::Dns, Arc::new(DnsProbe::new(timeout)))
            .register(ServiceKind::Wireguard, Arc::new(UdpProbe::new(timeout)))
            .register(ServiceKind::Udp, Arc::new(UdpProbe::new(timeout)))
            .register(ServiceKind::Host, Arc::new(IcmpProbe::new(timeout)));

        Ok(registry)
    }

    pub fn register(&mut self, kind: ServiceKind, probe: Arc<dyn Probe>) -> &mut Self {
        self.probes.insert(kind, probe);
        self
    }

    pub fn with(mut self, kind: ServiceKind, probe: Arc<dyn Probe>) -> Self {
        self.register(kind, probe);
        self
    }

    pub fn get(&self, kind: ServiceKind) -> Option<Arc<dyn Probe>> {
        self.probes.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ServiceKind) -> bool {
        self.probes.contains_key(&kind)
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.probes.keys().map(|kind| kind.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ProbeRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_every_probed_kind() {
        let registry = ProbeRegistry::standard(&ProbeSettings::default()).unwrap();

        for kind in ServiceKind::ALL {
            assert_eq!(registry.contains(kind), kind.is_probed(), "kind {kind}");
        }
    }

    #[test]
    fn test_empty_registry_has_no_probes() {
        let registry = ProbeRegistry::empty();
        assert!(registry.get(ServiceKind::Http).is_none());
    }
}
