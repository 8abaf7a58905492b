//! mDNS browsing
//!
//! Browses one or more service types and reports `Up`/`Down` transitions.
//! An `Up` fires once per unique `(address, port)` pair; duplicates within
//! a session are suppressed, and the key is retired when the service goes
//! away.

use mdns_sd::{IfKind, ServiceDaemon, ServiceEvent};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{DiscoveryError, Result};

/// Transport protocol filter for browsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    fn label(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// A service seen on the network
#[derive(Debug, Clone)]
pub struct BrowsedService {
    /// Instance name
    pub name: String,
    /// Normalized base type, e.g. `oscjson`
    pub service_type: String,
    /// Qualified type, e.g. `oscjson._tcp.local`
    pub full_type: String,
    /// Hostname without the trailing dot
    pub host: String,
    pub address: IpAddr,
    pub port: u16,
    /// TXT record dictionary
    pub txt: HashMap<String, String>,
}

/// Browsing event stream items
#[derive(Debug, Clone)]
pub enum BrowseEvent {
    Up(BrowsedService),
    Down(BrowsedService),
    Error(String),
}

/// Accepts `"_http._tcp"`, `"oscjson"`, or `"http"` alike: a single
/// leading `_` and a trailing `._tcp` are stripped.
pub fn normalize_service_type(raw: &str) -> String {
    let s = raw.strip_prefix('_').unwrap_or(raw);
    let s = s.strip_suffix("._tcp").unwrap_or(s);
    s.to_string()
}

/// First non-loopback IPv4 whose literal is in a common LAN block, else
/// the first non-loopback IPv4.
pub(crate) fn primary_ipv4() -> Option<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs().ok()?;
    let candidates: Vec<Ipv4Addr> = interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .collect();

    candidates
        .iter()
        .copied()
        .find(|addr| {
            let literal = addr.to_string();
            literal.starts_with("192.168.") || literal.starts_with("10.")
        })
        .or_else(|| candidates.first().copied())
}

/// Browses mDNS for a set of service types
pub struct MdnsBrowser {
    daemon: ServiceDaemon,
    service_types: Vec<String>,
    protocol: Protocol,
}

impl MdnsBrowser {
    /// Browse the given types over TCP
    pub fn new<I, S>(service_types: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_protocol(service_types, Protocol::Tcp)
    }

    pub fn with_protocol<I, S>(service_types: I, protocol: Protocol) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

        // Bind to the primary interface where it is safe to do so. On
        // macOS the system responder owns the sockets, so never bind.
        if !cfg!(target_os = "macos") {
            if let Some(primary) = primary_ipv4() {
                debug!("binding mDNS session to {}", primary);
                let _ = daemon.disable_interface(IfKind::All);
                let _ = daemon.enable_interface(IfKind::Addr(IpAddr::V4(primary)));
            }
        }

        let service_types = service_types
            .into_iter()
            .map(|s| normalize_service_type(&s.into()))
            .collect();

        Ok(Self {
            daemon,
            service_types,
            protocol,
        })
    }

    /// Start a browser per service type; events from all of them arrive on
    /// the returned channel.
    pub fn start(&self) -> Result<mpsc::Receiver<BrowseEvent>> {
        let (tx, rx) = mpsc::channel(64);

        for base in &self.service_types {
            let qualified = format!("_{}._{}.local.", base, self.protocol.label());
            let receiver = self
                .daemon
                .browse(&qualified)
                .map_err(|e| DiscoveryError::Mdns(e.to_string()))?;
            info!("browsing for {}", qualified);

            let tx = tx.clone();
            let base = base.clone();
            let full_type = format!("{}._{}.local", base, self.protocol.label());
            let name_suffix = format!(".{}", qualified);

            tokio::spawn(async move {
                let mut seen: HashMap<(IpAddr, u16), BrowsedService> = HashMap::new();
                let mut by_fullname: HashMap<String, Vec<(IpAddr, u16)>> = HashMap::new();

                loop {
                    match receiver.recv_async().await {
                        Ok(ServiceEvent::ServiceResolved(info)) => {
                            let fullname = info.get_fullname().to_string();
                            let name = fullname
                                .strip_suffix(&name_suffix)
                                .unwrap_or(&fullname)
                                .to_string();
                            let port = info.get_port();
                            let txt: HashMap<String, String> = info
                                .get_properties()
                                .iter()
                                .map(|p| (p.key().to_string(), p.val_str().to_string()))
                                .collect();

                            for addr in info.get_addresses() {
                                let key = (*addr, port);
                                if seen.contains_key(&key) {
                                    continue;
                                }
                                let service = BrowsedService {
                                    name: name.clone(),
                                    service_type: base.clone(),
                                    full_type: full_type.clone(),
                                    host: info.get_hostname().trim_end_matches('.').to_string(),
                                    address: *addr,
                                    port,
                                    txt: txt.clone(),
                                };
                                debug!("service up: {} at {}:{}", name, addr, port);
                                seen.insert(key, service.clone());
                                by_fullname.entry(fullname.clone()).or_default().push(key);
                                if tx.send(BrowseEvent::Up(service)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Ok(ServiceEvent::ServiceRemoved(_, fullname)) => {
                            let Some(keys) = by_fullname.remove(&fullname) else {
                                continue;
                            };
                            for key in keys {
                                if let Some(service) = seen.remove(&key) {
                                    debug!("service down: {}", fullname);
                                    if tx.send(BrowseEvent::Down(service)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        Ok(ServiceEvent::SearchStopped(ty)) => {
                            debug!("search for {} stopped", ty);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("mDNS receive error: {}", e);
                            let _ = tx.send(BrowseEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                }
            });
        }

        Ok(rx)
    }

    /// Stop browsing and shut the daemon down
    pub fn shutdown(&self) {
        let _ = self.daemon.shutdown();
    }
}
