//! OSCQuery discovery client
//!
//! Composes mDNS browsing with HTTP ingestion: each `_oscjson._tcp`
//! service that comes up is fetched (`GET /` for the tree, `GET /?HOST_INFO`
//! for host metadata) and deserialized into an immutable [`Node`] snapshot.
//! The snapshot is rebuilt wholesale by [`DiscoveredService::update`].

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use oscquery_core::{HostInfo, Node, SerializedNode};

use crate::browse::{BrowseEvent, BrowsedService, MdnsBrowser};
use crate::error::{DiscoveryError, Result};

/// An OSCQuery server found on the network
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    pub name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    /// Host metadata from the last successful fetch
    pub host_info: Option<HostInfo>,
    /// Tree snapshot from the last successful fetch
    pub nodes: Node,
}

impl DiscoveredService {
    pub fn new(name: impl Into<String>, address: Ipv4Addr, port: u16) -> Self {
        Self {
            name: name.into(),
            address,
            port,
            host_info: None,
            nodes: Node::root(),
        }
    }

    /// Build from a browse result; only IPv4 services can be queried.
    pub fn from_browsed(service: &BrowsedService) -> Result<Self> {
        match service.address {
            IpAddr::V4(address) => Ok(Self::new(service.name.clone(), address, service.port)),
            IpAddr::V6(_) => Err(DiscoveryError::AddressFamilyUnsupported),
        }
    }

    /// Root URL of the remote query server
    pub fn root_url(&self) -> String {
        format!("http://{}:{}/", self.address, self.port)
    }

    /// Refetch the remote tree and HOST_INFO, replacing the snapshot.
    pub async fn update(&mut self, http: &reqwest::Client) -> Result<()> {
        let url = self.root_url();

        let serialized: SerializedNode = http.get(&url).send().await?.json().await?;
        self.nodes = Node::from_serialized("", &serialized);

        let host_info: HostInfo = http
            .get(format!("{}?HOST_INFO", url))
            .send()
            .await?
            .json()
            .await?;
        self.host_info = Some(host_info);

        debug!("updated tree snapshot from {}", url);
        Ok(())
    }

    /// Resolve a path in the tree snapshot
    pub fn resolve_path(&self, path: &str) -> Option<&Node> {
        self.nodes.resolve(path)
    }
}

/// Discovery event stream items
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Service appeared and its tree was fetched
    Up(DiscoveredService),
    /// Service went away
    Down(DiscoveredService),
    /// Browsing or fetching failed
    Error(String),
}

/// Tracks OSCQuery servers on the LAN
pub struct OscQueryDiscovery {
    http: reqwest::Client,
    browser: MdnsBrowser,
    services: Arc<RwLock<HashMap<(Ipv4Addr, u16), DiscoveredService>>>,
}

impl OscQueryDiscovery {
    /// Browse for the standard `_oscjson._tcp` type
    pub fn new() -> Result<Self> {
        Self::with_service_types(["oscjson"])
    }

    /// Browse for additional service types (normalized per
    /// [`crate::normalize_service_type`])
    pub fn with_service_types<I, S>(service_types: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            http: reqwest::Client::new(),
            browser: MdnsBrowser::new(service_types)?,
            services: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Start browsing. Each service that comes up is fetched before an
    /// `Up` event is emitted; fetch failures surface as `Error` events.
    pub fn start(&self) -> Result<mpsc::Receiver<DiscoveryEvent>> {
        let mut browse_rx = self.browser.start()?;
        let (tx, rx) = mpsc::channel(32);
        let http = self.http.clone();
        let services = Arc::clone(&self.services);

        tokio::spawn(async move {
            while let Some(event) = browse_rx.recv().await {
                match event {
                    BrowseEvent::Up(browsed) => {
                        let mut service = match DiscoveredService::from_browsed(&browsed) {
                            Ok(service) => service,
                            Err(e) => {
                                debug!("skipping {}: {}", browsed.name, e);
                                continue;
                            }
                        };
                        match service.update(&http).await {
                            Ok(()) => {
                                info!(
                                    "discovered {} at {}:{}",
                                    service.name, service.address, service.port
                                );
                                services
                                    .write()
                                    .insert((service.address, service.port), service.clone());
                                if tx.send(DiscoveryEvent::Up(service)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(
                                    "fetching tree from {}:{} failed: {}",
                                    service.address, service.port, e
                                );
                                if tx.send(DiscoveryEvent::Error(e.to_string())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    BrowseEvent::Down(browsed) => {
                        let IpAddr::V4(address) = browsed.address else {
                            continue;
                        };
                        let removed = services.write().remove(&(address, browsed.port));
                        if let Some(service) = removed {
                            info!("lost {} at {}:{}", service.name, address, browsed.port);
                            if tx.send(DiscoveryEvent::Down(service)).await.is_err() {
                                break;
                            }
                        }
                    }
                    BrowseEvent::Error(e) => {
                        if tx.send(DiscoveryEvent::Error(e)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Snapshot of currently tracked services
    pub fn services(&self) -> Vec<DiscoveredService> {
        self.services.read().values().cloned().collect()
    }

    /// Look up a tracked service by endpoint
    pub fn get(&self, address: Ipv4Addr, port: u16) -> Option<DiscoveredService> {
        self.services.read().get(&(address, port)).cloned()
    }

    /// Stop browsing
    pub fn stop(&self) {
        self.browser.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn browsed(address: IpAddr) -> BrowsedService {
        BrowsedService {
            name: "test".to_string(),
            service_type: "oscjson".to_string(),
            full_type: "oscjson._tcp.local".to_string(),
            host: "test.local".to_string(),
            address,
            port: 8080,
            txt: HashMap::new(),
        }
    }

    #[test]
    fn test_from_browsed_ipv4() {
        let service =
            DiscoveredService::from_browsed(&browsed(IpAddr::V4(Ipv4Addr::LOCALHOST))).unwrap();
        assert_eq!(service.root_url(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_from_browsed_rejects_ipv6() {
        let result = DiscoveredService::from_browsed(&browsed(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(matches!(
            result,
            Err(DiscoveryError::AddressFamilyUnsupported)
        ));
    }
}
