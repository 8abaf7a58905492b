//! Server configuration

use oscquery_core::{OscTransport, DEFAULT_ROOT_DESCRIPTION, DEFAULT_SERVICE_NAME};

/// Configuration for [`OscQueryServer`].
///
/// Unset ports are resolved at startup: the HTTP port falls back to an
/// ephemeral one, and the WebSocket and OSC ports default to the resolved
/// HTTP port. When the WebSocket endpoint coincides with the HTTP endpoint
/// the hub upgrades connections on the HTTP listener instead of binding a
/// second socket.
///
/// [`OscQueryServer`]: crate::OscQueryServer
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Advertised service name, sanitized for mDNS at startup
    pub service_name: String,
    /// Description attribute of the tree root
    pub root_description: String,
    /// Address the HTTP listener binds to; `0.0.0.0` when unset
    pub bind_address: Option<String>,
    pub http_port: Option<u16>,
    /// mDNS hostname override
    pub host_name: Option<String>,
    pub osc_ip: Option<String>,
    pub osc_port: Option<u16>,
    /// TCP is accepted but unimplemented; selecting it only logs a warning
    pub osc_transport: OscTransport,
    pub ws_ip: Option<String>,
    pub ws_port: Option<u16>,
    /// Re-emit inbound OSC messages to WebSocket subscribers
    pub broadcast: bool,
    /// Register the `_oscjson._tcp` mDNS advertisement
    pub advertise: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            root_description: DEFAULT_ROOT_DESCRIPTION.to_string(),
            bind_address: None,
            http_port: None,
            host_name: None,
            osc_ip: None,
            osc_port: None,
            osc_transport: OscTransport::Udp,
            ws_ip: None,
            ws_port: None,
            broadcast: false,
            advertise: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_root_description(mut self, description: impl Into<String>) -> Self {
        self.root_description = description.into();
        self
    }

    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = Some(address.into());
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = Some(host_name.into());
        self
    }

    pub fn with_osc_ip(mut self, ip: impl Into<String>) -> Self {
        self.osc_ip = Some(ip.into());
        self
    }

    pub fn with_osc_port(mut self, port: u16) -> Self {
        self.osc_port = Some(port);
        self
    }

    pub fn with_osc_transport(mut self, transport: OscTransport) -> Self {
        self.osc_transport = transport;
        self
    }

    pub fn with_ws_ip(mut self, ip: impl Into<String>) -> Self {
        self.ws_ip = Some(ip.into());
        self
    }

    pub fn with_ws_port(mut self, port: u16) -> Self {
        self.ws_port = Some(port);
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn with_advertise(mut self, advertise: bool) -> Self {
        self.advertise = advertise;
        self
    }
}
