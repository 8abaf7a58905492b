//! Server orchestrator
//!
//! Composes the HTTP query handler, the WebSocket hub (attached to the
//! HTTP listener or standalone), the UDP OSC listener, and the mDNS
//! advertisement, and exposes the mutator API over the method tree.
//!
//! The tree is the only writable shared resource and sits behind a single
//! reader-writer lock: mutators take the write lock, HTTP reads and
//! WebSocket broadcasts that serialize subtrees take the read lock.
//! Change notifications are queued on per-client channels after the
//! mutation completes, so a notification never observes an older tree.

use futures_util::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use oscquery_core::{
    normalize_path, osc, Access, Error as CoreError, HostInfo, Node, NodeOptions, OscTransport,
    OscValue,
};

use crate::advertise::{sanitize_service_name, ServiceAdvertiser};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::ws::{WsClient, WsHub};
use crate::{http, osc_udp, ws};

/// Extensions every server supports regardless of transports
const STATIC_EXTENSIONS: &[&str] = &[
    "ACCESS",
    "VALUE",
    "RANGE",
    "DESCRIPTION",
    "TAGS",
    "CRITICAL",
    "CLIPMODE",
];

/// State shared by every listener task
pub(crate) struct ServerInner {
    pub(crate) config: ServerConfig,
    pub(crate) tree: RwLock<Node>,
    pub(crate) hub: WsHub,
    pub(crate) http_port: u16,
    pub(crate) ws_port: u16,
    pub(crate) ws_attached: bool,
    pub(crate) ws_running: bool,
    pub(crate) osc_port: Option<u16>,
    pub(crate) service_name: String,
}

impl ServerInner {
    /// Apply an inbound OSC message to the tree.
    ///
    /// Unknown paths and non-writable nodes are dropped with a log line.
    /// Assignment is best-effort per argument index; surviving assignments
    /// still notify subscribers even when some indices fail.
    pub(crate) fn receive_osc_message(&self, path: &str, args: &[OscValue]) {
        let canonical = normalize_path(path);
        let mut assigned = false;
        {
            let mut tree = self.tree.write();
            let Some(node) = tree.resolve_mut(&canonical) else {
                debug!("dropping OSC message for unknown path {}", canonical);
                return;
            };
            match node.access() {
                None | Some(Access::NoValue) | Some(Access::ReadOnly) => {
                    debug!("dropping OSC message for non-writable path {}", canonical);
                    return;
                }
                Some(Access::WriteOnly) | Some(Access::ReadWrite) => {}
            }
            for (index, arg) in args.iter().enumerate() {
                match node.set_value(index, arg.clone()) {
                    Ok(()) => assigned = true,
                    Err(e) => warn!("OSC assignment on {} failed: {}", canonical, e),
                }
            }
        }

        if assigned {
            self.hub.broadcast_path_changed(&canonical);
        }
        if self.config.broadcast {
            self.hub.broadcast_osc(&canonical, args);
        }
    }

    /// Classify and dispatch one inbound WebSocket frame. Frames whose
    /// first byte is `/` or `#` are binary OSC; everything else is a JSON
    /// command.
    pub(crate) fn handle_ws_frame(&self, client: &WsClient, data: &[u8]) {
        match data.first() {
            Some(b'/') | Some(b'#') => match osc::decode(data) {
                Ok(msg) => self.receive_osc_message(&msg.path, &msg.args),
                Err(e) => warn!("bad OSC frame from client {}: {}", client.id, e),
            },
            _ => match serde_json::from_slice::<ws::WsCommand>(data) {
                Ok(cmd) => match cmd.command.as_str() {
                    "LISTEN" => {
                        if let Some(prefix) = cmd.data.as_ref().and_then(|d| d.as_str()) {
                            debug!("client {} listens to {}", client.id, prefix);
                            client.listen(prefix);
                        }
                    }
                    "IGNORE" => {
                        if let Some(prefix) = cmd.data.as_ref().and_then(|d| d.as_str()) {
                            debug!("client {} ignores {}", client.id, prefix);
                            client.ignore(prefix);
                        }
                    }
                    other => debug!("ignoring WS command {}", other),
                },
                Err(e) => debug!("unparseable WS frame from client {}: {}", client.id, e),
            },
        }
    }

    /// HOST_INFO document for the current transport layout
    pub(crate) fn host_info(&self) -> HostInfo {
        let bind = self
            .config
            .bind_address
            .clone()
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let mut extensions: HashMap<String, bool> = STATIC_EXTENSIONS
            .iter()
            .map(|e| (e.to_string(), true))
            .collect();
        if self.ws_running {
            extensions.insert("LISTEN".to_string(), true);
            extensions.insert("PATH_CHANGED".to_string(), true);
        }

        HostInfo {
            name: Some(self.service_name.clone()),
            extensions: Some(extensions),
            osc_ip: Some(self.config.osc_ip.clone().unwrap_or_else(|| bind.clone())),
            osc_port: Some(self.osc_port.unwrap_or(self.http_port)),
            osc_transport: Some(self.config.osc_transport),
            ws_ip: Some(self.config.ws_ip.clone().unwrap_or(bind)),
            ws_port: Some(self.ws_port),
        }
    }
}

/// An OSCQuery server
pub struct OscQueryServer {
    inner: Arc<ServerInner>,
    tasks: Vec<JoinHandle<()>>,
    advertiser: Option<ServiceAdvertiser>,
}

impl OscQueryServer {
    /// Bind every configured listener, advertise over mDNS, and return
    /// once all of them are ready.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let bind_ip = config
            .bind_address
            .clone()
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let http_listener =
            TcpListener::bind((bind_ip.as_str(), config.http_port.unwrap_or(0))).await?;
        let http_port = http_listener.local_addr()?.port();

        let ws_ip = config.ws_ip.clone().unwrap_or_else(|| bind_ip.clone());
        let mut ws_port = config.ws_port.unwrap_or(http_port);
        let ws_attached = ws_port == http_port && ws_ip == bind_ip;
        let ws_listener = if ws_attached {
            None
        } else {
            let listener = TcpListener::bind((ws_ip.as_str(), ws_port)).await?;
            ws_port = listener.local_addr()?.port();
            Some(listener)
        };

        let mut osc_port = None;
        let mut udp_socket = None;
        match config.osc_transport {
            OscTransport::Udp => {
                let osc_ip = config.osc_ip.clone().unwrap_or_else(|| bind_ip.clone());
                let port = config.osc_port.unwrap_or(http_port);
                let socket = UdpSocket::bind((osc_ip.as_str(), port)).await?;
                let bound = socket.local_addr()?.port();
                info!("OSC UDP listening on {}:{}", osc_ip, bound);
                osc_port = Some(bound);
                udp_socket = Some(socket);
            }
            OscTransport::Tcp => {
                warn!("TCP OSC transport is not implemented; no OSC listener started");
            }
        }

        let service_name = sanitize_service_name(&config.service_name);

        let mut root = Node::root();
        root.set_opts(NodeOptions::new().with_description(config.root_description.clone()));

        let inner = Arc::new(ServerInner {
            config,
            tree: RwLock::new(root),
            hub: WsHub::new(),
            http_port,
            ws_port,
            ws_attached,
            ws_running: true,
            osc_port,
            service_name: service_name.clone(),
        });

        let mut tasks = Vec::new();

        let app = http::router(inner.clone());
        info!(
            "HTTP listening on {}:{} ({} WebSocket)",
            bind_ip,
            http_port,
            if ws_attached { "attached" } else { "standalone" }
        );
        tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, app).await {
                error!("HTTP server error: {}", e);
            }
        }));

        if let Some(listener) = ws_listener {
            info!("WebSocket listening on {}:{}", ws_ip, ws_port);
            tasks.push(tokio::spawn(ws::run_standalone(inner.clone(), listener)));
        }

        if let Some(socket) = udp_socket {
            tasks.push(tokio::spawn(osc_udp::run(inner.clone(), socket)));
        }

        let advertiser = if inner.config.advertise {
            let mut advertiser = ServiceAdvertiser::new()?;
            advertiser.advertise(
                &service_name,
                inner.config.host_name.as_deref(),
                http_port,
            )?;
            Some(advertiser)
        } else {
            None
        };

        Ok(Self {
            inner,
            tasks,
            advertiser,
        })
    }

    /// Resolved HTTP port
    pub fn http_port(&self) -> u16 {
        self.inner.http_port
    }

    /// Resolved WebSocket port (equals the HTTP port when attached)
    pub fn ws_port(&self) -> u16 {
        self.inner.ws_port
    }

    /// Resolved OSC UDP port, when a listener is running
    pub fn osc_port(&self) -> Option<u16> {
        self.inner.osc_port
    }

    /// Sanitized service name in use
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Number of connected WebSocket clients
    pub fn client_count(&self) -> usize {
        self.inner.hub.client_count()
    }

    /// The HOST_INFO document currently served
    pub fn host_info(&self) -> HostInfo {
        self.inner.host_info()
    }

    /// Run a closure against the tree under the read lock
    pub fn with_tree<R>(&self, f: impl FnOnce(&Node) -> R) -> R {
        f(&self.inner.tree.read())
    }

    /// Declare a method at `path`, materializing missing containers
    pub fn add_method(&self, path: &str, opts: NodeOptions) {
        let canonical = self.inner.tree.write().add_method(path, opts);
        self.inner.hub.broadcast_path_changed(&canonical);
    }

    /// Clear the node at `path` and prune emptied ancestors; subscribers
    /// get PATH_CHANGED for the target and every pruned path
    pub fn remove_method(&self, path: &str) {
        let changed = self.inner.tree.write().remove_method(path);
        for path in &changed {
            self.inner.hub.broadcast_path_changed(path);
        }
    }

    /// Assign one argument value slot
    pub fn set_value(&self, path: &str, index: usize, value: OscValue) -> Result<()> {
        let canonical = normalize_path(path);
        {
            let mut tree = self.inner.tree.write();
            let node = tree
                .resolve_mut(&canonical)
                .ok_or_else(|| ServerError::Core(CoreError::UnknownPath(canonical.clone())))?;
            node.set_value(index, value)?;
        }
        self.inner.hub.broadcast_path_changed(&canonical);
        Ok(())
    }

    /// Clear one argument value slot
    pub fn unset_value(&self, path: &str, index: usize) -> Result<()> {
        let canonical = normalize_path(path);
        {
            let mut tree = self.inner.tree.write();
            let node = tree
                .resolve_mut(&canonical)
                .ok_or_else(|| ServerError::Core(CoreError::UnknownPath(canonical.clone())))?;
            node.unset_value(index)?;
        }
        self.inner.hub.broadcast_path_changed(&canonical);
        Ok(())
    }

    /// Update local value slots (best-effort per index), then push the
    /// binary OSC message to WebSocket subscribers. Never sent over UDP.
    pub fn send_value(&self, path: &str, args: &[OscValue]) {
        let canonical = normalize_path(path);
        {
            let mut tree = self.inner.tree.write();
            if let Some(node) = tree.resolve_mut(&canonical) {
                for (index, arg) in args.iter().enumerate() {
                    if let Err(e) = node.set_value(index, arg.clone()) {
                        debug!("send_value on {}: {}", canonical, e);
                    }
                }
            }
        }
        self.inner.hub.broadcast_osc(&canonical, args);
    }

    /// Tell every client a subtree moved; renames are never filtered
    pub fn broadcast_path_renamed(&self, old: &str, new: &str) {
        self.inner.hub.broadcast_path_renamed(old, new);
    }

    /// Inject an OSC message as if it arrived over a transport
    pub fn receive_osc_message(&self, path: &str, args: &[OscValue]) {
        self.inner.receive_osc_message(path, args);
    }

    /// Close HTTP, WebSocket (including client sockets), UDP, and the
    /// mDNS advertisement; resolves when all are down.
    pub async fn stop(mut self) {
        info!("stopping OSCQuery server {}", self.inner.service_name);
        self.inner.hub.close_all();
        if let Some(mut advertiser) = self.advertiser.take() {
            if let Err(e) = advertiser.stop() {
                warn!("mDNS unregister failed: {}", e);
            }
        }
        for task in &self.tasks {
            task.abort();
        }
        join_all(self.tasks.drain(..)).await;
    }
}
