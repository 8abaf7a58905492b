//! WebSocket hub
//!
//! Tracks connected clients and their subscribed path prefixes, and fans
//! out PATH_CHANGED / PATH_RENAMED / binary OSC notifications. Outbound
//! frames go through a per-client channel drained by that connection's
//! writer task, so a slow client never blocks a broadcast; a client whose
//! channel is gone is deregistered inline and the broadcast continues.

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use oscquery_core::{osc, OscValue};

use crate::server::ServerInner;

/// An outbound WebSocket frame, transport-agnostic
#[derive(Debug, Clone)]
pub(crate) enum WsFrame {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Inbound JSON command shape
#[derive(Debug, Deserialize)]
pub(crate) struct WsCommand {
    #[serde(rename = "COMMAND")]
    pub command: String,
    #[serde(rename = "DATA", default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct PathChanged<'a> {
    #[serde(rename = "COMMAND")]
    command: &'static str,
    #[serde(rename = "DATA")]
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct PathRenamed<'a> {
    #[serde(rename = "COMMAND")]
    command: &'static str,
    #[serde(rename = "DATA")]
    data: RenameData<'a>,
}

#[derive(Debug, Serialize)]
struct RenameData<'a> {
    #[serde(rename = "OLD")]
    old: &'a str,
    #[serde(rename = "NEW")]
    new: &'a str,
}

/// Whether a subscribed prefix covers a path
pub fn prefix_matches(sub: &str, path: &str) -> bool {
    path == sub || (path.starts_with(sub) && path.as_bytes().get(sub.len()) == Some(&b'/'))
}

/// A connected WebSocket client
pub struct WsClient {
    pub id: Uuid,
    tx: mpsc::UnboundedSender<WsFrame>,
    subscriptions: RwLock<HashSet<String>>,
}

impl WsClient {
    /// Queue a frame for this client; false when its writer is gone
    fn send(&self, frame: WsFrame) -> bool {
        self.tx.send(frame).is_ok()
    }

    /// Add a path prefix to the subscription set
    pub fn listen(&self, prefix: &str) {
        self.subscriptions.write().insert(prefix.to_string());
    }

    /// Remove a path prefix from the subscription set
    pub fn ignore(&self, prefix: &str) {
        self.subscriptions.write().remove(prefix);
    }

    /// A client with no subscriptions receives everything
    pub fn wants(&self, path: &str) -> bool {
        let subs = self.subscriptions.read();
        subs.is_empty() || subs.iter().any(|sub| prefix_matches(sub, path))
    }
}

/// Registry of connected WebSocket clients
pub struct WsHub {
    clients: DashMap<Uuid, Arc<WsClient>>,
}

impl WsHub {
    pub(crate) fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    pub(crate) fn register(&self) -> (Arc<WsClient>, mpsc::UnboundedReceiver<WsFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::new(WsClient {
            id: Uuid::new_v4(),
            tx,
            subscriptions: RwLock::new(HashSet::new()),
        });
        self.clients.insert(client.id, client.clone());
        (client, rx)
    }

    pub(crate) fn deregister(&self, id: &Uuid) {
        self.clients.remove(id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Notify subscribers that the node at `path` changed
    pub(crate) fn broadcast_path_changed(&self, path: &str) {
        let msg = PathChanged {
            command: "PATH_CHANGED",
            data: path,
        };
        if let Ok(json) = serde_json::to_string(&msg) {
            self.broadcast(Some(path), WsFrame::Text(json));
        }
    }

    /// Notify every client of a rename; renames are never prefix-filtered
    pub(crate) fn broadcast_path_renamed(&self, old: &str, new: &str) {
        let msg = PathRenamed {
            command: "PATH_RENAMED",
            data: RenameData { old, new },
        };
        if let Ok(json) = serde_json::to_string(&msg) {
            self.broadcast(None, WsFrame::Text(json));
        }
    }

    /// Send a binary OSC message to subscribers of `path`
    pub(crate) fn broadcast_osc(&self, path: &str, args: &[OscValue]) {
        let bytes = osc::encode(path, args);
        self.broadcast(Some(path), WsFrame::Binary(bytes));
    }

    /// Serialize once, send to each matching client. A failed send means
    /// the client's connection task is gone: drop it and keep going.
    fn broadcast(&self, filter_path: Option<&str>, frame: WsFrame) {
        let mut dead = Vec::new();
        for entry in self.clients.iter() {
            let client = entry.value();
            if let Some(path) = filter_path {
                if !client.wants(path) {
                    continue;
                }
            }
            if !client.send(frame.clone()) {
                dead.push(client.id);
            }
        }
        for id in dead {
            warn!("dropping unreachable WebSocket client {}", id);
            self.clients.remove(&id);
        }
    }

    /// Ask every connection to close, then clear the registry
    pub(crate) fn close_all(&self) {
        for entry in self.clients.iter() {
            let _ = entry.value().send(WsFrame::Close);
        }
        self.clients.clear();
    }
}

/// Accept loop for the standalone WebSocket listener
pub(crate) async fn run_standalone(server: Arc<ServerInner>, listener: TcpListener) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("WebSocket accept error: {}", e);
                continue;
            }
        };

        let server = server.clone();
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake with {} failed: {}", addr, e);
                    return;
                }
            };
            info!("WebSocket client connected from {}", addr);

            let (mut write, mut read) = ws_stream.split();
            let (client, mut rx) = server.hub.register();

            let writer = tokio::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    let msg = match frame {
                        WsFrame::Text(t) => WsMessage::text(t),
                        WsFrame::Binary(b) => WsMessage::binary(b),
                        WsFrame::Close => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                    };
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
            });

            while let Some(result) = read.next().await {
                match result {
                    Ok(WsMessage::Text(t)) => server.handle_ws_frame(&client, t.as_bytes()),
                    Ok(WsMessage::Binary(b)) => server.handle_ws_frame(&client, &b),
                    Ok(WsMessage::Close(_)) => {
                        debug!("WebSocket client {} closed", addr);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket read error from {}: {}", addr, e);
                        break;
                    }
                }
            }

            server.hub.deregister(&client.id);
            writer.abort();
        });
    }
}
