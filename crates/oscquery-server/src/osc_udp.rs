//! UDP OSC listener
//!
//! Each datagram is decoded as a single OSC message (no bundle support in
//! this revision) and dispatched through the server's receive hook.

use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error};

use oscquery_core::osc;

use crate::server::ServerInner;

pub(crate) async fn run(server: Arc<ServerInner>, socket: UdpSocket) {
    let mut buf = vec![0u8; 65536];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                debug!("OSC datagram: {} bytes from {}", len, from);
                match osc::decode(&buf[..len]) {
                    Ok(msg) => server.receive_osc_message(&msg.path, &msg.args),
                    Err(e) => debug!("dropping malformed OSC datagram from {}: {}", from, e),
                }
            }
            Err(e) => {
                error!("UDP receive error: {}", e);
                break;
            }
        }
    }
}
