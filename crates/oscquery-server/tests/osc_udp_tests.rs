//! UDP OSC transport tests

use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;

use oscquery_core::{osc, Access, Argument, NodeOptions, OscTransport, OscValue, SimpleType};
use oscquery_server::{OscQueryServer, ServerConfig};

#[tokio::test]
async fn test_datagram_updates_value() {
    let server = OscQueryServer::start(
        ServerConfig::default()
            .with_bind_address("127.0.0.1")
            .with_advertise(false),
    )
    .await
    .unwrap();

    server.add_method(
        "/udp/level",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Float)]),
    );

    let osc_port = server.osc_port().expect("udp listener");
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let packet = osc::encode("/udp/level", &[OscValue::Float(0.6)]);
    socket
        .send_to(&packet, ("127.0.0.1", osc_port))
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;

    let value = server.with_tree(|tree| {
        tree.resolve("/udp/level").unwrap().arguments().unwrap()[0]
            .value
            .clone()
    });
    assert_eq!(value, Some(OscValue::Float(0.6)));

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_datagram_ignored() {
    let server = OscQueryServer::start(
        ServerConfig::default()
            .with_bind_address("127.0.0.1")
            .with_advertise(false),
    )
    .await
    .unwrap();

    let osc_port = server.osc_port().unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(b"xx", ("127.0.0.1", osc_port)).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    // the listener survives and the tree is untouched
    let still_root = server.with_tree(|tree| tree.resolve("/").is_some());
    assert!(still_root);

    server.stop().await;
}

#[tokio::test]
async fn test_tcp_transport_starts_without_osc_listener() {
    let server = OscQueryServer::start(
        ServerConfig::default()
            .with_bind_address("127.0.0.1")
            .with_osc_transport(OscTransport::Tcp)
            .with_advertise(false),
    )
    .await
    .unwrap();

    assert_eq!(server.osc_port(), None);
    // HOST_INFO still reports the configured transport and falls back to
    // the HTTP port
    let host_info = server.host_info();
    assert_eq!(host_info.osc_transport, Some(OscTransport::Tcp));
    assert_eq!(host_info.osc_port, Some(server.http_port()));

    server.stop().await;
}
