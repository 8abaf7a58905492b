//! WebSocket hub tests: subscriptions, notifications, and binary OSC

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use oscquery_core::{osc, Access, Argument, NodeOptions, OscValue, SimpleType};
use oscquery_server::{OscQueryServer, ServerConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> OscQueryServer {
    let config = ServerConfig::default()
        .with_bind_address("127.0.0.1")
        .with_advertise(false);
    OscQueryServer::start(config).await.expect("server start")
}

async fn connect(server: &OscQueryServer) -> WsStream {
    let url = format!("ws://127.0.0.1:{}/", server.ws_port());
    let (stream, _) = connect_async(url.as_str()).await.expect("ws connect");
    stream
}

async fn listen(ws: &mut WsStream, prefix: &str) {
    let cmd = serde_json::json!({"COMMAND": "LISTEN", "DATA": prefix}).to_string();
    ws.send(Message::text(cmd)).await.unwrap();
    // give the hub a moment to apply the subscription
    sleep(Duration::from_millis(100)).await;
}

async fn next_text(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(t) = msg {
            return serde_json::from_str(t.as_str()).unwrap();
        }
    }
}

async fn next_binary(ws: &mut WsStream) -> Vec<u8> {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Binary(b) = msg {
            return b.to_vec();
        }
    }
}

async fn expect_silence(ws: &mut WsStream) {
    let result = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "expected no frame, got {:?}", result);
}

#[tokio::test]
async fn test_path_changed_prefix_filtering() {
    let server = start_server().await;
    server.add_method(
        "/a/x/y",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Float)]),
    );

    let mut client_a = connect(&server).await;
    let mut client_b = connect(&server).await;
    listen(&mut client_a, "/a").await;
    listen(&mut client_b, "/b").await;

    server.set_value("/a/x/y", 0, OscValue::Float(1.0)).unwrap();

    let msg = next_text(&mut client_a).await;
    assert_eq!(msg["COMMAND"], "PATH_CHANGED");
    assert_eq!(msg["DATA"], "/a/x/y");

    expect_silence(&mut client_b).await;

    server.stop().await;
}

#[tokio::test]
async fn test_sibling_prefix_not_matched() {
    let server = start_server().await;
    server.add_method(
        "/ab",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Int)]),
    );

    let mut client = connect(&server).await;
    listen(&mut client, "/a").await;

    server.set_value("/ab", 0, OscValue::Int(1)).unwrap();
    expect_silence(&mut client).await;

    server.stop().await;
}

#[tokio::test]
async fn test_empty_subscription_receives_everything() {
    let server = start_server().await;
    server.add_method(
        "/any",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Int)]),
    );

    let mut client = connect(&server).await;
    sleep(Duration::from_millis(100)).await;

    server.set_value("/any", 0, OscValue::Int(9)).unwrap();
    let msg = next_text(&mut client).await;
    assert_eq!(msg["COMMAND"], "PATH_CHANGED");
    assert_eq!(msg["DATA"], "/any");

    server.stop().await;
}

#[tokio::test]
async fn test_path_renamed_is_unfiltered() {
    let server = start_server().await;

    let mut client = connect(&server).await;
    listen(&mut client, "/unrelated").await;

    server.broadcast_path_renamed("/p", "/q");

    let msg = next_text(&mut client).await;
    assert_eq!(msg["COMMAND"], "PATH_RENAMED");
    assert_eq!(msg["DATA"]["OLD"], "/p");
    assert_eq!(msg["DATA"]["NEW"], "/q");

    server.stop().await;
}

#[tokio::test]
async fn test_remove_cascade_notifies_pruned_paths() {
    let server = start_server().await;
    server.add_method(
        "/g/h",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Int)]),
    );

    let mut client = connect(&server).await;
    sleep(Duration::from_millis(100)).await;

    server.remove_method("/g/h");

    let first = next_text(&mut client).await;
    let second = next_text(&mut client).await;
    assert_eq!(first["COMMAND"], "PATH_CHANGED");
    assert_eq!(first["DATA"], "/g/h");
    assert_eq!(second["COMMAND"], "PATH_CHANGED");
    assert_eq!(second["DATA"], "/g");

    server.stop().await;
}

#[tokio::test]
async fn test_inbound_binary_osc_sets_value() {
    let server = start_server().await;
    server.add_method(
        "/v",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Float)]),
    );

    let mut client = connect(&server).await;
    let packet = osc::encode("/v", &[OscValue::Float(0.25)]);
    client.send(Message::binary(packet)).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let value = server.with_tree(|tree| {
        tree.resolve("/v").unwrap().arguments().unwrap()[0]
            .value
            .clone()
    });
    assert_eq!(value, Some(OscValue::Float(0.25)));

    server.stop().await;
}

#[tokio::test]
async fn test_inbound_osc_dropped_on_readonly() {
    let server = start_server().await;
    server.add_method(
        "/ro",
        NodeOptions::new()
            .with_access(Access::ReadOnly)
            .with_arguments(vec![Argument::new(SimpleType::Float)]),
    );

    let mut client = connect(&server).await;
    let packet = osc::encode("/ro", &[OscValue::Float(0.75)]);
    client.send(Message::binary(packet)).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let value = server.with_tree(|tree| {
        tree.resolve("/ro").unwrap().arguments().unwrap()[0]
            .value
            .clone()
    });
    assert_eq!(value, None);

    server.stop().await;
}

#[tokio::test]
async fn test_send_value_broadcasts_binary_osc() {
    let server = start_server().await;
    server.add_method(
        "/out",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Float)]),
    );

    let mut client = connect(&server).await;
    listen(&mut client, "/out").await;

    server.send_value("/out", &[OscValue::Float(0.5)]);

    let bytes = next_binary(&mut client).await;
    let msg = osc::decode(&bytes).unwrap();
    assert_eq!(msg.path, "/out");
    assert_eq!(msg.args, vec![OscValue::Float(0.5)]);

    // local value slot was updated before the broadcast
    let value = server.with_tree(|tree| {
        tree.resolve("/out").unwrap().arguments().unwrap()[0]
            .value
            .clone()
    });
    assert_eq!(value, Some(OscValue::Float(0.5)));

    server.stop().await;
}

#[tokio::test]
async fn test_ignore_removes_subscription() {
    let server = start_server().await;
    server.add_method(
        "/t",
        NodeOptions::new()
            .with_access(Access::ReadWrite)
            .with_arguments(vec![Argument::new(SimpleType::Int)]),
    );

    let mut client = connect(&server).await;
    listen(&mut client, "/nothing-here").await;

    // filtered out
    server.set_value("/t", 0, OscValue::Int(1)).unwrap();
    expect_silence(&mut client).await;

    // back to the empty set: receive everything again
    let cmd = serde_json::json!({"COMMAND": "IGNORE", "DATA": "/nothing-here"}).to_string();
    client.send(Message::text(cmd)).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    server.set_value("/t", 0, OscValue::Int(2)).unwrap();
    let msg = next_text(&mut client).await;
    assert_eq!(msg["DATA"], "/t");

    server.stop().await;
}
