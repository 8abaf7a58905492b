//! HTTP query handler
//!
//! Routes `GET /<path>[?<ATTR>]` against the method tree and answers
//! `OPTIONS` preflights. Every path is handled by one fallback handler
//! since the tree's address space is arbitrary-depth. When the WebSocket
//! endpoint is attached, upgrade requests are intercepted here and handed
//! to the hub.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        FromRequestParts, Request, State,
    },
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use oscquery_core::{normalize_path, Access, Error as CoreError};

use crate::error::ServerError;
use crate::server::ServerInner;
use crate::ws::WsFrame;

/// Query parameters accepted by the query protocol
pub const ALLOWED_ATTRIBUTES: &[&str] = &[
    "FULL_PATH",
    "CONTENTS",
    "TYPE",
    "ACCESS",
    "RANGE",
    "DESCRIPTION",
    "TAGS",
    "CRITICAL",
    "CLIPMODE",
    "VALUE",
    "HOST_INFO",
];

pub(crate) fn router(server: Arc<ServerInner>) -> Router {
    Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn handle(State(server): State<Arc<ServerInner>>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    let method = parts.method.clone();
    let uri = parts.uri.clone();
    let headers = parts.headers.clone();

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("*")
        .to_string();

    if method == Method::OPTIONS {
        return preflight(&origin);
    }

    if server.ws_attached {
        if let Ok(upgrade) = WebSocketUpgrade::from_request_parts(&mut parts, &server).await {
            let server = server.clone();
            return upgrade
                .on_upgrade(move |socket| attached_client(server, socket))
                .into_response();
        }
    }

    let response = match query_response(&server, &method, &uri) {
        Ok(resp) => resp,
        Err(err) => error_response(err),
    };
    with_cors(response, &origin)
}

fn query_response(
    server: &ServerInner,
    method: &Method,
    uri: &Uri,
) -> Result<Response, ServerError> {
    if *method != Method::GET {
        return Err(ServerError::MethodNotAllowed);
    }

    let query = uri.query().map(str::trim);
    if let Some(attr) = query {
        if !ALLOWED_ATTRIBUTES.contains(&attr) {
            return Err(ServerError::InvalidAttribute(attr.to_string()));
        }
        if attr == "HOST_INFO" {
            let host_info = serde_json::to_value(server.host_info()).map_err(CoreError::from)?;
            return Ok(json_response(host_info));
        }
    }

    let path = normalize_path(uri.path());
    let tree = server.tree.read();
    let node = tree
        .resolve(&path)
        .ok_or_else(|| ServerError::Core(CoreError::UnknownPath(path.clone())))?;

    match query {
        None => {
            let tree_json =
                serde_json::to_value(node.serialize(&path)).map_err(CoreError::from)?;
            Ok(json_response(tree_json))
        }
        Some("VALUE")
            if matches!(
                node.access(),
                Some(Access::NoValue) | Some(Access::WriteOnly)
            ) =>
        {
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Some(attr) => {
            let serialized = node.serialize(&path);
            let mut body = serde_json::Map::new();
            body.insert(attr.to_string(), serialized.attribute(attr));
            Ok(json_response(serde_json::Value::Object(body)))
        }
    }
}

fn error_response(err: ServerError) -> Response {
    match err {
        ServerError::Core(CoreError::UnknownPath(path)) => {
            debug!("404 for {}", path);
            StatusCode::NOT_FOUND.into_response()
        }
        ServerError::InvalidAttribute(attr) => {
            debug!("rejecting query attribute {}", attr);
            StatusCode::BAD_REQUEST.into_response()
        }
        ServerError::MethodNotAllowed => StatusCode::BAD_REQUEST.into_response(),
        err => {
            warn!("query handler error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn json_response(value: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        value.to_string(),
    )
        .into_response()
}

fn with_cors(mut resp: Response, origin: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(origin) {
        resp.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    resp
}

fn preflight(origin: &str) -> Response {
    let mut resp = StatusCode::NO_CONTENT.into_response();
    let headers = resp.headers_mut();
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    resp
}

/// Connection pump for a WebSocket client attached to the HTTP listener
async fn attached_client(server: Arc<ServerInner>, socket: WebSocket) {
    let (mut write, mut read) = socket.split();
    let (client, mut rx) = server.hub.register();
    debug!("WebSocket client {} attached over HTTP", client.id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let msg = match frame {
                WsFrame::Text(t) => WsMessage::Text(t.into()),
                WsFrame::Binary(b) => WsMessage::Binary(b),
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
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error on client {}: {}", client.id, e);
                break;
            }
        }
    }

    server.hub.deregister(&client.id);
    writer.abort();
}
