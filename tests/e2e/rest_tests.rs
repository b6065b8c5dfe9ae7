//! REST management API over real HTTP.

use crate::common::{port, Harness};
use serde_json::{json, Value};
use serial_redirector::config::PortMode;
use serial_redirector::rest_api::{build_router, RestContext};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn serve(harness: &Harness) -> SocketAddr {
    let app = build_router(RestContext {
        control: harness.control.clone(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Minimal HTTP/1.1 client: one request per connection.
async fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = body.unwrap_or("");
    let head = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(body.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").expect("malformed response");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status line");
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(body).unwrap_or(Value::String(body.to_string()))
    };
    (status, value)
}

#[tokio::test]
async fn test_health_and_system() {
    let harness = Harness::start(vec![port(PortMode::Raw, "loop-h")]).await;
    let addr = serve(&harness).await;

    let (status, body) = request(addr, "GET", "/api/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let (status, body) = request(addr, "GET", "/api/system", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["system"]["configured_ports"], 1);
    harness.stop().await;
}

#[tokio::test]
async fn test_port_listing_and_lookup() {
    let config = port(PortMode::Telnet, "loop-list");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let addr = serve(&harness).await;

    let (status, body) = request(addr, "GET", "/api/ports", None).await;
    assert_eq!(status, 200);
    let ports = body["ports"].as_array().unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0]["tcp_port"], tcp_port);
    assert_eq!(ports[0]["mode"], "telnet");
    assert_eq!(ports[0]["state"], "listening");

    let (status, body) = request(addr, "GET", &format!("/api/ports/{tcp_port}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["port"]["uart"], "loop-list");

    let missing = tcp_port.wrapping_add(1).max(1);
    let (status, body) = request(addr, "GET", &format!("/api/ports/{missing}"), None).await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["type"], "UnknownPort");
    harness.stop().await;
}

#[tokio::test]
async fn test_config_mode_and_enable_routes() {
    let config = port(PortMode::Telnet, "loop-routes");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let addr = serve(&harness).await;

    let path = format!("/api/ports/{tcp_port}/config");
    let (status, body) = request(addr, "POST", &path, Some(r#"{"baud": 19200, "parity": "even"}"#)).await;
    assert_eq!(status, 200);
    assert_eq!(body["port"]["baud"], 19200);
    assert_eq!(body["port"]["parity"], "even");

    let (status, body) = request(addr, "POST", &path, Some(r#"{"baud": 0}"#)).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["type"], "InvalidRequest");

    let (status, body) = request(addr, "POST", &path, Some("{not json")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["type"], "InvalidPayload");

    let path = format!("/api/ports/{tcp_port}/mode");
    let (status, body) = request(addr, "POST", &path, Some(r#"{"mode": "rawlp"}"#)).await;
    assert_eq!(status, 200);
    assert_eq!(body["port"]["mode"], "rawlp");

    let path = format!("/api/ports/{tcp_port}/enabled");
    let (status, body) = request(addr, "POST", &path, Some(r#"{"enabled": false}"#)).await;
    assert_eq!(status, 200);
    assert_eq!(body["port"]["state"], "disabled");

    let path = format!("/api/ports/{tcp_port}/disconnect");
    let (status, body) = request(addr, "POST", &path, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["closed_sessions"], 0);
    harness.stop().await;
}

#[tokio::test]
async fn test_add_port_route() {
    let harness = Harness::start(Vec::new()).await;
    let addr = serve(&harness).await;

    let config = port(PortMode::Raw, "loop-posted");
    let body = serde_json::to_string(&config).unwrap();
    let (status, reply) = request(addr, "POST", "/api/ports", Some(&body)).await;
    assert_eq!(status, 201);
    assert_eq!(reply["port"]["tcp_port"], config.tcp_port);
    assert_eq!(reply["port"]["state"], "listening");

    let (status, reply) = request(addr, "POST", "/api/ports", Some(&body)).await;
    assert_eq!(status, 409);
    assert_eq!(reply, json!({
        "status": "error",
        "error": {
            "type": "PortExists",
            "message": format!("TCP port {} is already configured", config.tcp_port),
        }
    }));
    harness.stop().await;
}
