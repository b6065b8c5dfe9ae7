//! Session admission, timeouts and port enable/disable.

use crate::common::{
    com_port, engine_config, expect_closed, port, read_exactly, wait_until, Harness, WAIT,
};
use serial_redirector::config::{EngineConfig, PortMode};
use serial_redirector::PortState;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn test_second_raw_client_is_turned_away() {
    let config = port(PortMode::Raw, "loop-busy");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut first = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;

    let mut second = harness.connect(tcp_port).await;
    expect_closed(&mut second).await;
    let status = harness
        .wait_for(tcp_port, |s| s.counters.sessions_rejected == 1)
        .await;
    assert_eq!(status.active_sessions, 1);

    // The first session is unaffected.
    first.write_all(b"still here").await.unwrap();
    assert_eq!(read_exactly(&mut first, 10).await, b"still here");
    harness.stop().await;
}

#[tokio::test]
async fn test_idle_session_closed() {
    let mut config = port(PortMode::Raw, "loop-idle");
    config.idle_timeout_ms = 200;
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let started = Instant::now();
    let mut client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    expect_closed(&mut client).await;
    assert!(started.elapsed() >= Duration::from_millis(200));

    let status = harness.wait_sessions(tcp_port, 0).await;
    assert_eq!(status.state, PortState::Listening);
    harness.stop().await;
}

#[tokio::test]
async fn test_activity_defers_idle_timeout() {
    let mut config = port(PortMode::Raw, "loop-chatty");
    config.idle_timeout_ms = 300;
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut client = harness.connect(tcp_port).await;
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.write_all(b".").await.unwrap();
        assert_eq!(read_exactly(&mut client, 1).await, b".");
    }
    let status = harness.control.port(tcp_port).unwrap();
    assert_eq!(status.active_sessions, 1);
    harness.stop().await;
}

#[tokio::test]
async fn test_disable_refuses_then_enable_accepts() {
    let config = port(PortMode::Raw, "loop-toggle");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;

    let status = harness.control.set_enabled(tcp_port, false).await.unwrap();
    assert_eq!(status.state, PortState::Disabled);
    assert!(!status.config.enabled);
    expect_closed(&mut client).await;
    assert!(TcpStream::connect(("127.0.0.1", tcp_port)).await.is_err());

    let status = harness.control.set_enabled(tcp_port, true).await.unwrap();
    assert_eq!(status.state, PortState::Listening);
    let mut client = harness.connect(tcp_port).await;
    client.write_all(b"back").await.unwrap();
    assert_eq!(read_exactly(&mut client, 4).await, b"back");
    harness.stop().await;
}

#[tokio::test]
async fn test_disabled_port_starts_without_listener() {
    let mut config = port(PortMode::Raw, "loop-off");
    config.enabled = false;
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let status = harness
        .wait_for(tcp_port, |s| s.state == PortState::Disabled)
        .await;
    assert_eq!(status.active_sessions, 0);
    assert!(TcpStream::connect(("127.0.0.1", tcp_port)).await.is_err());
    harness.stop().await;
}

#[tokio::test]
async fn test_stalled_session_closed_by_watchdog() {
    let config = port(PortMode::Raw, "sink-stuck");
    let tcp_port = config.tcp_port;
    let engine = EngineConfig {
        buffer_size: 64,
        backpressure_watchdog_ms: 300,
        ..engine_config()
    };
    let harness = Harness::start_with(engine, vec![config]).await;
    let uart = harness.uart("sink-stuck");
    uart.set_write_limit(Some(0));

    let mut client = harness.connect(tcp_port).await;
    client.write_all(&[0x55; 256]).await.unwrap();
    expect_closed(&mut client).await;
    harness.wait_sessions(tcp_port, 0).await;
    assert!(uart.written().is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn test_client_ignoring_replies_closed_by_watchdog() {
    let config = port(PortMode::Telnet, "sink-chatty");
    let tcp_port = config.tcp_port;
    let engine = EngineConfig {
        buffer_size: 64,
        backpressure_watchdog_ms: 300,
        ..engine_config()
    };
    let harness = Harness::start_with(engine, vec![config]).await;

    let client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    // Signature queries cost six bytes and are answered with far more;
    // keep asking without ever reading.
    let (_reader, mut writer) = client.into_split();
    let flood = tokio::spawn(async move {
        let request = com_port(&[0]);
        let burst: Vec<u8> = request.iter().copied().cycle().take(request.len() * 10_000).collect();
        for _ in 0..400 {
            if writer.write_all(&burst).await.is_err() {
                break;
            }
        }
    });

    let status = harness.wait_sessions(tcp_port, 0).await;
    assert_eq!(status.counters.sessions_accepted, 1);
    assert_eq!(status.buffered_bytes, 0);
    flood.abort();
    harness.stop().await;
}

#[tokio::test]
async fn test_slow_uart_is_not_a_stall() {
    let config = port(PortMode::Raw, "sink-slow");
    let tcp_port = config.tcp_port;
    let engine = EngineConfig {
        buffer_size: 64,
        backpressure_watchdog_ms: 300,
        ..engine_config()
    };
    let harness = Harness::start_with(engine, vec![config]).await;
    let uart = harness.uart("sink-slow");
    uart.set_write_limit(Some(1));

    let mut client = harness.connect(tcp_port).await;
    let block = vec![0xAA; 4096];
    client.write_all(&block).await.unwrap();
    tokio::time::timeout(WAIT * 3, wait_until(|| uart.written().len() == block.len()))
        .await
        .expect("slow UART never drained");
    assert_eq!(harness.control.port(tcp_port).unwrap().active_sessions, 1);
    harness.stop().await;
}
