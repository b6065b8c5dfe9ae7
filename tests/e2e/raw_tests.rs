//! Raw mode: an unfiltered byte relay in both directions.

use crate::common::{expect_closed, expect_silence, port, read_exactly, Harness};
use serial_redirector::config::PortMode;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_raw_loopback_echo() {
    let config = port(PortMode::Raw, "loop-raw");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;

    client.write_all(b"hello\r\n").await.unwrap();
    assert_eq!(read_exactly(&mut client, 7).await, b"hello\r\n");
    assert_eq!(harness.uart("loop-raw").written(), b"hello\r\n");

    let status = harness
        .wait_for(tcp_port, |s| s.counters.bytes_from_uart == 7)
        .await;
    assert_eq!(status.counters.bytes_to_uart, 7);
    assert_eq!(status.counters.sessions_accepted, 1);
    harness.stop().await;
}

#[tokio::test]
async fn test_half_closed_client_still_gets_echo() {
    let config = port(PortMode::Raw, "sink-half");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let uart = harness.uart("sink-half");
    uart.set_write_limit(Some(0));

    let mut client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    client.write_all(b"last words").await.unwrap();
    client.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.control.port(tcp_port).unwrap().active_sessions, 1);

    // Still queued toward the UART, so output keeps flowing back.
    uart.inject_rx(b"ok");
    assert_eq!(read_exactly(&mut client, 2).await, b"ok");

    uart.set_write_limit(None);
    crate::common::wait_until(|| uart.written() == b"last words").await;
    harness.wait_sessions(tcp_port, 0).await;
    expect_closed(&mut client).await;
    harness.stop().await;
}

#[tokio::test]
async fn test_raw_passes_telnet_bytes_untouched() {
    let config = port(PortMode::Raw, "loop-iac");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut client = harness.connect(tcp_port).await;
    let bytes = [0xFF, 0xFB, 0x2C, 0x00, 0xFF];
    client.write_all(&bytes).await.unwrap();
    assert_eq!(read_exactly(&mut client, bytes.len()).await, bytes);
    expect_silence(&mut client, Duration::from_millis(100)).await;
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_raw_bulk_transfer_keeps_order() {
    let config = port(PortMode::Raw, "loop-bulk");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let client = harness.connect(tcp_port).await;
    let (mut reader, mut writer) = client.into_split();
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let send = tokio::spawn(async move {
        writer.write_all(&payload).await.unwrap();
        writer
    });
    let mut received = vec![0u8; expected.len()];
    tokio::time::timeout(Duration::from_secs(20), reader.read_exact(&mut received))
        .await
        .expect("bulk transfer timed out")
        .unwrap();
    let _writer = send.await.unwrap();

    assert!(received == expected, "bulk data corrupted or reordered");
    harness.stop().await;
}

#[tokio::test]
async fn test_uart_output_reaches_client() {
    let config = port(PortMode::Raw, "sink-banner");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    harness.uart("sink-banner").inject_rx(b"U-Boot 2024.01\r\n");
    assert_eq!(read_exactly(&mut client, 16).await, b"U-Boot 2024.01\r\n");
    harness.stop().await;
}
