//! Management commands through the `ControlHandle`.

use crate::common::{port, read_exactly, set_baud, Harness, TelnetClient, DIVISOR_BASE};
use serial_redirector::config::PortMode;
use serial_redirector::port::{nearest_divisor_baud, Parity, UartChannel};
use serial_redirector::{ControlError, PortState, SerialUpdate};
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn test_update_serial_applies_when_idle() {
    let config = port(PortMode::Telnet, "loop-cfg");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let uart = harness.uart("loop-cfg");

    let update = SerialUpdate {
        baud: Some(57_600),
        parity: Some(Parity::Odd),
        idle_timeout_ms: Some(30_000),
        ..SerialUpdate::default()
    };
    let status = harness.control.update_serial(tcp_port, update).await.unwrap();
    assert_eq!(status.config.baud, 57_600);
    assert_eq!(status.config.parity, Parity::Odd);
    assert_eq!(status.config.idle_timeout_ms, 30_000);
    assert_eq!(uart.params().baud, nearest_divisor_baud(DIVISOR_BASE, 57_600));
    assert_eq!(uart.params().parity, Parity::Odd);
    harness.stop().await;
}

#[tokio::test]
async fn test_update_serial_deferred_until_next_session() {
    let config = port(PortMode::Raw, "loop-defer");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let uart = harness.uart("loop-defer");
    let original = uart.params().baud;

    let _client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    let update = SerialUpdate {
        baud: Some(9600),
        ..SerialUpdate::default()
    };
    let status = harness.control.update_serial(tcp_port, update).await.unwrap();
    assert_eq!(status.config.baud, 9600);
    assert_eq!(uart.params().baud, original, "live session keeps its rate");

    assert_eq!(harness.control.disconnect(tcp_port).await.unwrap(), 1);
    let _client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    assert_eq!(uart.params().baud, nearest_divisor_baud(DIVISOR_BASE, 9600));
    harness.stop().await;
}

#[tokio::test]
async fn test_update_serial_apply_active() {
    let config = port(PortMode::Raw, "loop-now");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let uart = harness.uart("loop-now");

    let _client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    let update = SerialUpdate {
        baud: Some(230_400),
        apply_active: true,
        ..SerialUpdate::default()
    };
    harness.control.update_serial(tcp_port, update).await.unwrap();
    assert_eq!(uart.params().baud, nearest_divisor_baud(DIVISOR_BASE, 230_400));
    harness.stop().await;
}

#[tokio::test]
async fn test_update_serial_rejects_zero_baud() {
    let config = port(PortMode::Raw, "loop-zero");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let update = SerialUpdate {
        baud: Some(0),
        ..SerialUpdate::default()
    };
    let err = harness
        .control
        .update_serial(tcp_port, update)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidRequest(_)), "{err:?}");
    assert_eq!(harness.control.port(tcp_port).unwrap().config.baud, 115_200);
    harness.stop().await;
}

#[tokio::test]
async fn test_set_mode_switches_protocol() {
    let config = port(PortMode::Telnet, "loop-mode");
    let tcp_port = config.tcp_port;
    let harness = Harness::start(vec![config]).await;

    let mut telnet = TelnetClient::connect(&harness, tcp_port).await;
    telnet.send(&set_baud(9600)).await;
    telnet.expect_com_port().await;

    let status = harness.control.set_mode(tcp_port, PortMode::Raw).await.unwrap();
    assert_eq!(status.config.mode, PortMode::Raw);
    assert_eq!(status.active_sessions, 0);
    crate::common::expect_closed(&mut telnet.stream).await;

    // Raw mode relays telnet bytes verbatim.
    let mut raw = harness.connect(tcp_port).await;
    raw.write_all(&set_baud(9600)).await.unwrap();
    let echoed = read_exactly(&mut raw, set_baud(9600).len()).await;
    assert_eq!(echoed, set_baud(9600));
    harness.stop().await;
}

#[tokio::test]
async fn test_add_port_at_runtime() {
    let harness = Harness::start(Vec::new()).await;
    assert_eq!(harness.control.system().configured_ports, 0);

    let config = port(PortMode::Raw, "loop-late");
    let tcp_port = config.tcp_port;
    let status = harness.control.add_port(config.clone()).await.unwrap();
    assert_eq!(status.state, PortState::Listening);
    assert_eq!(status.config.port_id, Some(0));

    let err = harness.control.add_port(config).await.unwrap_err();
    assert!(matches!(err, ControlError::PortExists(p) if p == tcp_port));

    let mut client = harness.connect(tcp_port).await;
    client.write_all(b"late").await.unwrap();
    assert_eq!(read_exactly(&mut client, 4).await, b"late");
    harness.stop().await;
}

#[tokio::test]
async fn test_add_port_rejects_invalid_config() {
    let harness = Harness::start(Vec::new()).await;
    let mut config = port(PortMode::Raw, "loop-invalid");
    config.baud = 0;
    let err = harness.control.add_port(config).await.unwrap_err();
    assert!(matches!(err, ControlError::InvalidRequest(_)), "{err:?}");
    assert!(harness.control.ports().is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn test_unknown_port_reported() {
    let config = port(PortMode::Raw, "loop-known");
    let known = config.tcp_port;
    let harness = Harness::start(vec![config]).await;
    let unknown = if known == u16::MAX { known - 1 } else { known + 1 };

    let err = harness.control.set_enabled(unknown, false).await.unwrap_err();
    assert!(matches!(err, ControlError::UnknownPort(p) if p == unknown));
    let err = harness.control.disconnect(unknown).await.unwrap_err();
    assert!(matches!(err, ControlError::UnknownPort(_)));
    assert!(harness.control.port(unknown).is_none());
    harness.stop().await;
}

#[tokio::test]
async fn test_system_status_counts() {
    let first = port(PortMode::Raw, "loop-a");
    let mut second = port(PortMode::Telnet, "loop-b");
    second.enabled = false;
    let tcp_port = first.tcp_port;
    let harness = Harness::start(vec![first, second]).await;

    let _client = harness.connect(tcp_port).await;
    harness.wait_sessions(tcp_port, 1).await;
    let system = harness.control.system();
    assert_eq!(system.configured_ports, 2);
    assert_eq!(system.enabled_ports, 1);
    assert_eq!(system.active_sessions, 1);
    assert_eq!(system.buffer_budget, 2 * 2 * 1024);
    harness.stop().await;
}
