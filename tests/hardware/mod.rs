//! Tests against a real serial device.
//!
//! Ignored by default. They read the device from the environment:
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0   # device to open
//! export TEST_BAUD=115200         # optional, default: 115200
//! export TEST_LOOPBACK=1          # if TX is wired to RX
//!
//! cargo test --features hardware-tests --test integration_hardware -- --ignored
//! ```
