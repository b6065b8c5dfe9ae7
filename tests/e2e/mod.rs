//! End-to-end tests for the redirector.
//!
//! Each test starts a real engine on localhost with `MockUart` devices and
//! talks to it over TCP, the way a ser2net or pyserial client would.

pub mod admission_tests;
pub mod control_tests;
pub mod raw_tests;

#[cfg(feature = "rest-api")]
pub mod rest_tests;
