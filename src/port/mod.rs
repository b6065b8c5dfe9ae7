//! UART abstraction layer.
//!
//! Provides the `UartChannel` trait, the serialport-backed implementation,
//! the in-memory `MockUart`, and the factory that maps a configured device
//! identifier to one of them.

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;

pub use error::UartError;
pub use mock::MockUart;
pub use serial::SerialUart;
pub use traits::*;

/// Device identifier that selects the software loopback.
pub const LOOPBACK_DEVICE: &str = "loop://";

/// Opens UARTs on behalf of the engine when ports are added.
pub trait UartFactory: Send {
    fn open(&self, device: &str, params: LiveLineParams)
        -> Result<Box<dyn UartChannel>, UartError>;
}

impl<F> UartFactory for F
where
    F: Fn(&str, LiveLineParams) -> Result<Box<dyn UartChannel>, UartError> + Send,
{
    fn open(
        &self,
        device: &str,
        params: LiveLineParams,
    ) -> Result<Box<dyn UartChannel>, UartError> {
        self(device, params)
    }
}

/// The `loop://` device. It runs for the life of the process, so nothing
/// is logged.
fn open_loopback(params: LiveLineParams) -> Result<MockUart, UartError> {
    let mut uart = MockUart::loopback(LOOPBACK_DEVICE).without_recording();
    uart.configure(params)?;
    Ok(uart)
}

/// Opens OS serial devices, or a loopback `MockUart` for [`LOOPBACK_DEVICE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceFactory;

impl UartFactory for DeviceFactory {
    fn open(
        &self,
        device: &str,
        params: LiveLineParams,
    ) -> Result<Box<dyn UartChannel>, UartError> {
        if device == LOOPBACK_DEVICE {
            return Ok(Box::new(open_loopback(params)?));
        }
        Ok(Box::new(SerialUart::open(device, params)?))
    }
}
