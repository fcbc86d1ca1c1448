//! Instrument bus abstraction.
//!
//! The session logic never talks to a transport directly: it goes through the
//! [`InstrumentBus`] / [`BusDevice`] traits, which expose the minimal
//! query/write/read text-command surface a SCPI-style meter needs. Concrete
//! transports live in submodules behind feature flags; the scriptable
//! [`MockBus`] is always compiled so tests can drive a whole session without
//! hardware.

pub mod mock;
pub mod serial;
#[cfg(feature = "bus_visa")]
pub mod visa;

pub use mock::MockBus;
pub use serial::SerialBus;
#[cfg(feature = "bus_visa")]
pub use visa::VisaBus;

use std::time::Duration;
use thiserror::Error;

/// Transport-level errors shared by all bus implementations.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Failed to open '{address}': {message}")]
    Open { address: String, message: String },

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected EOF from device")]
    UnexpectedEof,

    #[error("Device is closed")]
    Closed,

    #[error("Serial support not enabled. Rebuild with --features bus_serial")]
    SerialFeatureDisabled,

    #[error("VISA support not enabled. Rebuild with --features bus_visa")]
    VisaFeatureDisabled,
}

/// Enumerates reachable instrument addresses and opens connections to them.
pub trait InstrumentBus {
    /// List all reachable instrument addresses, in a stable order suitable
    /// for presenting a numbered menu to the operator.
    fn list_addresses(&self) -> Result<Vec<String>, BusError>;

    /// Open a connection to the instrument at `address`.
    fn open(&self, address: &str) -> Result<Box<dyn BusDevice>, BusError>;
}

/// A single open instrument connection with a text command surface.
pub trait BusDevice {
    /// Send one command.
    fn write(&mut self, command: &str) -> Result<(), BusError>;

    /// Read one response line, trimmed of the terminator.
    fn read(&mut self) -> Result<String, BusError>;

    /// Send one command and read back its single response.
    fn query(&mut self, command: &str) -> Result<String, BusError> {
        self.write(command)?;
        self.read()
    }

    /// Close the connection. Subsequent operations fail with [`BusError::Closed`].
    fn close(&mut self) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_display() {
        let err = BusError::Open {
            address: "ASRL1::INSTR".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open 'ASRL1::INSTR': permission denied"
        );
    }

    #[test]
    fn test_timeout_display_names_duration() {
        let err = BusError::Timeout(Duration::from_millis(2000));
        assert!(err.to_string().contains("2s"));
    }
}
