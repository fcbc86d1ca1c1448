//! Custom error types for the application.
//!
//! This module defines the primary error type, `CellLogError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the conditions that can end a session, from I/O
//! and configuration issues to instrument-bus problems.
//!
//! Only *fatal* conditions travel through `CellLogError`: anything the
//! measurement loop can recover from (invalid operator input, an unparsable
//! reading, a near-zero measurement) is represented as a value at the point of
//! detection (`Option`-returning validators, a per-attempt [`ReadError`]) and
//! never escapes the loop.
//!
//! [`ReadError`]: crate::instrument::ReadError

use crate::bus::BusError;
use crate::config::ConfigError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, CellLogError>;

/// Fatal session errors. Each variant unwinds to the shutdown path, which
/// always returns the instrument to local control and closes handles.
#[derive(Error, Debug)]
pub enum CellLogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Instrument bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Log file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No instruments found. Check connection and try again")]
    NoInstrumentsFound,

    #[error("Operator declined the wiring confirmation")]
    WiringDeclined,

    #[error("Operator input stream closed")]
    InputClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CellLogError::NoInstrumentsFound;
        assert!(err.to_string().contains("No instruments found"));
    }

    #[test]
    fn test_bus_error_conversion() {
        let bus_err = BusError::Write("port gone".to_string());
        let err: CellLogError = bus_err.into();
        assert!(err.to_string().contains("port gone"));
    }
}
