//! Serial bus implementation with clean feature flag handling.
//!
//! Wraps the `serialport` crate. Commands get the configured line terminator
//! appended; responses are read byte-by-byte until the delimiter, under an
//! overall deadline that is independent of the port's short internal timeout.

#[cfg(feature = "bus_serial")]
mod serial_enabled {
    use super::super::{BusDevice, BusError, InstrumentBus};
    use crate::config::BusSettings;
    use log::debug;
    use serialport::SerialPort;
    use std::io::{Read, Write};
    use std::time::{Duration, Instant};

    /// Bus over local serial ports (RS-232 / USB-serial).
    pub struct SerialBus {
        baud_rate: u32,
        timeout: Duration,
        line_terminator: String,
        response_delimiter: u8,
    }

    impl SerialBus {
        /// Create a serial bus from the configured transport settings.
        pub fn new(settings: &BusSettings) -> Self {
            Self {
                baud_rate: settings.baud_rate,
                timeout: Duration::from_millis(settings.timeout_ms),
                line_terminator: settings.line_terminator.clone(),
                response_delimiter: b'\n',
            }
        }
    }

    impl InstrumentBus for SerialBus {
        fn list_addresses(&self) -> Result<Vec<String>, BusError> {
            let mut names: Vec<String> = serialport::available_ports()
                .map_err(|e| BusError::Read(format!("Failed to enumerate serial ports: {e}")))?
                .into_iter()
                .map(|p| p.port_name)
                .collect();
            // Stable ordering for the operator-facing numbered menu
            names.sort();
            Ok(names)
        }

        fn open(&self, address: &str) -> Result<Box<dyn BusDevice>, BusError> {
            let port = serialport::new(address, self.baud_rate)
                .timeout(Duration::from_millis(100)) // Internal read timeout
                .open()
                .map_err(|e| BusError::Open {
                    address: address.to_string(),
                    message: e.to_string(),
                })?;

            debug!("Serial port '{}' opened at {} baud", address, self.baud_rate);

            Ok(Box::new(SerialDevice {
                port: Some(port),
                timeout: self.timeout,
                line_terminator: self.line_terminator.clone(),
                response_delimiter: self.response_delimiter,
            }))
        }
    }

    struct SerialDevice {
        port: Option<Box<dyn SerialPort>>,
        timeout: Duration,
        line_terminator: String,
        response_delimiter: u8,
    }

    impl SerialDevice {
        fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, BusError> {
            self.port.as_mut().ok_or(BusError::Closed)
        }
    }

    impl BusDevice for SerialDevice {
        fn write(&mut self, command: &str) -> Result<(), BusError> {
            let framed = format!("{}{}", command, self.line_terminator);
            let port = self.port_mut()?;

            port.write_all(framed.as_bytes())
                .map_err(|e| BusError::Write(e.to_string()))?;
            port.flush().map_err(|e| BusError::Write(e.to_string()))?;

            debug!("Sent serial command: {}", command);
            Ok(())
        }

        fn read(&mut self) -> Result<String, BusError> {
            let timeout = self.timeout;
            let delimiter = self.response_delimiter;
            let port = self.port_mut()?;

            // Read response byte-by-byte until the delimiter
            let mut response = String::new();
            let mut buffer = [0u8; 1];
            let start = Instant::now();

            loop {
                if start.elapsed() > timeout {
                    return Err(BusError::Timeout(timeout));
                }

                match port.read(&mut buffer) {
                    Ok(1) => {
                        let ch = buffer[0] as char;
                        if buffer[0] == delimiter {
                            break;
                        }
                        response.push(ch);
                    }
                    Ok(0) => return Err(BusError::UnexpectedEof),
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        // Port timeout is shorter than our overall deadline
                        continue;
                    }
                    Err(e) => return Err(BusError::Read(e.to_string())),
                    Ok(_) => return Err(BusError::Read("multi-byte single read".to_string())),
                }
            }

            let response = response.trim().to_string();
            debug!("Received serial response: {}", response);
            Ok(response)
        }

        fn close(&mut self) -> Result<(), BusError> {
            if self.port.take().is_some() {
                debug!("Serial port closed");
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "bus_serial"))]
mod serial_disabled {
    use super::super::{BusDevice, BusError, InstrumentBus};
    use crate::config::BusSettings;

    /// Stub that reports the missing `bus_serial` feature on first use.
    pub struct SerialBus;

    impl SerialBus {
        /// Create the stub; construction succeeds so feature selection can
        /// happen at the call site.
        pub fn new(_settings: &BusSettings) -> Self {
            Self
        }
    }

    impl InstrumentBus for SerialBus {
        fn list_addresses(&self) -> Result<Vec<String>, BusError> {
            Err(BusError::SerialFeatureDisabled)
        }

        fn open(&self, _address: &str) -> Result<Box<dyn BusDevice>, BusError> {
            Err(BusError::SerialFeatureDisabled)
        }
    }
}

#[cfg(feature = "bus_serial")]
pub use serial_enabled::SerialBus;
#[cfg(not(feature = "bus_serial"))]
pub use serial_disabled::SerialBus;
