//! VISA bus implementation.
//!
//! Uses the `visa-rs` crate, so any VISA-visible resource (USBTMC, GPIB,
//! LAN/VXI-11, serial) can serve as the meter transport. Enabled with the
//! `bus_visa` feature; requires a native VISA library at runtime.

use super::{BusDevice, BusError, InstrumentBus};
use crate::config::BusSettings;
use log::debug;
use std::ffi::CString;
use std::io::{Read, Write};
use std::time::Duration;
use visa_rs::prelude::*;

/// Bus over a VISA resource manager.
pub struct VisaBus {
    rm: DefaultRM,
    timeout: Duration,
    line_terminator: String,
}

impl VisaBus {
    /// Open the default VISA resource manager.
    pub fn new(settings: &BusSettings) -> Result<Self, BusError> {
        let rm = DefaultRM::new()
            .map_err(|e| BusError::Read(format!("Failed to open VISA resource manager: {e}")))?;
        Ok(Self {
            rm,
            timeout: Duration::from_millis(settings.timeout_ms),
            line_terminator: settings.line_terminator.clone(),
        })
    }
}

impl InstrumentBus for VisaBus {
    fn list_addresses(&self) -> Result<Vec<String>, BusError> {
        let expr = CString::new("?*::INSTR")
            .map_err(|e| BusError::Read(format!("Invalid VISA search expression: {e}")))?;
        let list = self
            .rm
            .find_res_list(&expr.into())
            .map_err(|e| BusError::Read(format!("VISA resource search failed: {e}")))?;

        let mut addresses = Vec::new();
        for res in list {
            let res = res.map_err(|e| BusError::Read(format!("VISA enumeration failed: {e}")))?;
            addresses.push(res.to_string_lossy().into_owned());
        }
        Ok(addresses)
    }

    fn open(&self, address: &str) -> Result<Box<dyn BusDevice>, BusError> {
        let c_string = CString::new(address).map_err(|e| BusError::Open {
            address: address.to_string(),
            message: e.to_string(),
        })?;
        let visa_string = VisaString::from(c_string);
        let session = self
            .rm
            .open(&visa_string, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
            .map_err(|e| BusError::Open {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        debug!("VISA resource '{}' opened", address);

        Ok(Box::new(VisaDevice {
            session: Some(session),
            timeout: self.timeout,
            line_terminator: self.line_terminator.clone(),
        }))
    }
}

struct VisaDevice {
    session: Option<Instrument>,
    timeout: Duration,
    line_terminator: String,
}

impl VisaDevice {
    fn session_mut(&mut self) -> Result<&mut Instrument, BusError> {
        self.session.as_mut().ok_or(BusError::Closed)
    }
}

impl BusDevice for VisaDevice {
    fn write(&mut self, command: &str) -> Result<(), BusError> {
        let framed = format!("{}{}", command, self.line_terminator);
        self.session_mut()?
            .write_all(framed.as_bytes())
            .map_err(|e| BusError::Write(e.to_string()))?;
        debug!("Sent VISA command: {}", command);
        Ok(())
    }

    fn read(&mut self) -> Result<String, BusError> {
        let timeout = self.timeout;
        let session = self.session_mut()?;

        let mut buf = [0u8; 1024];
        let bytes_read = match session.read(&mut buf) {
            Ok(0) => return Err(BusError::UnexpectedEof),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(BusError::Timeout(timeout))
            }
            Err(e) => return Err(BusError::Read(e.to_string())),
        };

        let response = String::from_utf8_lossy(&buf[..bytes_read])
            .trim()
            .to_string();
        debug!("Received VISA response: {}", response);
        Ok(response)
    }

    fn close(&mut self) -> Result<(), BusError> {
        if self.session.take().is_some() {
            debug!("VISA session closed");
        }
        Ok(())
    }
}
