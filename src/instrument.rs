//! DMM instrument handle and bus probing.
//!
//! [`Dmm`] owns one open bus device for the life of the session. Configuration
//! failures are fatal; cleanup (`SYST:LOC`, close) is best-effort and runs on
//! every exit path via `Drop`, so a mid-loop error still returns the meter to
//! front-panel control.

use crate::bus::{BusDevice, BusError, InstrumentBus};
use crate::config::MeterSettings;
use log::{debug, warn};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// One attempted measurement that produced no usable value. Both variants are
/// recoverable: the session discards the attempt and re-prompts.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Instrument communication failed: {0}")]
    Comm(#[from] BusError),

    #[error("Could not parse reading {response:?}")]
    Parse { response: String },
}

/// Result of probing one bus address.
pub struct ProbedInstrument {
    /// Bus address, as reported by the enumerator.
    pub address: String,
    /// `*IDN?` response, or `None` when the device did not answer.
    pub identity: Option<String>,
}

/// List all reachable addresses and attempt an identity query against each.
///
/// Per-address failures never abort probing; an unresponsive address is
/// reported with `identity: None` so the operator still sees it in the menu.
/// An empty address list is returned as-is; deciding that it is fatal belongs
/// to the caller.
pub fn probe_instruments(bus: &dyn InstrumentBus) -> Result<Vec<ProbedInstrument>, BusError> {
    let addresses = bus.list_addresses()?;
    let mut probed = Vec::with_capacity(addresses.len());

    for address in addresses {
        let identity = match bus.open(&address) {
            Ok(mut device) => {
                let identity = match device.query("*IDN?") {
                    Ok(response) => Some(response.trim().to_string()),
                    Err(e) => {
                        debug!("Identity query failed for '{}': {}", address, e);
                        None
                    }
                };
                if let Err(e) = device.close() {
                    warn!("Failed to close probe connection to '{}': {}", address, e);
                }
                identity
            }
            Err(e) => {
                debug!("Failed to open '{}' for probing: {}", address, e);
                None
            }
        };
        probed.push(ProbedInstrument { address, identity });
    }

    Ok(probed)
}

/// Handle to the selected digital multimeter.
pub struct Dmm {
    device: Option<Box<dyn BusDevice>>,
    averaging_count: u32,
    settle: Duration,
}

impl Dmm {
    /// Wrap an opened bus device.
    pub fn new(device: Box<dyn BusDevice>, meter: &MeterSettings) -> Self {
        Self {
            device: Some(device),
            averaging_count: meter.averaging_count,
            settle: Duration::from_millis(meter.settle_ms),
        }
    }

    fn device_mut(&mut self) -> Result<&mut Box<dyn BusDevice>, BusError> {
        self.device.as_mut().ok_or(BusError::Closed)
    }

    /// Put the meter into auto-range DC-voltage mode with the internal
    /// repeating-average filter enabled. Any rejected command is fatal: this
    /// is the core configuration sequence and a half-configured meter would
    /// silently produce wrong readings.
    pub fn configure(&mut self) -> Result<(), BusError> {
        let averaging_count = self.averaging_count;
        let device = self.device_mut()?;

        device.write("*RST")?; // Start from a known state
        device.write("CONF:VOLT:DC AUTO")?; // Auto-range, default resolution
        device.write("VOLT:DC:RANG:AUTO 1")?;
        device.write("AVER:STAT ON")?;
        device.write("AVER:TCON REP")?;
        device.write(&format!("AVER:COUN {averaging_count}"))?;
        Ok(())
    }

    /// Show a label on the meter's front-panel display. Not every model
    /// supports `DISP:TEXT`; the caller treats a failure as a non-fatal
    /// nicety.
    pub fn display_text(&mut self, text: &str) -> Result<(), BusError> {
        self.device_mut()?.write(&format!("DISP:TEXT '{text}'"))
    }

    /// Trigger one measurement, wait for the averaging filter to complete,
    /// and read back the numeric result.
    pub fn trigger_read(&mut self) -> Result<f64, ReadError> {
        let settle = self.settle;
        let device = self.device_mut()?;

        device.write("READ?")?;
        // Blocking sleep: measurement cadence is operator-paced (see the
        // concurrency notes in the crate docs), so a cancellable timeout
        // would buy nothing here.
        thread::sleep(settle);
        let response = device.read()?;

        response
            .trim()
            .parse::<f64>()
            .map_err(|_| ReadError::Parse { response })
    }

    /// Graceful shutdown on the normal exit path. Equivalent to dropping the
    /// handle, but makes the hand-back explicit at the call site.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            // Best-effort: failures are logged and swallowed because this
            // runs during shutdown, including error paths.
            if let Err(e) = device.write("SYST:LOC") {
                warn!("Failed to return instrument to local control: {}", e);
            }
            if let Err(e) = device.close() {
                warn!("Failed to close instrument connection: {}", e);
            }
        }
    }
}

impl Drop for Dmm {
    fn drop(&mut self) {
        self.release();
    }
}
